use std::process::ExitCode;
use std::time::Instant;

use log::error;
use mimalloc::MiMalloc;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use trawl::config::Config;
use trawl::error::{EngineError, Result};
use trawl::frontend;
use trawl::query_processor::query_processor::QueryMode;
use trawl::search_engine::search_engine::SearchEngine;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn usage() -> EngineError {
    EngineError::BadRequest(
        "usage: trawl <build|query|serve> <data_dir> [listen_addr]".to_string(),
    )
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).ok_or_else(usage)?;
    let data_dir = args.get(2).ok_or_else(usage)?;

    // optional config.json in the data directory overrides the defaults
    let config_path = std::path::Path::new(data_dir).join("config.json");
    let mut config = if config_path.is_file() {
        Config::load(&config_path)?
    } else {
        Config::with_data_dir(data_dir)
    };
    config.data_dir = data_dir.into();

    match command.as_str() {
        "build" => {
            let started = Instant::now();
            let stats = SearchEngine::build(&config)?;
            println!(
                "indexed {} documents ({} skipped) via {} runs into {} terms in {:.2?}",
                stats.docs,
                stats.skipped,
                stats.runs,
                stats.merged_terms,
                started.elapsed()
            );
            Ok(())
        }
        "query" => {
            let mut engine = SearchEngine::open(&config)?;
            query_loop(&mut engine)
        }
        "serve" => {
            let addr = args.get(3).cloned().unwrap_or_else(|| "127.0.0.1:7878".to_string());
            let mut engine = SearchEngine::open(&config)?;
            frontend::serve(engine.processor_mut(), &addr)
        }
        _ => Err(usage()),
    }
}

fn query_loop(engine: &mut SearchEngine) -> Result<()> {
    println!("trawl interactive search");
    println!("type a query like 'hello world', or 'exit' to quit.");

    let mut editor = DefaultEditor::new().map_err(readline_error)?;
    loop {
        let query = match editor.readline("query>> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(readline_error(e)),
        };
        if query.trim() == "exit" {
            break;
        }
        let _ = editor.add_history_entry(&query);

        let mode = match editor.readline("conjunctive(0) or disjunctive(1)>> ") {
            Ok(line) => match QueryMode::parse(&line) {
                Some(mode) => mode,
                None => {
                    println!("cannot recognize query type");
                    continue;
                }
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(readline_error(e)),
        };

        let started = Instant::now();
        match engine.query(&query, mode) {
            Ok(results) => {
                println!("search took {:.2?}", started.elapsed());
                if results.is_empty() {
                    println!("no results");
                    continue;
                }
                println!("top {} results:", results.len());
                for (rank, result) in results.iter().enumerate() {
                    println!("{:2}: {:.4} {}", rank + 1, result.score, result.doc_id);
                }
            }
            // a per-query failure is reported and the loop continues
            Err(e) => println!("query failed: {}", e),
        }
    }
    Ok(())
}

fn readline_error(e: ReadlineError) -> EngineError {
    EngineError::Io(std::io::Error::other(e))
}
