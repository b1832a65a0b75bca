use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

use log::{info, warn};

use crate::error::{EngineError, Result};
use crate::query_processor::query_processor::{QueryMode, QueryProcessor};

// Wire contract: one newline-terminated request per connection,
//   query "|" mode        mode: "0" conjunctive, "1" disjunctive
// answered by one line per result,
//   DocId: <docId>, Score: <score>
// then the connection closes.

/// Parses one request line into its query and mode.
pub fn parse_request(line: &str) -> Result<(&str, QueryMode)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (query, mode_str) = line
        .rsplit_once('|')
        .ok_or_else(|| EngineError::BadRequest(format!("missing mode separator: {:?}", line)))?;
    let mode = match mode_str.trim() {
        "0" => QueryMode::Conjunctive,
        "1" => QueryMode::Disjunctive,
        other => {
            return Err(EngineError::BadRequest(format!(
                "unknown query mode: {:?}",
                other
            )))
        }
    };
    Ok((query, mode))
}

/// Reads one request from `reader`, evaluates it, and writes the
/// response lines to `writer`.
pub fn handle_request<R: BufRead, W: Write>(
    processor: &mut QueryProcessor,
    reader: &mut R,
    writer: &mut W,
) -> Result<()> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let (query, mode) = parse_request(&line)?;
    let results = processor.process_query(query, mode)?;
    for result in &results {
        writeln!(writer, "DocId: {}, Score: {:.4}", result.doc_id, result.score)?;
    }
    writer.flush()?;
    Ok(())
}

/// Accept loop: one request per connection, errors are logged and the
/// listener keeps serving.
pub fn serve(processor: &mut QueryProcessor, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)?;
    info!("serving queries on {}", addr);
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(error) = serve_connection(processor, stream) {
                    warn!("request failed: {}", error);
                }
            }
            Err(error) => warn!("accept failed: {}", error),
        }
    }
    Ok(())
}

fn serve_connection(processor: &mut QueryProcessor, stream: TcpStream) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    handle_request(processor, &mut reader, &mut writer)
}
