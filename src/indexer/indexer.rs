use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::config::{Config, MAX_DOC_ID};
use crate::index::page_table::{Document, PageTable};
use crate::indexer::run_writer::RunWriter;
use crate::query_parser::tokenizer::tokenize;
use crate::utils::paths::{page_table_path, runs_dir};

pub struct IngestStats {
    pub docs: u32,
    pub skipped: u32,
    pub runs: u32,
}

/// Streams the corpus into sorted runs and the page table. Each input
/// line is `docId \t text`; malformed lines are skipped with a warning
/// and processing continues.
pub struct Indexer<'a> {
    config: &'a Config,
}

impl<'a> Indexer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Indexer { config }
    }

    pub fn ingest(&self) -> io::Result<IngestStats> {
        let file = File::open(&self.config.corpus_path)?;
        let mut reader = BufReader::with_capacity(self.config.index_buffer_size, file);
        let mut run_writer = RunWriter::new(
            runs_dir(&self.config.data_dir),
            self.config.index_chunk_size,
        )?;
        let mut page_table = PageTable::new();

        let mut stats = IngestStats {
            docs: 0,
            skipped: 0,
            runs: 0,
        };
        let mut offset = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            let line_offset = offset;
            offset += read as u64;

            let record = line.trim_end_matches(['\r', '\n']);
            if record.is_empty() {
                continue;
            }
            match parse_corpus_line(record) {
                Some((doc_id, tab_pos)) => {
                    let text = &record[tab_pos + 1..];
                    let doc_pos = line_offset + tab_pos as u64 + 1;
                    self.ingest_document(doc_id, text, doc_pos, &mut run_writer, &mut page_table)?;
                    stats.docs += 1;
                    if stats.docs % 10_000 == 0 {
                        info!("processed {} documents", stats.docs);
                    }
                }
                None => {
                    warn!("skipping malformed corpus line: {:.80}", record);
                    stats.skipped += 1;
                }
            }
        }

        stats.runs = run_writer.finish()?;
        page_table.write(&page_table_path(&self.config.data_dir))?;
        info!(
            "ingest finished: {} documents, {} skipped, {} runs",
            stats.docs, stats.skipped, stats.runs
        );
        Ok(stats)
    }

    fn ingest_document(
        &self,
        doc_id: u32,
        text: &str,
        doc_pos: u64,
        run_writer: &mut RunWriter,
        page_table: &mut PageTable,
    ) -> io::Result<()> {
        let mut term_counts: FxHashMap<String, u32> = FxHashMap::default();
        for token in tokenize(text) {
            *term_counts.entry(token).or_insert(0) += 1;
        }
        for (term, freq) in &term_counts {
            run_writer.insert(term, doc_id, *freq)?;
        }
        page_table.add(Document {
            doc_id,
            data_length: text.len() as u32,
            word_count: term_counts.len() as u32,
            doc_pos,
        });
        Ok(())
    }
}

/// Returns the docId and the tab position, or None for lines without a
/// tab or with a non-numeric docId.
fn parse_corpus_line(line: &str) -> Option<(u32, usize)> {
    let tab_pos = line.find('\t')?;
    let doc_id_str = line[..tab_pos].trim();
    if doc_id_str.is_empty() || !doc_id_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let doc_id: u32 = doc_id_str.parse().ok()?;
    // u32::MAX is the cursor exhaustion sentinel
    if doc_id == MAX_DOC_ID {
        return None;
    }
    Some((doc_id, tab_pos))
}

pub fn load_page_table(data_dir: &Path) -> crate::error::Result<PageTable> {
    PageTable::load(&page_table_path(data_dir))
}
