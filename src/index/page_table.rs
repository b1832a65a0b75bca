use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::error::{EngineError, Result};

/// Per-document metadata. `word_count` is the number of distinct terms
/// in the document and serves as the BM25 document length; `doc_pos` is
/// the byte offset of the source text in the external content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Document {
    pub doc_id: u32,
    pub data_length: u32,
    pub word_count: u32,
    pub doc_pos: u64,
}

/// Append-only table of documents, sorted by docId because documents
/// are ingested in docId order. Read-only after load.
pub struct PageTable {
    docs: Vec<Document>,
    avg_word_count: f64,
    miss_logged: AtomicBool,
}

impl PageTable {
    pub fn new() -> Self {
        PageTable {
            docs: Vec::new(),
            avg_word_count: 0.0,
            miss_logged: AtomicBool::new(false),
        }
    }

    pub fn add(&mut self, doc: Document) {
        self.docs.push(doc);
    }

    pub fn total_doc(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn docs(&self) -> &[Document] {
        &self.docs
    }

    pub fn avg_word_count(&self) -> f64 {
        self.avg_word_count
    }

    /// One document per line, space-separated ASCII fields.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        for doc in &self.docs {
            writeln!(
                writer,
                "{} {} {} {}",
                doc.doc_id, doc.data_length, doc.word_count, doc.doc_pos
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut table = PageTable::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let doc = parse_doc_line(&line).ok_or_else(|| {
                EngineError::corrupt(format!(
                    "page table {}: malformed line {}",
                    path.display(),
                    line_no + 1
                ))
            })?;
            table.docs.push(doc);
        }
        table.recompute_stats();
        info!(
            "loaded page table: {} documents, avg word count {:.2}",
            table.total_doc(),
            table.avg_word_count
        );
        Ok(table)
    }

    pub fn recompute_stats(&mut self) {
        if self.docs.is_empty() {
            self.avg_word_count = 0.0;
            return;
        }
        let total: u64 = self.docs.iter().map(|d| d.word_count as u64).sum();
        self.avg_word_count = total as f64 / self.docs.len() as f64;
    }

    /// Binary search by docId; the table is sorted by construction.
    pub fn find_doc_index(&self, doc_id: u32) -> Option<usize> {
        self.docs.binary_search_by_key(&doc_id, |d| d.doc_id).ok()
    }

    /// BM25 document length. A scored docId missing from the table is
    /// treated as an average-length document and logged once.
    pub fn doc_len(&self, doc_id: u32) -> f64 {
        match self.find_doc_index(doc_id) {
            Some(index) => self.docs[index].word_count as f64,
            None => {
                if !self.miss_logged.swap(true, Ordering::Relaxed) {
                    warn!(
                        "docId {} not in page table, falling back to average length",
                        doc_id
                    );
                }
                self.avg_word_count
            }
        }
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_doc_line(line: &str) -> Option<Document> {
    let mut fields = line.split_ascii_whitespace();
    let doc = Document {
        doc_id: fields.next()?.parse().ok()?,
        data_length: fields.next()?.parse().ok()?,
        word_count: fields.next()?.parse().ok()?,
        doc_pos: fields.next()?.parse().ok()?,
    };
    if fields.next().is_some() {
        return None;
    }
    Some(doc)
}
