use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use log::info;
use rustc_hash::FxHashMap;

use crate::config::{AVG_WORD_BYTES, POST_BYTES};
use crate::utils::paths::run_file_path;
use crate::utils::posting::Posting;

/// Accumulates postings in memory and spills them to numbered,
/// term-sorted run files whenever the byte estimate would cross the
/// budget. Within one term's list docIds are strictly increasing
/// because documents arrive in docId order.
pub struct RunWriter {
    buffer: FxHashMap<String, Vec<Posting>>,
    current_bytes: usize,
    budget_bytes: usize,
    run_count: u32,
    runs_dir: PathBuf,
}

impl RunWriter {
    /// Creates the run directory and clears any stale run files from a
    /// previous build.
    pub fn new(runs_dir: PathBuf, budget_bytes: usize) -> io::Result<Self> {
        fs::create_dir_all(&runs_dir)?;
        for entry in fs::read_dir(&runs_dir)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(path)?;
            }
        }
        Ok(RunWriter {
            buffer: FxHashMap::default(),
            current_bytes: 0,
            budget_bytes,
            run_count: 0,
            runs_dir,
        })
    }

    pub fn insert(&mut self, term: &str, doc_id: u32, freq: u32) -> io::Result<()> {
        let cost = self.insert_cost(term);
        if self.current_bytes + cost > self.budget_bytes && !self.buffer.is_empty() {
            self.flush()?;
        }
        // after a flush the term is new to the buffer again
        let cost = self.insert_cost(term);
        self.buffer
            .entry(term.to_string())
            .or_default()
            .push(Posting::new(doc_id, freq));
        self.current_bytes += cost;
        Ok(())
    }

    fn insert_cost(&self, term: &str) -> usize {
        if self.buffer.contains_key(term) {
            POST_BYTES
        } else {
            POST_BYTES + AVG_WORD_BYTES
        }
    }

    /// Writes the buffer as one run, terms in ascending byte order.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let path = run_file_path(&self.runs_dir, self.run_count);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);

        let mut terms: Vec<&String> = self.buffer.keys().collect();
        terms.sort_unstable();
        for term in terms {
            let postings = &self.buffer[term];
            write!(writer, "{}:", term)?;
            for (i, posting) in postings.iter().enumerate() {
                if i > 0 {
                    write!(writer, ",")?;
                }
                write!(writer, "{} {}", posting.doc_id, posting.freq)?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        info!(
            "flushed run {} ({} terms, ~{} buffered bytes)",
            self.run_count,
            self.buffer.len(),
            self.current_bytes
        );

        self.buffer.clear();
        self.current_bytes = 0;
        self.run_count += 1;
        Ok(())
    }

    /// Flushes the residual buffer and reports how many runs exist.
    pub fn finish(mut self) -> io::Result<u32> {
        self.flush()?;
        Ok(self.run_count)
    }

    pub fn run_count(&self) -> u32 {
        self.run_count
    }

    pub fn current_bytes(&self) -> usize {
        self.current_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_run(dir: &std::path::Path, run_no: u32) -> String {
        fs::read_to_string(run_file_path(dir, run_no)).unwrap()
    }

    #[test]
    fn test_single_run_sorted_terms() {
        let dir = tempdir().unwrap();
        let mut writer = RunWriter::new(dir.path().to_path_buf(), 1 << 20).unwrap();
        writer.insert("dog", 1, 2).unwrap();
        writer.insert("cat", 1, 1).unwrap();
        writer.insert("cat", 2, 3).unwrap();
        writer.insert("ant", 3, 1).unwrap();
        let runs = writer.finish().unwrap();
        assert_eq!(runs, 1);
        assert_eq!(
            read_run(dir.path(), 0),
            "ant:3 1\ncat:1 1,2 3\ndog:1 2\n"
        );
    }

    #[test]
    fn test_byte_estimator() {
        let dir = tempdir().unwrap();
        let mut writer = RunWriter::new(dir.path().to_path_buf(), 1 << 20).unwrap();
        writer.insert("cat", 1, 1).unwrap();
        assert_eq!(writer.current_bytes(), POST_BYTES + AVG_WORD_BYTES);
        writer.insert("cat", 2, 1).unwrap();
        assert_eq!(writer.current_bytes(), 2 * POST_BYTES + AVG_WORD_BYTES);
        writer.insert("dog", 2, 1).unwrap();
        assert_eq!(writer.current_bytes(), 3 * POST_BYTES + 2 * AVG_WORD_BYTES);
    }

    #[test]
    fn test_budget_triggers_flush_before_insert() {
        let dir = tempdir().unwrap();
        // room for exactly two new-term inserts
        let budget = 2 * (POST_BYTES + AVG_WORD_BYTES);
        let mut writer = RunWriter::new(dir.path().to_path_buf(), budget).unwrap();
        writer.insert("a", 1, 1).unwrap();
        writer.insert("b", 1, 1).unwrap();
        assert_eq!(writer.run_count(), 0);
        // this one would exceed the budget, so the buffer spills first
        writer.insert("c", 1, 1).unwrap();
        assert_eq!(writer.run_count(), 1);
        assert_eq!(writer.current_bytes(), POST_BYTES + AVG_WORD_BYTES);
        let runs = writer.finish().unwrap();
        assert_eq!(runs, 2);
        assert_eq!(read_run(dir.path(), 0), "a:1 1\nb:1 1\n");
        assert_eq!(read_run(dir.path(), 1), "c:1 1\n");
    }

    #[test]
    fn test_term_split_across_runs_stays_sorted() {
        let dir = tempdir().unwrap();
        let budget = 3 * (POST_BYTES + AVG_WORD_BYTES);
        let mut writer = RunWriter::new(dir.path().to_path_buf(), budget).unwrap();
        for doc_id in 1..=20 {
            writer.insert("cat", doc_id, 1).unwrap();
        }
        let runs = writer.finish().unwrap();
        assert!(runs > 1);
        // every run mentions cat at most once, and docIds keep ascending
        let mut last_doc_id = 0;
        for run_no in 0..runs {
            let content = read_run(dir.path(), run_no);
            assert_eq!(content.matches("cat:").count(), 1);
            for pair in content.trim_end().trim_start_matches("cat:").split(',') {
                let doc_id: u32 = pair.split(' ').next().unwrap().parse().unwrap();
                assert!(doc_id > last_doc_id);
                last_doc_id = doc_id;
            }
        }
    }

    #[test]
    fn test_empty_writer_produces_no_runs() {
        let dir = tempdir().unwrap();
        let writer = RunWriter::new(dir.path().to_path_buf(), 1024).unwrap();
        assert_eq!(writer.finish().unwrap(), 0);
    }

    #[test]
    fn test_new_clears_stale_runs() {
        let dir = tempdir().unwrap();
        fs::write(run_file_path(dir.path(), 7), "stale:1 1\n").unwrap();
        let _writer = RunWriter::new(dir.path().to_path_buf(), 1024).unwrap();
        assert!(!run_file_path(dir.path(), 7).exists());
    }
}
