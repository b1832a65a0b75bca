use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::info;

use crate::utils::posting::{merge_postings, Posting};

/// Streaming reader over one term-sorted run (or merged) file.
pub struct RunReader {
    reader: BufReader<File>,
    current: Option<(String, Vec<Posting>)>,
}

impl RunReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut run_reader = RunReader {
            reader: BufReader::new(file),
            current: None,
        };
        run_reader.advance()?;
        Ok(run_reader)
    }

    pub fn current(&self) -> Option<&(String, Vec<Posting>)> {
        self.current.as_ref()
    }

    /// Takes the current record and reads the next one. Any malformed
    /// record is an I/O error: runs are internal artefacts, damage to
    /// them aborts the build.
    pub fn take_and_advance(&mut self) -> io::Result<Option<(String, Vec<Posting>)>> {
        let record = self.current.take();
        self.advance()?;
        Ok(record)
    }

    fn advance(&mut self) -> io::Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                self.current = None;
                return Ok(());
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                continue;
            }
            self.current = Some(parse_run_record(trimmed)?);
            return Ok(());
        }
    }
}

/// `term:docId freq,docId freq,...`
pub fn parse_run_record(line: &str) -> io::Result<(String, Vec<Posting>)> {
    let bad = || io::Error::new(io::ErrorKind::InvalidData, format!("bad run record: {:?}", line));
    let (term, rest) = line.split_once(':').ok_or_else(bad)?;
    if term.is_empty() {
        return Err(bad());
    }
    let mut postings = Vec::new();
    for pair in rest.split(',') {
        let (doc_id, freq) = pair.split_once(' ').ok_or_else(bad)?;
        postings.push(Posting::new(
            doc_id.parse().map_err(|_| bad())?,
            freq.parse().map_err(|_| bad())?,
        ));
    }
    Ok((term.to_string(), postings))
}

fn write_run_record<W: Write>(
    writer: &mut W,
    term: &str,
    postings: &[Posting],
) -> io::Result<()> {
    write!(writer, "{}:", term)?;
    for (i, posting) in postings.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write!(writer, "{} {}", posting.doc_id, posting.freq)?;
    }
    writeln!(writer)
}

/// N-way merge of every run file in `runs_dir` into one stream where
/// each term appears exactly once with its postings concatenated in
/// docId order. Ties between runs break lexicographically on term
/// bytes, then on run number. Returns the number of merged terms.
pub fn merge_runs(runs_dir: &Path, merged_path: &Path) -> io::Result<u32> {
    let mut readers = open_run_readers(runs_dir)?;
    let out = File::create(merged_path)?;
    let mut writer = BufWriter::new(out);

    // min-heap keyed on (current term, reader index)
    let mut heap: BinaryHeap<Reverse<(String, usize)>> = BinaryHeap::new();
    for (index, reader) in readers.iter().enumerate() {
        if let Some((term, _)) = reader.current() {
            heap.push(Reverse((term.clone(), index)));
        }
    }

    let out_of_sync =
        || io::Error::new(io::ErrorKind::InvalidData, "merge heap out of sync with run reader");

    let mut no_of_terms = 0;
    while let Some(Reverse((term, index))) = heap.pop() {
        let (_, mut merged) = readers[index].take_and_advance()?.ok_or_else(out_of_sync)?;
        if let Some((next_term, _)) = readers[index].current() {
            heap.push(Reverse((next_term.clone(), index)));
        }

        // drain every other run holding the same term
        loop {
            match heap.peek() {
                Some(Reverse((top_term, _))) if *top_term == term => {}
                _ => break,
            }
            let Some(Reverse((_, other))) = heap.pop() else {
                break;
            };
            let (_, postings) = readers[other].take_and_advance()?.ok_or_else(out_of_sync)?;
            merged = merge_postings(&merged, &postings);
            if let Some((next_term, _)) = readers[other].current() {
                heap.push(Reverse((next_term.clone(), other)));
            }
        }

        write_run_record(&mut writer, &term, &merged)?;
        no_of_terms += 1;
    }
    writer.flush()?;
    info!(
        "merged {} runs into {} terms",
        readers.len(),
        no_of_terms
    );
    Ok(no_of_terms)
}

fn open_run_readers(runs_dir: &Path) -> io::Result<Vec<RunReader>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(runs_dir)? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    let mut readers = Vec::with_capacity(paths.len());
    for path in paths {
        readers.push(RunReader::open(&path)?);
    }
    Ok(readers)
}
