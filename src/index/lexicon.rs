use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{info, warn};

use crate::error::{EngineError, Result};

/// Where one term's postings live in the final index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexiconEntry {
    pub begin_pos: u64,
    pub end_pos: u64,
    pub doc_freq: u32,
    pub block_count: u32,
}

/// Term dictionary. Ordered map: persisting and diffing want sorted
/// iteration, lookup is a plain search either way.
pub struct Lexicon {
    entries: BTreeMap<String, LexiconEntry>,
}

impl Lexicon {
    pub fn new() -> Self {
        Lexicon {
            entries: BTreeMap::new(),
        }
    }

    /// Empty terms are rejected; a repeated term overwrites and should
    /// never happen with a well-formed merged stream.
    pub fn insert(&mut self, term: &str, entry: LexiconEntry) -> bool {
        if term.is_empty() {
            return false;
        }
        if self.entries.insert(term.to_string(), entry).is_some() {
            warn!("lexicon: term {:?} inserted twice", term);
        }
        true
    }

    pub fn get(&self, term: &str) -> Option<&LexiconEntry> {
        self.entries.get(term)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.entries.contains_key(term)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LexiconEntry)> {
        self.entries.iter()
    }

    /// One term per line: `term begin end docFreq blockCount`.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        for (term, entry) in &self.entries {
            writeln!(
                writer,
                "{} {} {} {} {}",
                term, entry.begin_pos, entry.end_pos, entry.doc_freq, entry.block_count
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lexicon = Lexicon::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let (term, entry) = parse_lexicon_line(&line).ok_or_else(|| {
                EngineError::corrupt(format!(
                    "lexicon {}: malformed line {}",
                    path.display(),
                    line_no + 1
                ))
            })?;
            if lexicon.entries.insert(term.to_string(), entry).is_some() {
                warn!("lexicon: duplicate term {:?} in {}", term, path.display());
            }
        }
        info!("loaded lexicon: {} terms", lexicon.len());
        Ok(lexicon)
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_lexicon_line(line: &str) -> Option<(&str, LexiconEntry)> {
    let mut fields = line.split_ascii_whitespace();
    let term = fields.next()?;
    let entry = LexiconEntry {
        begin_pos: fields.next()?.parse().ok()?,
        end_pos: fields.next()?.parse().ok()?,
        doc_freq: fields.next()?.parse().ok()?,
        block_count: fields.next()?.parse().ok()?,
    };
    if fields.next().is_some() || entry.begin_pos >= entry.end_pos {
        return None;
    }
    Some((term, entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn entry(begin_pos: u64, end_pos: u64, doc_freq: u32, block_count: u32) -> LexiconEntry {
        LexiconEntry {
            begin_pos,
            end_pos,
            doc_freq,
            block_count,
        }
    }

    #[test]
    fn test_insert_rejects_empty_term() {
        let mut lexicon = Lexicon::new();
        assert!(!lexicon.insert("", entry(0, 4, 1, 1)));
        assert!(lexicon.insert("cat", entry(0, 4, 1, 1)));
        assert_eq!(lexicon.len(), 1);
    }

    #[test]
    fn test_write_load_roundtrip() {
        let mut lexicon = Lexicon::new();
        lexicon.insert("cat", entry(0, 20, 3, 1));
        lexicon.insert("dog", entry(20, 64, 7, 1));
        lexicon.insert("zebra", entry(64, 131_072, 900, 2));

        let file = NamedTempFile::new().unwrap();
        lexicon.write(file.path()).unwrap();

        let loaded = Lexicon::load(file.path()).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.get("dog"), Some(&entry(20, 64, 7, 1)));
        assert_eq!(loaded.get("zebra"), Some(&entry(64, 131_072, 900, 2)));
        assert!(loaded.get("mouse").is_none());
    }

    #[test]
    fn test_iteration_is_term_sorted() {
        let mut lexicon = Lexicon::new();
        lexicon.insert("zebra", entry(8, 9, 1, 1));
        lexicon.insert("ant", entry(0, 4, 1, 1));
        lexicon.insert("mole", entry(4, 8, 1, 1));
        let terms: Vec<&String> = lexicon.iter().map(|(t, _)| t).collect();
        assert_eq!(terms, vec!["ant", "mole", "zebra"]);
    }

    #[test]
    fn test_load_rejects_inverted_range() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "cat 10 10 1 1\n").unwrap();
        assert!(matches!(
            Lexicon::load(file.path()),
            Err(EngineError::CorruptIndex(_))
        ));
    }
}
