use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

// On-disk contract. These four (together with the varbyte scheme and the
// tokenizer separator set) are baked into every index file; changing any
// of them requires a full rebuild.
//
// All multi-byte integers in the final index are little-endian, so the
// file is portable across hosts.
pub const POSTINGS_PER_CHUNK: usize = 64;
pub const BLOCK_SIZE: usize = 64 * 1024;
/// Per-chunk header cost inside a block: lastDocId + docIdSize + freqSize.
pub const CHUNK_HEADER_BYTES: usize = 3 * 4;
/// Fixed block header cost: the u32 chunk count.
pub const BLOCK_LEN_BYTES: usize = 4;

// Run-buffer byte estimator: a posting costs POST_BYTES, a first-seen
// term additionally AVG_WORD_BYTES.
pub const POST_BYTES: usize = 10;
pub const AVG_WORD_BYTES: usize = 12;

pub const INDEX_CHUNK_SIZE: usize = 20 * 1024 * 1024;
pub const INDEX_BUFFER_SIZE: usize = 10 * 1024 * 1024;
pub const NUM_TOP_RESULT: usize = 20;
pub const MAX_META_SIZE: usize = 8192;

/// Sentinel returned by cursor advances once a list is exhausted.
/// A corpus docId of u32::MAX would collide and is rejected at ingest.
pub const MAX_DOC_ID: u32 = u32::MAX;

/// Which build phases to run; any suffix of the pipeline can be re-run
/// against artefacts already on disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BuildFlags {
    pub parse: bool,
    pub merge: bool,
    pub encode: bool,
}

impl Default for BuildFlags {
    fn default() -> Self {
        BuildFlags {
            parse: true,
            merge: true,
            encode: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding every build artefact (runs, merged stream,
    /// final index, lexicon, page table).
    pub data_dir: PathBuf,
    /// Line-delimited corpus: `docId \t text`.
    pub corpus_path: PathBuf,
    /// Run-buffer memory budget in bytes.
    pub index_chunk_size: usize,
    /// Ingest read-buffer size in bytes.
    pub index_buffer_size: usize,
    pub num_top_result: usize,
    /// Sanity cap on a block header read; headers larger than this are
    /// treated as corruption.
    pub max_meta_size: usize,
    /// Evaluate with DAAT engines instead of TAAT.
    pub use_daat: bool,
    pub build: BuildFlags,
    /// Remove intermediate run files after a successful merge.
    pub delete_runs: bool,
    /// Decoded posting-list cache entries kept by the query processor.
    pub cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            corpus_path: PathBuf::from("data/collection.tsv"),
            index_chunk_size: INDEX_CHUNK_SIZE,
            index_buffer_size: INDEX_BUFFER_SIZE,
            num_top_result: NUM_TOP_RESULT,
            max_meta_size: MAX_META_SIZE,
            use_daat: false,
            build: BuildFlags::default(),
            delete_runs: false,
            cache_capacity: 64,
        }
    }
}

impl Config {
    /// Defaults rooted at `data_dir`, with the corpus expected at
    /// `<data_dir>/collection.tsv`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Config {
            corpus_path: data_dir.join("collection.tsv"),
            data_dir,
            ..Config::default()
        }
    }

    pub fn load(path: &Path) -> Result<Config> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }
}
