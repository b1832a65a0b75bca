use std::fs;
use std::time::Instant;

use log::info;

use crate::config::Config;
use crate::error::Result;
use crate::index::lexicon::Lexicon;
use crate::index::page_table::PageTable;
use crate::index::posting_reader::IndexReader;
use crate::indexer::block_encoder::build_final_index;
use crate::indexer::indexer::Indexer;
use crate::indexer::run_merger::merge_runs;
use crate::query_processor::query_processor::{QueryMode, QueryProcessor};
use crate::query_processor::retrieval_algorithms::top_k::DocScore;
use crate::utils::paths::{
    final_index_path, lexicon_path, merged_index_path, page_table_path, runs_dir,
};

/// Build pipeline phases. `Ready` is also the entry state when the
/// process starts in query-only mode over pre-built artefacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Ingesting,
    Merging,
    Encoding,
    Ready,
}

#[derive(Debug, Default)]
pub struct BuildStats {
    pub docs: u32,
    pub skipped: u32,
    pub runs: u32,
    pub merged_terms: u32,
}

/// Facade over the whole engine: drives the build pipeline and owns the
/// loaded read-only artefacts for querying.
pub struct SearchEngine {
    processor: QueryProcessor,
}

impl SearchEngine {
    /// Runs the phases enabled in `config.build`, each one picking up
    /// the previous phase's on-disk artefacts, so partial rebuilds are
    /// just flag settings.
    pub fn build(config: &Config) -> Result<BuildStats> {
        fs::create_dir_all(&config.data_dir)?;
        let mut state = BuildState::Idle;
        info!("build state: {:?}", state);
        let mut stats = BuildStats::default();

        if config.build.parse {
            state = BuildState::Ingesting;
            info!("build state: {:?}", state);
            let started = Instant::now();
            let ingest = Indexer::new(config).ingest()?;
            stats.docs = ingest.docs;
            stats.skipped = ingest.skipped;
            stats.runs = ingest.runs;
            info!("ingest took {:.2?}", started.elapsed());
        }

        if config.build.merge {
            state = BuildState::Merging;
            info!("build state: {:?}", state);
            let started = Instant::now();
            stats.merged_terms = merge_runs(
                &runs_dir(&config.data_dir),
                &merged_index_path(&config.data_dir),
            )?;
            info!("merge took {:.2?}", started.elapsed());
            if config.delete_runs {
                fs::remove_dir_all(runs_dir(&config.data_dir))?;
                info!("deleted intermediate runs");
            }
        }

        if config.build.encode {
            state = BuildState::Encoding;
            info!("build state: {:?}", state);
            let started = Instant::now();
            let mut lexicon = Lexicon::new();
            build_final_index(
                &merged_index_path(&config.data_dir),
                &final_index_path(&config.data_dir),
                &mut lexicon,
            )?;
            lexicon.write(&lexicon_path(&config.data_dir))?;
            info!("encode took {:.2?}", started.elapsed());
        }

        state = BuildState::Ready;
        info!("build state: {:?}", state);
        Ok(stats)
    }

    /// Loads pre-built artefacts and enters the `Ready` state.
    pub fn open(config: &Config) -> Result<SearchEngine> {
        let page_table = PageTable::load(&page_table_path(&config.data_dir))?;
        let lexicon = Lexicon::load(&lexicon_path(&config.data_dir))?;
        let index = IndexReader::open(&final_index_path(&config.data_dir), config.max_meta_size)?;
        Ok(SearchEngine {
            processor: QueryProcessor::new(
                index,
                lexicon,
                page_table,
                config.num_top_result,
                config.use_daat,
                config.cache_capacity,
            ),
        })
    }

    pub fn query(&mut self, query: &str, mode: QueryMode) -> Result<Vec<DocScore>> {
        self.processor.process_query(query, mode)
    }

    pub fn processor_mut(&mut self) -> &mut QueryProcessor {
        &mut self.processor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::bm_25::{term_score, Bm25Params};
    use std::path::Path;
    use tempfile::tempdir;

    fn build_corpus(dir: &Path, lines: &[&str]) -> Config {
        let mut config = Config::with_data_dir(dir);
        fs::write(&config.corpus_path, lines.join("\n") + "\n").unwrap();
        config.index_chunk_size = 1 << 20;
        SearchEngine::build(&config).unwrap();
        config
    }

    fn doc_ids(results: &[DocScore]) -> Vec<u32> {
        results.iter().map(|r| r.doc_id).collect()
    }

    #[test]
    fn test_empty_query_is_empty_result() {
        let dir = tempdir().unwrap();
        let config = build_corpus(dir.path(), &["1\thello"]);
        let mut engine = SearchEngine::open(&config).unwrap();
        assert!(engine.query("", QueryMode::Disjunctive).unwrap().is_empty());
        assert!(engine.query(",,;;", QueryMode::Disjunctive).unwrap().is_empty());
    }

    #[test]
    fn test_single_term_single_doc_score() {
        let dir = tempdir().unwrap();
        let config = build_corpus(dir.path(), &["1\thello"]);
        let mut engine = SearchEngine::open(&config).unwrap();
        let results = engine.query("hello", QueryMode::Disjunctive).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_id, 1);
        // N=1, f_t=1, tf=1, docLen=avgDocLen=1
        let expected = term_score(1, 1.0, 1.0, 1, 1, &Bm25Params::default());
        assert!((results[0].score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_conjunctive_with_absent_term_is_empty() {
        let dir = tempdir().unwrap();
        let config = build_corpus(dir.path(), &["1\tcat", "2\tcat dog"]);
        let mut engine = SearchEngine::open(&config).unwrap();
        let results = engine.query("cat mouse", QueryMode::Conjunctive).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_conjunctive_intersection_scores_sum() {
        let dir = tempdir().unwrap();
        let config = build_corpus(dir.path(), &["1\tcat", "2\tcat dog"]);
        let mut engine = SearchEngine::open(&config).unwrap();
        let results = engine.query("cat dog", QueryMode::Conjunctive).unwrap();
        assert_eq!(doc_ids(&results), vec![2]);

        let params = Bm25Params::default();
        // doc 2 has 2 distinct terms, avg doc len is 1.5, N = 2
        let expected = term_score(1, 2.0, 1.5, 2, 2, &params) // cat: f_t = 2
            + term_score(1, 2.0, 1.5, 2, 1, &params); // dog: f_t = 1
        assert!((results[0].score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_top_k_tie_resolves_to_ascending_doc_ids() {
        let dir = tempdir().unwrap();
        // identical documents produce identical scores for "a"
        let config = build_corpus(dir.path(), &["1\ta b", "2\ta b"]);
        let mut engine = SearchEngine::open(&config).unwrap();
        let results = engine.query("a", QueryMode::Disjunctive).unwrap();
        assert_eq!(doc_ids(&results), vec![1, 2]);
        assert!((results[0].score - results[1].score).abs() < 1e-12);
    }

    #[test]
    fn test_disjunctive_ranks_matches_and_omits_nonmatches() {
        let dir = tempdir().unwrap();
        let config = build_corpus(
            dir.path(),
            &[
                "1\tcat cat cat cat",
                "2\tcat dog",
                "3\tdog dog bird",
                "4\tfish",
            ],
        );
        let mut engine = SearchEngine::open(&config).unwrap();
        let results = engine.query("cat dog", QueryMode::Disjunctive).unwrap();
        // doc 4 shares no term and must not appear, even with K = 20
        assert!(!doc_ids(&results).contains(&4));
        assert_eq!(results.len(), 3);
    }

    fn agreement_corpus() -> Vec<String> {
        // ~80 docs with overlapping vocabulary and skewed frequencies
        let words = ["ant", "bee", "cat", "dog", "elk", "fox", "gnu"];
        let mut lines = Vec::new();
        for doc_id in 0..80u32 {
            let mut text = Vec::new();
            for (index, word) in words.iter().enumerate() {
                let index = index as u32;
                if doc_id % (index + 2) == 0 {
                    for _ in 0..(doc_id % 3 + 1) {
                        text.push(*word);
                    }
                }
            }
            if text.is_empty() {
                text.push("ant");
            }
            lines.push(format!("{}\t{}", doc_id, text.join(" ")));
        }
        lines
    }

    fn results_match(a: &[DocScore], b: &[DocScore]) {
        assert_eq!(doc_ids(a), doc_ids(b));
        for (x, y) in a.iter().zip(b) {
            assert!(
                (x.score - y.score).abs() < 1e-9,
                "doc {}: {} vs {}",
                x.doc_id,
                x.score,
                y.score
            );
        }
    }

    #[test]
    fn test_taat_and_daat_engines_agree() {
        let dir = tempdir().unwrap();
        let lines = agreement_corpus();
        let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let config = build_corpus(dir.path(), &line_refs);

        let mut taat_config = config.clone();
        taat_config.use_daat = false;
        let mut daat_config = config.clone();
        daat_config.use_daat = true;

        let mut taat = SearchEngine::open(&taat_config).unwrap();
        let mut daat = SearchEngine::open(&daat_config).unwrap();

        for query in ["cat dog", "ant bee cat", "gnu", "fox elk ant", "bee gnu fox dog"] {
            let taat_and = taat.query(query, QueryMode::Conjunctive).unwrap();
            let daat_and = daat.query(query, QueryMode::Conjunctive).unwrap();
            results_match(&taat_and, &daat_and);

            let taat_or = taat.query(query, QueryMode::Disjunctive).unwrap();
            let daat_or = daat.query(query, QueryMode::Disjunctive).unwrap();
            results_match(&taat_or, &daat_or);
        }
    }

    #[test]
    fn test_conjunctive_equals_manual_intersection() {
        let dir = tempdir().unwrap();
        let lines = agreement_corpus();
        let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let mut config = build_corpus(dir.path(), &line_refs);
        config.num_top_result = 1000;

        let mut engine = SearchEngine::open(&config).unwrap();
        let and_results = engine.query("cat dog", QueryMode::Conjunctive).unwrap();

        // every doc divisible by 4 and 5 holds both cat and dog
        let expected: Vec<u32> = (0..80).filter(|d| d % 4 == 0 && d % 5 == 0).collect();
        let mut got = doc_ids(&and_results);
        got.sort_unstable();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_partial_rebuild_from_existing_runs() {
        let dir = tempdir().unwrap();
        let mut config = Config::with_data_dir(dir.path());
        fs::write(&config.corpus_path, "1\tcat dog\n2\tcat\n").unwrap();

        // phase 1 only: ingest
        config.build = crate::config::BuildFlags {
            parse: true,
            merge: false,
            encode: false,
        };
        SearchEngine::build(&config).unwrap();
        assert!(!merged_index_path(&config.data_dir).exists());

        // phases 2+3 re-use the runs on disk
        config.build = crate::config::BuildFlags {
            parse: false,
            merge: true,
            encode: true,
        };
        SearchEngine::build(&config).unwrap();

        let mut engine = SearchEngine::open(&config).unwrap();
        let results = engine.query("cat", QueryMode::Disjunctive).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_delete_runs_after_merge() {
        let dir = tempdir().unwrap();
        let mut config = Config::with_data_dir(dir.path());
        fs::write(&config.corpus_path, "1\tcat\n").unwrap();
        config.delete_runs = true;
        SearchEngine::build(&config).unwrap();
        assert!(!runs_dir(&config.data_dir).exists());
        let mut engine = SearchEngine::open(&config).unwrap();
        assert_eq!(engine.query("cat", QueryMode::Disjunctive).unwrap().len(), 1);
    }

    #[test]
    fn test_chunk_boundary_corpus_queries_correctly() {
        // one term in 129 documents crosses two chunk boundaries
        let dir = tempdir().unwrap();
        let mut lines: Vec<String> = (1..=129).map(|d| format!("{}\tcommon", d)).collect();
        lines.push("200\tcommon rare".to_string());
        let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let mut config = build_corpus(dir.path(), &line_refs);
        config.num_top_result = 200;

        let mut engine = SearchEngine::open(&config).unwrap();
        let results = engine.query("common", QueryMode::Disjunctive).unwrap();
        assert_eq!(results.len(), 130);
        let results = engine.query("common rare", QueryMode::Conjunctive).unwrap();
        assert_eq!(doc_ids(&results), vec![200]);
    }

    #[test]
    fn test_page_table_miss_scores_with_average_length() {
        let dir = tempdir().unwrap();
        let config = build_corpus(
            dir.path(),
            &["1\tcat dog", "2\tcat", "3\tbird", "4\tdog bird fish"],
        );

        // drop doc 2 from the page table; its postings stay in the index
        let table_path = page_table_path(&config.data_dir);
        let kept: Vec<String> = fs::read_to_string(&table_path)
            .unwrap()
            .lines()
            .filter(|line| !line.starts_with("2 "))
            .map(str::to_string)
            .collect();
        fs::write(&table_path, kept.join("\n") + "\n").unwrap();

        let mut engine = SearchEngine::open(&config).unwrap();
        let results = engine.query("cat", QueryMode::Disjunctive).unwrap();
        // doc 2 still ranks, scored as an average-length document:
        // N = 3, avg doc len = 2, cat doc_freq = 2, tf = 1 for both docs
        assert_eq!(doc_ids(&results), vec![1, 2]);
        let expected = term_score(1, 2.0, 2.0, 3, 2, &Bm25Params::default());
        for result in &results {
            assert!(result.score.is_finite());
            assert!((result.score - expected).abs() < 1e-9);
        }

        let mut daat_config = config.clone();
        daat_config.use_daat = true;
        let mut daat = SearchEngine::open(&daat_config).unwrap();
        let daat_results = daat.query("cat", QueryMode::Disjunctive).unwrap();
        assert_eq!(doc_ids(&daat_results), vec![1, 2]);
    }

    #[test]
    fn test_open_missing_artefacts_fails() {
        let dir = tempdir().unwrap();
        let config = Config::with_data_dir(dir.path());
        assert!(SearchEngine::open(&config).is_err());
    }
}
