pub mod daat;
pub mod taat;
pub mod top_k;

use crate::index::page_table::PageTable;
use crate::index::posting_reader::IndexReader;
use crate::scoring::bm_25::{term_score, Bm25Params};

/// Read-only state shared by every retrieval engine for the duration
/// of one query.
pub struct EngineContext<'a> {
    pub reader: &'a IndexReader,
    pub page_table: &'a PageTable,
    pub params: &'a Bm25Params,
}

impl EngineContext<'_> {
    /// BM25 contribution of a term with document frequency `doc_freq`
    /// to document `doc_id` with term frequency `tf`.
    pub fn score(&self, doc_freq: u32, doc_id: u32, tf: u32) -> f64 {
        term_score(
            tf,
            self.page_table.doc_len(doc_id),
            self.page_table.avg_word_count(),
            self.page_table.total_doc(),
            doc_freq,
            self.params,
        )
    }
}
