use std::num::NonZeroUsize;
use std::sync::Arc;

use log::warn;
use lru::LruCache;

use crate::error::Result;
use crate::index::lexicon::Lexicon;
use crate::index::page_table::PageTable;
use crate::index::posting_reader::{full_postings, IndexReader};
use crate::query_parser::tokenizer::tokenize;
use crate::query_processor::retrieval_algorithms::daat::{
    daat_conjunctive, daat_max_score, TermList,
};
use crate::query_processor::retrieval_algorithms::taat::{taat_conjunctive, taat_disjunctive};
use crate::query_processor::retrieval_algorithms::top_k::DocScore;
use crate::query_processor::retrieval_algorithms::EngineContext;
use crate::scoring::bm_25::Bm25Params;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Conjunctive,
    Disjunctive,
}

impl QueryMode {
    /// Accepts the wire spellings `0`/`1` and the words used by the
    /// interactive loop.
    pub fn parse(text: &str) -> Option<QueryMode> {
        match text.trim() {
            "0" | "conjunctive" | "and" => Some(QueryMode::Conjunctive),
            "1" | "disjunctive" | "or" => Some(QueryMode::Disjunctive),
            _ => None,
        }
    }
}

/// Evaluates queries against loaded artefacts. Holds the only mutable
/// per-process query state (the decoded posting-list cache); the index,
/// lexicon and page table are read-only for the process lifetime.
pub struct QueryProcessor {
    index: IndexReader,
    lexicon: Lexicon,
    page_table: PageTable,
    params: Bm25Params,
    top_k: usize,
    use_daat: bool,
    list_cache: LruCache<String, Arc<TermList>>,
}

impl QueryProcessor {
    pub fn new(
        index: IndexReader,
        lexicon: Lexicon,
        page_table: PageTable,
        top_k: usize,
        use_daat: bool,
        cache_capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        QueryProcessor {
            index,
            lexicon,
            page_table,
            params: Bm25Params::default(),
            top_k,
            use_daat,
            list_cache: LruCache::new(capacity),
        }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    /// Tokenises the query, drops unknown terms, and runs the engine
    /// selected by mode and configuration. An empty query after
    /// tokenisation is an empty result, not an error.
    pub fn process_query(&mut self, query: &str, mode: QueryMode) -> Result<Vec<DocScore>> {
        let mut terms: Vec<String> = Vec::new();
        for token in tokenize(query) {
            if terms.contains(&token) {
                continue;
            }
            if !self.lexicon.contains(&token) {
                warn!("query term {:?} not in lexicon, dropping", token);
                continue;
            }
            terms.push(token);
        }
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        if self.use_daat {
            let lists = self.term_lists(&terms)?;
            let ctx = EngineContext {
                reader: &self.index,
                page_table: &self.page_table,
                params: &self.params,
            };
            let list_refs: Vec<&TermList> = lists.iter().map(Arc::as_ref).collect();
            match mode {
                QueryMode::Conjunctive => daat_conjunctive(&ctx, &list_refs, self.top_k),
                QueryMode::Disjunctive => daat_max_score(&ctx, &list_refs, self.top_k),
            }
        } else {
            let mut entries = Vec::with_capacity(terms.len());
            for term in &terms {
                if let Some(entry) = self.lexicon.get(term) {
                    entries.push((term.clone(), *entry));
                }
            }
            let ctx = EngineContext {
                reader: &self.index,
                page_table: &self.page_table,
                params: &self.params,
            };
            match mode {
                QueryMode::Conjunctive => taat_conjunctive(&ctx, &entries, self.top_k),
                QueryMode::Disjunctive => taat_disjunctive(&ctx, &entries, self.top_k),
            }
        }
    }

    fn term_lists(&mut self, terms: &[String]) -> Result<Vec<Arc<TermList>>> {
        let mut lists = Vec::with_capacity(terms.len());
        for term in terms {
            if let Some(list) = self.list_cache.get(term) {
                lists.push(Arc::clone(list));
                continue;
            }
            let Some(entry) = self.lexicon.get(term) else {
                continue;
            };
            let postings = full_postings(&self.index, entry)?;
            let mut doc_ids = Vec::with_capacity(postings.len());
            let mut freqs = Vec::with_capacity(postings.len());
            for posting in postings {
                doc_ids.push(posting.doc_id);
                freqs.push(posting.freq);
            }
            let list = Arc::new(TermList {
                doc_ids,
                freqs,
                doc_freq: entry.doc_freq,
            });
            self.list_cache.put(term.clone(), Arc::clone(&list));
            lists.push(list);
        }
        Ok(lists)
    }
}
