use std::collections::BTreeMap;

use crate::error::Result;
use crate::index::lexicon::LexiconEntry;
use crate::index::posting_reader::BlockCursor;
use crate::query_processor::retrieval_algorithms::top_k::{DocScore, TopK};
use crate::query_processor::retrieval_algorithms::EngineContext;

/// Term-at-a-time disjunctive (OR) evaluation: one score accumulator
/// slot per document, filled term by term. Memory is O(totalDoc),
/// acceptable while the corpus fits a per-query vector.
pub fn taat_disjunctive(
    ctx: &EngineContext,
    terms: &[(String, LexiconEntry)],
    k: usize,
) -> Result<Vec<DocScore>> {
    let total_doc = ctx.page_table.total_doc() as usize;
    let mut scores = vec![0.0f64; total_doc];
    let mut matched = vec![false; total_doc];
    // postings whose docId is missing from the page table still score
    // (the average document length stands in for theirs) and live in a
    // docId-keyed side map instead of the slot-indexed accumulator
    let mut orphans: BTreeMap<u32, f64> = BTreeMap::new();

    for (_, entry) in terms {
        let mut cursor = BlockCursor::new(ctx.reader, entry);
        while let Some((header, payload_pos)) = cursor.next_block()? {
            for chunk_index in 0..header.chunk_count() {
                let (doc_ids, freqs) =
                    ctx.reader
                        .decode_chunk_postings(&header, payload_pos, chunk_index)?;
                for (doc_id, freq) in doc_ids.into_iter().zip(freqs) {
                    let contribution = ctx.score(entry.doc_freq, doc_id, freq);
                    match ctx.page_table.find_doc_index(doc_id) {
                        Some(slot) => {
                            scores[slot] += contribution;
                            matched[slot] = true;
                        }
                        None => {
                            *orphans.entry(doc_id).or_insert(0.0) += contribution;
                        }
                    }
                }
            }
        }
    }

    let mut top_k = TopK::new(k);
    for (slot, &hit) in matched.iter().enumerate() {
        if hit {
            top_k.push(ctx.page_table.docs()[slot].doc_id, scores[slot]);
        }
    }
    for (doc_id, score) in orphans {
        top_k.push(doc_id, score);
    }
    Ok(top_k.into_sorted())
}

/// Term-at-a-time conjunctive (AND) evaluation: seed an ordered
/// candidate map from the rarest term, then stream every other term's
/// blocks, keeping only candidates found in each list.
pub fn taat_conjunctive(
    ctx: &EngineContext,
    terms: &[(String, LexiconEntry)],
    k: usize,
) -> Result<Vec<DocScore>> {
    if terms.is_empty() {
        return Ok(Vec::new());
    }
    let rarest = terms
        .iter()
        .enumerate()
        .min_by_key(|(_, (_, entry))| entry.doc_freq)
        .map(|(index, _)| index)
        .unwrap_or(0);

    let mut candidates: BTreeMap<u32, f64> = BTreeMap::new();
    {
        let (_, entry) = &terms[rarest];
        let mut cursor = BlockCursor::new(ctx.reader, entry);
        while let Some((header, payload_pos)) = cursor.next_block()? {
            for chunk_index in 0..header.chunk_count() {
                let (doc_ids, freqs) =
                    ctx.reader
                        .decode_chunk_postings(&header, payload_pos, chunk_index)?;
                for (doc_id, freq) in doc_ids.into_iter().zip(freqs) {
                    candidates.insert(doc_id, ctx.score(entry.doc_freq, doc_id, freq));
                }
            }
        }
    }

    for (index, (_, entry)) in terms.iter().enumerate() {
        if index == rarest {
            continue;
        }
        intersect_into(ctx, entry, &mut candidates)?;
        if candidates.is_empty() {
            break;
        }
    }

    let mut top_k = TopK::new(k);
    for (doc_id, score) in candidates {
        top_k.push(doc_id, score);
    }
    Ok(top_k.into_sorted())
}

/// Walks `entry`'s blocks once, in step with the ascending candidate
/// set: blocks whose lastDocId maximum lies below a candidate are
/// skipped without touching their payloads, and only the chunk that
/// may hold the candidate is decoded. Candidates absent from the list
/// are erased; present ones accumulate the term's contribution.
fn intersect_into(
    ctx: &EngineContext,
    entry: &LexiconEntry,
    candidates: &mut BTreeMap<u32, f64>,
) -> Result<()> {
    let mut cursor = BlockCursor::new(ctx.reader, entry);
    let mut current = cursor.next_block()?;
    // (chunk index, docIds, freqs) of the chunk decoded last
    let mut decoded: Option<(usize, Vec<u32>, Vec<u32>)> = None;

    let doc_ids: Vec<u32> = candidates.keys().copied().collect();
    for doc_id in doc_ids {
        // skip blocks that end before this candidate
        loop {
            match &current {
                Some((header, _)) if header.max_last_doc_id() < doc_id => {
                    current = cursor.next_block()?;
                    decoded = None;
                }
                _ => break,
            }
        }
        let Some((header, payload_pos)) = &current else {
            // list exhausted, no later candidate can match either
            candidates.split_off(&doc_id);
            break;
        };

        let chunk_index = header.last_doc_ids.partition_point(|&last| last < doc_id);
        let reuse = matches!(&decoded, Some((index, _, _)) if *index == chunk_index);
        if !reuse {
            let (ids, freqs) = ctx
                .reader
                .decode_chunk_postings(header, *payload_pos, chunk_index)?;
            decoded = Some((chunk_index, ids, freqs));
        }
        if let Some((_, ids, freqs)) = &decoded {
            match ids.binary_search(&doc_id) {
                Ok(position) => {
                    let contribution = ctx.score(entry.doc_freq, doc_id, freqs[position]);
                    if let Some(score) = candidates.get_mut(&doc_id) {
                        *score += contribution;
                    }
                }
                Err(_) => {
                    candidates.remove(&doc_id);
                }
            }
        }
    }
    Ok(())
}
