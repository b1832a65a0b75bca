use crate::config::MAX_DOC_ID;
use crate::error::Result;
use crate::query_processor::retrieval_algorithms::top_k::{DocScore, TopK};
use crate::query_processor::retrieval_algorithms::EngineContext;

/// One query term's fully decoded posting list plus its corpus stats.
/// Document-at-a-time evaluation materialises the lists up front;
/// queries are short, lists decode once.
pub struct TermList {
    pub doc_ids: Vec<u32>,
    pub freqs: Vec<u32>,
    pub doc_freq: u32,
}

impl TermList {
    fn head(&self, cursor: usize) -> u32 {
        self.doc_ids.get(cursor).copied().unwrap_or(MAX_DOC_ID)
    }

    /// Index of the first posting with docId >= target, continuing
    /// from `cursor`. The lists are sorted, so this is a binary search
    /// over the remaining suffix.
    fn next_geq(&self, cursor: usize, target: u32) -> usize {
        cursor + self.doc_ids[cursor..].partition_point(|&doc_id| doc_id < target)
    }
}

/// Document-at-a-time conjunctive (AND) evaluation: keep one cursor per
/// list and align them all on a rising target docId. When every cursor
/// agrees the document is scored across all terms, then the target
/// moves past it and the alignment restarts; a single exhausted list
/// ends the query.
pub fn daat_conjunctive(
    ctx: &EngineContext,
    lists: &[&TermList],
    k: usize,
) -> Result<Vec<DocScore>> {
    let mut top_k = TopK::new(k);
    if lists.is_empty() || lists.iter().any(|list| list.doc_ids.is_empty()) {
        return Ok(top_k.into_sorted());
    }

    let mut cursors = vec![0usize; lists.len()];
    let mut target = lists
        .iter()
        .map(|list| list.doc_ids[0])
        .max()
        .unwrap_or(MAX_DOC_ID);

    'align: loop {
        if target == MAX_DOC_ID {
            break;
        }
        for (index, list) in lists.iter().enumerate() {
            cursors[index] = list.next_geq(cursors[index], target);
            let head = list.head(cursors[index]);
            if head != target {
                if head == MAX_DOC_ID {
                    break 'align;
                }
                target = head;
                continue 'align;
            }
        }
        // all cursors agree on target: score it across every term
        let mut score = 0.0;
        for (index, list) in lists.iter().enumerate() {
            score += ctx.score(list.doc_freq, target, list.freqs[cursors[index]]);
        }
        top_k.push(target, score);
        // advance every cursor past the scored document
        match target.checked_add(1) {
            Some(next) => target = next,
            None => break,
        }
    }
    Ok(top_k.into_sorted())
}

/// Document-at-a-time disjunctive (OR) evaluation with MaxScore early
/// termination. Candidates are visited in ascending docId order; once
/// the heap is full and the summed per-term upper bounds cannot beat
/// its minimum, no unseen document can enter the top-K.
pub fn daat_max_score(
    ctx: &EngineContext,
    lists: &[&TermList],
    k: usize,
) -> Result<Vec<DocScore>> {
    let mut top_k = TopK::new(k);
    if lists.is_empty() {
        return Ok(top_k.into_sorted());
    }

    // exact per-list score ceilings; the lists are already materialised
    // so a linear scan is cheaper than any approximation
    let upper_bound_sum: f64 = lists
        .iter()
        .map(|list| {
            list.doc_ids
                .iter()
                .zip(&list.freqs)
                .map(|(&doc_id, &freq)| ctx.score(list.doc_freq, doc_id, freq))
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .filter(|bound| bound.is_finite())
        .sum();

    let mut cursors = vec![0usize; lists.len()];
    let mut current = lists
        .iter()
        .map(|list| list.head(0))
        .min()
        .unwrap_or(MAX_DOC_ID);

    while current != MAX_DOC_ID {
        let mut score = 0.0;
        let mut next = MAX_DOC_ID;
        for (index, list) in lists.iter().enumerate() {
            if list.head(cursors[index]) == current {
                score += ctx.score(list.doc_freq, current, list.freqs[cursors[index]]);
                cursors[index] += 1;
            }
            next = next.min(list.head(cursors[index]));
        }
        top_k.push(current, score);
        if top_k.is_full() && upper_bound_sum <= top_k.threshold() {
            break;
        }
        current = next;
    }
    Ok(top_k.into_sorted())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_geq() {
        let list = TermList {
            doc_ids: vec![2, 5, 9, 40],
            freqs: vec![1, 1, 1, 1],
            doc_freq: 4,
        };
        assert_eq!(list.next_geq(0, 1), 0);
        assert_eq!(list.next_geq(0, 5), 1);
        assert_eq!(list.next_geq(0, 6), 2);
        assert_eq!(list.next_geq(2, 9), 2);
        assert_eq!(list.next_geq(0, 41), 4);
        assert_eq!(list.head(4), MAX_DOC_ID);
    }

    #[test]
    fn test_next_geq_respects_cursor_hint() {
        let list = TermList {
            doc_ids: vec![1, 3, 5, 7],
            freqs: vec![1, 1, 1, 1],
            doc_freq: 4,
        };
        // the search never looks behind the cursor
        assert_eq!(list.next_geq(2, 2), 2);
    }
}
