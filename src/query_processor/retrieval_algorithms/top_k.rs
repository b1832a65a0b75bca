use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocScore {
    pub doc_id: u32,
    pub score: f64,
}

#[derive(Debug, PartialEq)]
struct HeapEntry(DocScore);

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // lower score is worse; on equal scores the larger docId is
        // worse, so ties resolve to the smaller docId deterministically
        self.0
            .score
            .total_cmp(&other.0.score)
            .then_with(|| other.0.doc_id.cmp(&self.0.doc_id))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Size-bounded min-heap keeping the K best (score, docId) pairs.
pub struct TopK {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    capacity: usize,
}

impl TopK {
    pub fn new(capacity: usize) -> Self {
        TopK {
            heap: BinaryHeap::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, doc_id: u32, score: f64) {
        if self.capacity == 0 {
            return;
        }
        let entry = HeapEntry(DocScore { doc_id, score });
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(entry));
            return;
        }
        let beats_minimum = self.heap.peek().is_some_and(|Reverse(min)| entry > *min);
        if beats_minimum {
            self.heap.pop();
            self.heap.push(Reverse(entry));
        }
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// The score a candidate must beat once the heap is full.
    pub fn threshold(&self) -> f64 {
        if self.is_full() {
            self.heap.peek().map(|e| e.0 .0.score).unwrap_or(0.0)
        } else {
            0.0
        }
    }

    /// Results in descending score order, ascending docId on ties.
    pub fn into_sorted(self) -> Vec<DocScore> {
        let mut results: Vec<DocScore> = Vec::with_capacity(self.heap.len());
        let mut heap = self.heap;
        while let Some(Reverse(entry)) = heap.pop() {
            results.push(entry.0);
        }
        results.reverse();
        results
    }
}
