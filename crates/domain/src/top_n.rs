use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::ranking::ScoredItem;

/// Heap entry ordered so the lowest-ranked item sits on top.
#[derive(Debug, Clone, Copy)]
struct LowestFirst(ScoredItem);

impl PartialEq for LowestFirst {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LowestFirst {}

impl PartialOrd for LowestFirst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LowestFirst {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.rank_cmp(&self.0)
    }
}

/// Fixed-capacity structure retaining the highest-ranked items pushed so far.
#[derive(Debug, Clone)]
pub struct BoundedTopN {
    capacity: usize,
    heap: BinaryHeap<LowestFirst>,
}

impl BoundedTopN {
    /// Creates an empty structure holding at most `capacity` items.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::new(),
        }
    }

    /// Inserts one item, evicting the lowest-ranked item on overflow.
    pub fn push(&mut self, item: ScoredItem) {
        if self.capacity == 0 {
            return;
        }

        self.heap.push(LowestFirst(item));
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    /// Returns the number of retained items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true when nothing has been retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Consumes the structure and returns retained items, best first.
    #[must_use]
    pub fn into_ranked(self) -> Vec<ScoredItem> {
        let mut ranked: Vec<ScoredItem> = self.heap.into_iter().map(|entry| entry.0).collect();
        ranked.sort_by(|left, right| right.rank_cmp(left));
        ranked
    }
}
