//! Priority queue of pending requests.
//!
//! Entries are stored in a max-heap keyed by `(priority, insertion order)`.
//! Higher priorities are popped first; ties are broken by insertion order
//! (FIFO).

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Debug)]
struct Entry<T> {
    item: T,
    priority: i32,
    /// Lower = queued earlier.
    seq: u64,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // The heap pops the greatest: highest priority, then oldest.
        self.priority
            .cmp(&other.priority)
            .then_with(|| Reverse(self.seq).cmp(&Reverse(other.seq)))
    }
}

/// A max-priority FIFO queue.
#[derive(Debug)]
pub struct RequestQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    seq: u64,
}

impl<T> RequestQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    pub fn push(&mut self, item: T, priority: i32) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Entry {
            item,
            priority,
            seq,
        });
    }

    /// Pop the highest-priority item (ties broken FIFO).
    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|e| e.item)
    }

    /// Pop the highest-priority item along with its priority.
    pub fn pop_with_priority(&mut self) -> Option<(T, i32)> {
        self.heap.pop().map(|e| (e.item, e.priority))
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Remove every item, in no particular order.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.heap)
            .into_iter()
            .map(|e| e.item)
            .collect()
    }
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
