//! Volatile front queue popped by the dispatch loop.
//!
//! A min-heap mirror of Pending rows. In steady state it holds at most one
//! item; it is never persisted and can be cleared at any time because the
//! store is rebuilt into it on demand.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::protocol::{QueueEntry, QueueItem};

/// A mirrored Pending row.
#[derive(Debug, Clone)]
pub struct FrontItem {
    pub item: QueueItem,
    /// Row `updated_at` at promotion time (ms), used for takeover checks.
    pub updated_at: i64,
}

impl From<QueueEntry> for FrontItem {
    fn from(entry: QueueEntry) -> Self {
        Self {
            item: entry.item,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Debug)]
struct HeapEntry {
    priority: i64,
    /// Insertion sequence; breaks priority ties in FIFO order.
    seq: u64,
    front: FrontItem,
}

impl Eq for HeapEntry {}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lower priority = greater (popped first from max-heap)
        // Lower seq = greater (older entries first)
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct FrontQueue {
    heap: BinaryHeap<HeapEntry>,
    seq: u64,
}

impl FrontQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, front: FrontItem) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(HeapEntry {
            priority: front.item.priority,
            seq,
            front,
        });
    }

    #[inline]
    pub fn pop(&mut self) -> Option<FrontItem> {
        self.heap.pop().map(|entry| entry.front)
    }

    /// Priority of the item that would be popped next.
    #[inline]
    pub fn peek_priority(&self) -> Option<i64> {
        self.heap.peek().map(|entry| entry.priority)
    }

    #[inline]
    pub fn contains(&self, job_id: &str) -> bool {
        self.heap.iter().any(|entry| entry.front.item.job_id == job_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn front(job_id: &str, priority: i64) -> FrontItem {
        FrontItem {
            item: QueueItem::new(job_id, priority, json!({})),
            updated_at: 0,
        }
    }

    #[test]
    fn test_pops_lowest_priority_first() {
        let mut q = FrontQueue::new();
        q.push(front("a", 5));
        q.push(front("b", -2));
        q.push(front("c", 3));

        assert_eq!(q.peek_priority(), Some(-2));
        assert_eq!(q.pop().unwrap().item.job_id, "b");
        assert_eq!(q.pop().unwrap().item.job_id, "c");
        assert_eq!(q.pop().unwrap().item.job_id, "a");
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_ties_are_fifo() {
        let mut q = FrontQueue::new();
        q.push(front("first", 1));
        q.push(front("second", 1));
        assert_eq!(q.pop().unwrap().item.job_id, "first");
        assert_eq!(q.pop().unwrap().item.job_id, "second");
    }

    #[test]
    fn test_contains_and_clear() {
        let mut q = FrontQueue::new();
        q.push(front("a", 1));
        assert!(q.contains("a"));
        assert!(!q.contains("b"));
        assert_eq!(q.len(), 1);

        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.peek_priority(), None);
    }
}
