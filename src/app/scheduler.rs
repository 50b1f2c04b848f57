//! Delayed tasks for the UI thread
//!
//! Auto-dismissal and the post-activation settle delay are both expressed as
//! tasks queued here and run by the `UiRuntime` when their deadline passes.
//! Nothing ever sleeps on the UI thread.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Instant;

use crate::app::coordinator::Coordinator;

/// Work that runs on the UI thread with the coordinator borrowed mutably
pub type Task = Box<dyn FnOnce(&mut Coordinator) + Send>;

/// Cancellation token for one scheduled task
///
/// Clones share the same flag. Cancelling after the task ran is harmless.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::SeqCst)
    }
}

struct Entry<T> {
    deadline: Instant,
    seq: u64,
    handle: TaskHandle,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed: BinaryHeap is a max-heap, we want the earliest deadline on top
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Deadline-ordered queue; equal deadlines run in scheduling order
pub struct TimerQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, deadline: Instant, handle: TaskHandle, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            deadline,
            seq,
            handle,
            item,
        });
    }

    /// Next due, non-cancelled item; cancelled entries are discarded on the way
    pub fn pop_due(&mut self, now: Instant) -> Option<T> {
        while let Some(top) = self.heap.peek() {
            if top.handle.is_cancelled() {
                self.heap.pop();
                continue;
            }
            if top.deadline > now {
                return None;
            }
            return self.heap.pop().map(|entry| entry.item);
        }
        None
    }

    /// Earliest deadline among pending, non-cancelled entries
    pub fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(top) = self.heap.peek() {
            if top.handle.is_cancelled() {
                self.heap.pop();
            } else {
                return Some(top.deadline);
            }
        }
        None
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pops_in_deadline_order() {
        let start = Instant::now();
        let mut queue = TimerQueue::new();
        queue.push(start + Duration::from_millis(500), TaskHandle::new(), "settle");
        queue.push(start + Duration::from_millis(100), TaskHandle::new(), "early");
        queue.push(start + Duration::from_millis(5000), TaskHandle::new(), "dismiss");

        let later = start + Duration::from_secs(10);
        assert_eq!(queue.pop_due(later), Some("early"));
        assert_eq!(queue.pop_due(later), Some("settle"));
        assert_eq!(queue.pop_due(later), Some("dismiss"));
        assert_eq!(queue.pop_due(later), None);
    }

    #[test]
    fn equal_deadlines_keep_scheduling_order() {
        let at = Instant::now();
        let mut queue = TimerQueue::new();
        queue.push(at, TaskHandle::new(), 1);
        queue.push(at, TaskHandle::new(), 2);
        queue.push(at, TaskHandle::new(), 3);
        assert_eq!(queue.pop_due(at), Some(1));
        assert_eq!(queue.pop_due(at), Some(2));
        assert_eq!(queue.pop_due(at), Some(3));
    }

    #[test]
    fn nothing_due_before_deadline() {
        let start = Instant::now();
        let mut queue = TimerQueue::new();
        queue.push(start + Duration::from_millis(300), TaskHandle::new(), ());
        assert_eq!(queue.pop_due(start + Duration::from_millis(299)), None);
        assert_eq!(queue.next_deadline(), Some(start + Duration::from_millis(300)));
        assert_eq!(queue.pop_due(start + Duration::from_millis(300)), Some(()));
    }

    #[test]
    fn cancelled_entries_are_skipped() {
        let start = Instant::now();
        let mut queue = TimerQueue::new();
        let handle = TaskHandle::new();
        queue.push(start, handle.clone(), "stale");
        queue.push(start + Duration::from_millis(10), TaskHandle::new(), "fresh");
        handle.cancel();

        assert_eq!(queue.next_deadline(), Some(start + Duration::from_millis(10)));
        assert_eq!(queue.pop_due(start + Duration::from_secs(1)), Some("fresh"));
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn handle_clones_share_cancellation() {
        let handle = TaskHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(clone.is_cancelled());
    }
}
