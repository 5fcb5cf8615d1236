//! # Insertion-ordered priority queue for posted work items.
//!
//! [`TaskQueue`] orders items by `(priority, sequence)`. The sequence
//! counter starts at `u64::MAX` and decreases on every push, so comparing
//! both fields descending yields FIFO order among items that share a
//! priority. User code relies on that determinism: two items posted at the
//! same priority from one thread run in post order.
//!
//! The queue is internally synchronized and priority-agnostic: it orders
//! raw integers. [`Priority`] provides the conventional bands.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, PoisonError};

use crate::error::TaskError;

/// Dispatch priority of a posted work item. Larger runs earlier.
///
/// The named constants cover the usual bands; any `i32` is accepted, so
/// embedders can slot work between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub i32);

impl Priority {
    pub const LOWEST: Priority = Priority(0);
    pub const LOW: Priority = Priority(10);
    pub const MEDIUM: Priority = Priority(50);
    pub const HIGH: Priority = Priority(90);
    pub const HIGHEST: Priority = Priority(100);
}

/// Work item action. Runs to completion on the dispatch worker;
/// an `Err` aborts the dispatch loop.
pub(crate) type Action = Box<dyn FnOnce() -> Result<(), TaskError> + Send + 'static>;

struct Job {
    priority: i32,
    /// Decreasing post-time stamp; larger means posted earlier.
    sequence: u64,
    action: Action,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then the earlier (larger) sequence.
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

struct QueueInner {
    heap: BinaryHeap<Job>,
    next_sequence: u64,
}

/// Thread-safe `(priority, sequence)`-ordered container of pending work.
pub(crate) struct TaskQueue {
    inner: Mutex<QueueInner>,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                heap: BinaryHeap::new(),
                next_sequence: u64::MAX,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues an action at the given priority, stamping it with the next
    /// (decreasing) sequence number. Callable from any thread.
    pub(crate) fn push(&self, priority: Priority, action: Action) {
        let mut inner = self.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence -= 1;
        inner.heap.push(Job {
            priority: priority.0,
            sequence,
            action,
        });
    }

    /// Pops the highest-ordered item and invokes it, with the lock released
    /// during the invocation. An action error propagates after the item has
    /// been removed. Returns whether the queue still holds items.
    pub(crate) fn execute_highest(&self) -> Result<bool, TaskError> {
        let job = self.lock().heap.pop();
        let Some(job) = job else {
            return Ok(false);
        };
        (job.action)()?;
        Ok(!self.is_empty())
    }

    /// Drops every pending item without invoking it.
    pub(crate) fn clear(&self) {
        self.lock().heap.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().heap.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use proptest::prelude::*;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> Action) {
        let log: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |tag: u32| -> Action {
                let log = Arc::clone(&log);
                Box::new(move || {
                    log.lock().unwrap().push(tag);
                    Ok(())
                })
            }
        };
        (log, make)
    }

    fn drain(queue: &TaskQueue) {
        while queue.execute_highest().unwrap() {}
    }

    #[test]
    fn fifo_within_equal_priority() {
        let queue = TaskQueue::new();
        let (log, item) = recorder();

        for tag in [1, 2, 3] {
            queue.push(Priority::MEDIUM, item(tag));
        }
        drain(&queue);

        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn higher_priority_pops_first() {
        let queue = TaskQueue::new();
        let (log, item) = recorder();

        queue.push(Priority::LOW, item(1));
        queue.push(Priority::HIGH, item(2));
        queue.push(Priority::MEDIUM, item(3));
        drain(&queue);

        assert_eq!(*log.lock().unwrap(), vec![2, 3, 1]);
    }

    #[test]
    fn clear_drops_items_uninvoked() {
        let queue = TaskQueue::new();
        let (log, item) = recorder();

        queue.push(Priority::HIGH, item(1));
        queue.push(Priority::LOW, item(2));
        queue.clear();

        assert!(queue.is_empty());
        drain(&queue);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_item_is_removed_before_the_error_surfaces() {
        let queue = TaskQueue::new();
        let (log, item) = recorder();

        queue.push(
            Priority::HIGH,
            Box::new(|| Err(TaskError::failed("boom"))),
        );
        queue.push(Priority::LOW, item(1));

        assert!(queue.execute_highest().is_err());
        assert_eq!(queue.len(), 1);
        drain(&queue);
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    proptest! {
        /// Execution order must equal a stable sort of the posted items by
        /// descending priority.
        #[test]
        fn pop_order_is_stable_priority_sort(priorities in prop::collection::vec(-3i32..3, 0..64)) {
            let queue = TaskQueue::new();
            let (log, item) = recorder();

            for (idx, pri) in priorities.iter().enumerate() {
                queue.push(Priority(*pri), item(idx as u32));
            }
            drain(&queue);

            let mut expected: Vec<(i32, u32)> = priorities
                .iter()
                .enumerate()
                .map(|(idx, pri)| (*pri, idx as u32))
                .collect();
            expected.sort_by(|a, b| b.0.cmp(&a.0));
            let expected: Vec<u32> = expected.into_iter().map(|(_, idx)| idx).collect();

            prop_assert_eq!(&*log.lock().unwrap(), &expected);
        }
    }
}
