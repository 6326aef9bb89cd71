// SPDX-License-Identifier: Apache-2.0

//! Multiple-producer, multiple-consumer FIFO queue guarded by a condition
//! variable.
//!
//! The surface is deliberately narrow: the simulator only ever appends,
//! drains, pops the front, and asks for the length. Appends never block;
//! the only blocking operation is [`SharedQueue::pop_front_wait`], which
//! waits for the non-empty condition under the crate-wide dead-lock ceiling.

use crate::WAIT_TIMEOUT;
use crate::error::WaitError;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// A thread-safe FIFO queue.
///
/// Used as a node's task inbox (producers: the packet router; consumer: the
/// owning node worker) and as a scheduler's CPU queue (producer: the owning
/// node via its load manager; consumer: the scheduler itself).
pub struct SharedQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
}

impl<T> Default for SharedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    /// Appends one item to the back of the queue. Never blocks.
    pub fn push_back(&self, item: T) {
        let mut items = self.items.lock();
        items.push_back(item);
        self.not_empty.notify_one();
    }

    /// Appends every item of the iterator to the back of the queue. Never
    /// blocks.
    pub fn extend(&self, iter: impl IntoIterator<Item = T>) {
        let mut items = self.items.lock();
        items.extend(iter);
        self.not_empty.notify_all();
    }

    /// Removes and returns the front item, or `None` when the queue is empty.
    pub fn pop_front(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Removes and returns the front item, blocking until one is available.
    ///
    /// Waits on the non-empty condition for at most [`WAIT_TIMEOUT`]; expiry
    /// is reported as a dead-lock.
    pub fn pop_front_wait(&self) -> Result<T, WaitError> {
        let mut items = self.items.lock();
        while items.is_empty() {
            if self
                .not_empty
                .wait_for(&mut items, WAIT_TIMEOUT)
                .timed_out()
            {
                return Err(WaitError::Timeout {
                    primitive: "SharedQueue",
                    timeout: WAIT_TIMEOUT,
                });
            }
        }
        // The loop above only exits with at least one item present.
        items.pop_front().ok_or(WaitError::Aborted {
            primitive: "SharedQueue",
        })
    }

    /// Removes all items, returning them in FIFO order.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` when no items are queued.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> std::fmt::Debug for SharedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order_is_preserved() {
        let queue = SharedQueue::new();
        queue.push_back(1);
        queue.extend([2, 3, 4]);

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.pop_front(), Some(1));
        assert_eq!(queue.drain(), vec![2, 3, 4]);
        assert!(queue.is_empty());
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn drain_empties_the_queue() {
        let queue: SharedQueue<u32> = SharedQueue::new();
        assert_eq!(queue.drain(), Vec::<u32>::new());

        queue.extend(0..8);
        assert_eq!(queue.drain(), (0..8).collect::<Vec<_>>());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn pop_front_wait_sees_concurrent_push() {
        let queue = Arc::new(SharedQueue::new());
        let producer_queue = queue.clone();

        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer_queue.push_back(7usize);
        });

        let value = queue.pop_front_wait().expect("producer should wake us");
        assert_eq!(value, 7);
        producer.join().expect("producer thread panicked");
    }

    #[test]
    fn concurrent_producers_lose_no_items() {
        let queue = Arc::new(SharedQueue::new());
        let mut handles = Vec::new();
        for producer in 0..4 {
            let queue = queue.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    queue.push_back(producer * 100 + i);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("producer thread panicked");
        }

        let mut items = queue.drain();
        items.sort_unstable();
        assert_eq!(items, (0..400).collect::<Vec<_>>());
    }
}
