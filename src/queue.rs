//! Lossy latest-value queue between the inference worker and the publishers.
//!
//! `push` never blocks and never grows the queue past its capacity: when the
//! queue is full the oldest unread result is discarded. Consumers block in
//! `pop` until a result arrives or shutdown is signalled. After shutdown every
//! `pop` returns `None` immediately, even if results are still buffered.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Depth used by the pipeline: only the freshest result is kept.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

pub struct ResultQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    drained: Condvar,
    capacity: usize,
}

struct QueueState<T> {
    items: VecDeque<T>,
    shutdown: bool,
    dropped: u64,
}

impl<T> ResultQueue<T> {
    /// Create a queue holding at most `capacity` results (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                shutdown: false,
                dropped: 0,
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        // A consumer that panicked while holding the lock must not wedge the pipeline.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the latest result, evicting the oldest unread one when full.
    /// Results pushed after shutdown are discarded.
    pub fn push(&self, item: T) {
        let mut state = self.lock();
        if state.shutdown {
            return;
        }
        while state.items.len() >= self.capacity {
            state.items.pop_front();
            state.dropped += 1;
        }
        state.items.push_back(item);
        drop(state);
        self.available.notify_all();
    }

    /// Block until a result is available or shutdown is signalled.
    /// `None` is the terminal signal.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                if state.items.is_empty() {
                    self.drained.notify_all();
                }
                return Some(item);
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Idempotent. Wakes every blocked consumer.
    pub fn signal_shutdown(&self) {
        let mut state = self.lock();
        state.shutdown = true;
        drop(state);
        self.available.notify_all();
        self.drained.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Number of results discarded unread because a newer one replaced them.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Wait until every buffered result has been consumed, shutdown is
    /// signalled, or `timeout` elapses. Returns true when the queue is empty.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while !state.items.is_empty() && !state.shutdown {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (next, _) = self
                .drained
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }
        state.items.is_empty()
    }
}

impl<T> Default for ResultQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn keeps_only_the_latest_value() {
        let queue = ResultQueue::new(1);
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dropped(), 2);
        assert_eq!(queue.pop(), Some(3));
    }

    #[test]
    fn bounded_ring_drops_oldest() {
        let queue = ResultQueue::new(2);
        for i in 0..5 {
            queue.push(i);
        }
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), Some(4));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let queue: ResultQueue<u8> = ResultQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn shutdown_wins_over_buffered_values() {
        let queue = ResultQueue::new(1);
        queue.push(7);
        queue.signal_shutdown();
        queue.signal_shutdown();
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.pop(), None);
        queue.push(8);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn blocked_consumer_receives_pushed_value() {
        let queue = Arc::new(ResultQueue::new(1));
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop())
        };
        thread::sleep(Duration::from_millis(20));
        queue.push(42);
        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn wait_until_drained_times_out_without_consumers() {
        let queue = ResultQueue::new(1);
        queue.push(1);
        assert!(!queue.wait_until_drained(Duration::from_millis(20)));
        queue.pop();
        assert!(queue.wait_until_drained(Duration::from_millis(20)));
    }
}
