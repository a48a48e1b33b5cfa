//! In-memory queue.

use super::Queue;
use crate::error::SpillResult;
use crate::notification::Notification;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// A mutex-guarded FIFO, optionally bounded.
///
/// A bounded queue rejects offers once `capacity` notifications are waiting;
/// the drain engine turns that rejection into a
/// [`SpillError::BackpressureViolation`](crate::SpillError::BackpressureViolation).
#[derive(Debug)]
pub struct MemoryQueue<T> {
    items: Mutex<VecDeque<Notification<T>>>,
    capacity: Option<usize>,
    closed: AtomicBool,
}

impl<T> MemoryQueue<T> {
    /// Creates a queue that never rejects offers.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Creates a queue that holds at most `capacity` notifications.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    /// Creates a queue with an optional bound.
    #[must_use]
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the configured bound.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl<T> Default for MemoryQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T: Send> Queue<T> for MemoryQueue<T> {
    fn offer(&self, notification: Notification<T>) -> SpillResult<bool> {
        let mut items = self.items.lock();
        if self.closed.load(Ordering::Acquire) {
            trace!("offer after close discarded");
            return Ok(true);
        }
        if let Some(capacity) = self.capacity {
            if items.len() >= capacity {
                return Ok(false);
            }
        }
        items.push_back(notification);
        Ok(true)
    }

    fn poll(&self) -> SpillResult<Option<Notification<T>>> {
        Ok(self.items.lock().pop_front())
    }

    fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }

    fn close(&self) {
        let mut items = self.items.lock();
        self.closed.store(true, Ordering::Release);
        items.clear();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
