//! Queue abstraction shared by the in-memory and disk-spilling buffers.
//!
//! A queue is a FIFO of [`Notification`]s with exactly one producer side
//! (the thread forwarding upstream signals) and one consumer side (the drain
//! loop). Implementations must tolerate `offer` and `poll` running
//! concurrently on different threads.

mod memory;

pub use memory::MemoryQueue;

use crate::error::SpillResult;
use crate::notification::Notification;

/// A FIFO of notifications.
pub trait Queue<T>: Send + Sync {
    /// Appends a notification.
    ///
    /// Returns `Ok(false)` when a bounded queue is full; the notification is
    /// dropped and the caller decides how to react. Offers made after
    /// [`Queue::close`] are silently discarded and report `Ok(true)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be stored (for example
    /// a failed write or serialization).
    fn offer(&self, notification: Notification<T>) -> SpillResult<bool>;

    /// Removes and returns the oldest notification, or `None` if the queue is
    /// empty or closed.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored notification could not be read back.
    fn poll(&self) -> SpillResult<Option<Notification<T>>>;

    /// Returns `true` if no notification is waiting.
    fn is_empty(&self) -> bool;

    /// Returns the number of waiting notifications.
    fn len(&self) -> usize;

    /// Discards every waiting notification and releases backing resources.
    ///
    /// Idempotent. The queue stays usable as a sink: later offers are
    /// discarded and polls return `None`.
    fn close(&self);

    /// Returns `true` once [`Queue::close`] has run.
    fn is_closed(&self) -> bool;
}
