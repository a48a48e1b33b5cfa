//! Pull-based stream protocol.
//!
//! A [`Publisher`] hands each [`Subscriber`] a [`Subscription`] through
//! which the subscriber asks for items. A publisher never emits more
//! `on_next` calls than were requested, and emits at most one terminal
//! signal (`on_error` or `on_complete`), after which nothing else arrives.
//! Signals to one subscriber never overlap.

mod source;

pub use source::IterPublisher;

use crate::error::{SpillError, SpillResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Demand that never runs out.
pub const UNBOUNDED: i64 = i64::MAX;

/// A subscriber's handle on a running stream.
pub trait Subscription: Send + Sync {
    /// Adds `n` to the outstanding demand. [`UNBOUNDED`] lifts the cap.
    /// `n == 0` does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Configuration`] if `n` is negative.
    fn request(&self, n: i64) -> SpillResult<()>;

    /// Stops the stream. No signal is delivered afterwards. Idempotent.
    fn cancel(&self);

    /// Returns `true` once [`Subscription::cancel`] has been called.
    fn is_cancelled(&self) -> bool;
}

/// Receives the signals of one stream.
pub trait Subscriber<T>: Send + Sync {
    /// Called once, before any other signal.
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);

    /// Delivers one item.
    fn on_next(&self, item: T);

    /// Terminal: the stream failed.
    fn on_error(&self, error: SpillError);

    /// Terminal: the stream finished.
    fn on_complete(&self);
}

/// A source of streams.
pub trait Publisher<T> {
    /// Starts a new stream to `subscriber`.
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}

/// Validates a request count.
pub(crate) fn check_request(n: i64) -> SpillResult<u64> {
    u64::try_from(n).map_err(|_| {
        SpillError::configuration(format!("request count must be non-negative, got {n}"))
    })
}

/// Adds `n` to a demand counter, saturating at `u64::MAX` (unbounded).
pub(crate) fn add_demand(requested: &AtomicU64, n: u64) {
    if n == UNBOUNDED as u64 {
        requested.store(u64::MAX, Ordering::Release);
        return;
    }
    let _ = requested.fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| {
        (r != u64::MAX).then(|| r.saturating_add(n))
    });
}

/// Takes one unit of demand, unless unbounded.
pub(crate) fn consume_demand(requested: &AtomicU64) {
    let _ = requested.fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| {
        (r != u64::MAX && r > 0).then(|| r - 1)
    });
}
