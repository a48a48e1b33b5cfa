//! Iterator-backed publisher.

use super::{add_demand, check_request, consume_demand, Publisher, Subscriber, Subscription};
use crate::error::{SpillError, SpillResult};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

type BoxedIter<T> = Box<dyn Iterator<Item = SpillResult<T>> + Send>;
type IterFactory<T> = dyn Fn() -> BoxedIter<T> + Send + Sync;

/// A publisher that replays an iterator to every subscriber.
///
/// Each subscription builds a fresh iterator and pulls from it only as far
/// as demand allows. An `Err` item ends the stream with `on_error`; the end
/// of the iterator ends it with `on_complete`. Items are emitted on whichever
/// thread raised demand.
///
/// ```
/// use spillway_core::flow::IterPublisher;
///
/// // 1, 2, 3 to every subscriber
/// let numbers = IterPublisher::range(1, 3);
/// # drop(numbers);
/// ```
pub struct IterPublisher<T> {
    make: Arc<IterFactory<T>>,
}

impl<T: Send + 'static> IterPublisher<T> {
    /// Creates a publisher from an iterator factory.
    pub fn new<F, I>(make: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = SpillResult<T>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            make: Arc::new(move || Box::new(make().into_iter()) as BoxedIter<T>),
        }
    }

    /// Emits `values`, then completes.
    pub fn from_values(values: Vec<T>) -> Self
    where
        T: Clone + Sync,
    {
        Self::new(move || values.clone().into_iter().map(Ok))
    }

    /// Emits each `Ok` value; the first `Err` ends the stream.
    pub fn from_results(items: Vec<SpillResult<T>>) -> Self
    where
        T: Clone + Sync,
    {
        Self::new(move || items.clone())
    }

    /// Completes without emitting.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(std::iter::empty)
    }

    /// Fails immediately with `error`.
    #[must_use]
    pub fn failed(error: SpillError) -> Self {
        Self::new(move || std::iter::once(Err(error.clone())))
    }
}

impl IterPublisher<i32> {
    /// Emits `count` consecutive integers starting at `start`.
    #[must_use]
    pub fn range(start: i32, count: usize) -> Self {
        Self::new(move || (start..).take(count).map(Ok))
    }
}

impl<T> Clone for IterPublisher<T> {
    fn clone(&self) -> Self {
        Self {
            make: Arc::clone(&self.make),
        }
    }
}

impl<T> fmt::Debug for IterPublisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterPublisher").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Publisher<T> for IterPublisher<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let subscription = Arc::new(IterSubscription {
            iter: Mutex::new(Some((self.make)())),
            subscriber: Arc::clone(&subscriber),
            requested: AtomicU64::new(0),
            work: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        });
        subscriber.on_subscribe(subscription);
    }
}

struct IterSubscription<T> {
    iter: Mutex<Option<BoxedIter<T>>>,
    subscriber: Arc<dyn Subscriber<T>>,
    requested: AtomicU64,
    work: AtomicUsize,
    cancelled: AtomicBool,
}

impl<T> IterSubscription<T> {
    fn emit(&self) {
        if self.work.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        loop {
            self.work.swap(1, Ordering::AcqRel);
            if self.pass() {
                return;
            }
            if self.work.fetch_sub(1, Ordering::AcqRel) == 1 {
                return;
            }
        }
    }

    /// Emits while there is demand. Returns `true` once the stream is over.
    fn pass(&self) -> bool {
        let mut iter = self.iter.lock();
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                *iter = None;
                return true;
            }
            if self.requested.load(Ordering::Acquire) == 0 {
                return false;
            }
            let Some(source) = iter.as_mut() else {
                return true;
            };
            match source.next() {
                Some(Ok(item)) => {
                    consume_demand(&self.requested);
                    self.subscriber.on_next(item);
                }
                Some(Err(error)) => {
                    *iter = None;
                    self.subscriber.on_error(error);
                    return true;
                }
                None => {
                    *iter = None;
                    self.subscriber.on_complete();
                    return true;
                }
            }
        }
    }
}

impl<T: Send> Subscription for IterSubscription<T> {
    fn request(&self, n: i64) -> SpillResult<()> {
        let n = check_request(n)?;
        if n == 0 {
            return Ok(());
        }
        add_demand(&self.requested, n);
        self.emit();
        Ok(())
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
