//! The buffering stage.
//!
//! Sits between a fast producer and a slow consumer. The producer is
//! subscribed with unbounded demand and everything it emits goes into a
//! queue; the consumer pulls from that queue at its own pace through a
//! [`DrainEngine`].

use crate::config::Options;
use crate::drain::{DrainEngine, DrainMode};
use crate::error::{SpillError, SpillResult};
use crate::flow::{Publisher, Subscriber, Subscription, UNBOUNDED};
use crate::queue::{MemoryQueue, Queue};
use crate::spill::SpillQueue;
use spillway_codec::Serializer;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type Engine<T> = DrainEngine<T, dyn Queue<T>>;

enum Storage<T> {
    File {
        serializer: Arc<dyn Serializer<T>>,
        options: Options,
    },
    Memory {
        capacity: Option<usize>,
        delay_error: bool,
    },
}

/// A publisher that buffers another publisher.
///
/// Every subscription gets its own queue, engine and (for file storage) its
/// own segment files.
pub struct Buffered<T, P> {
    source: P,
    storage: Storage<T>,
    mode: DrainMode,
}

/// Buffers `source` through segment files.
///
/// ```no_run
/// use spillway_codec::serializers;
/// use spillway_core::{buffer_to_file, DrainMode, Options};
/// use spillway_core::flow::IterPublisher;
///
/// let buffered = buffer_to_file(
///     IterPublisher::range(1, 1_000),
///     serializers::integer(),
///     DrainMode::Synchronous,
///     Options::new().rollover_every(100),
/// )
/// .unwrap();
/// # drop(buffered);
/// ```
///
/// # Errors
///
/// Returns [`SpillError::Configuration`] if `options` fail validation.
pub fn buffer_to_file<T, P, S>(
    source: P,
    serializer: S,
    mode: DrainMode,
    options: Options,
) -> SpillResult<Buffered<T, P>>
where
    P: Publisher<T>,
    S: Serializer<T> + 'static,
{
    options.validate()?;
    Ok(Buffered {
        source,
        storage: Storage::File {
            serializer: Arc::new(serializer),
            options,
        },
        mode,
    })
}

/// Buffers `source` in memory, optionally bounded.
///
/// An offer beyond `capacity` terminates the stream with
/// [`SpillError::BackpressureViolation`].
///
/// # Errors
///
/// Returns [`SpillError::Configuration`] if `capacity` is `Some(0)`.
pub fn buffer_in_memory<T, P>(
    source: P,
    capacity: Option<usize>,
    mode: DrainMode,
    delay_error: bool,
) -> SpillResult<Buffered<T, P>>
where
    P: Publisher<T>,
{
    if capacity == Some(0) {
        return Err(SpillError::configuration(
            "buffer capacity must be greater than zero",
        ));
    }
    Ok(Buffered {
        source,
        storage: Storage::Memory {
            capacity,
            delay_error,
        },
        mode,
    })
}

impl<T, P> Buffered<T, P>
where
    T: Send + 'static,
{
    fn create_queue(&self) -> (Arc<dyn Queue<T>>, bool) {
        match &self.storage {
            Storage::File {
                serializer,
                options,
            } => (
                Arc::new(SpillQueue::new(Arc::clone(serializer), options)),
                options.delay_error,
            ),
            Storage::Memory {
                capacity,
                delay_error,
            } => (Arc::new(MemoryQueue::with_capacity(*capacity)), *delay_error),
        }
    }
}

impl<T, P> Publisher<T> for Buffered<T, P>
where
    T: Send + 'static,
    P: Publisher<T>,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let (queue, delay_error) = self.create_queue();
        let engine: Arc<Engine<T>> =
            DrainEngine::new(queue, Arc::clone(&subscriber), self.mode.clone(), delay_error);
        debug!(
            storage = self.storage.label(),
            mode = ?self.mode,
            delay_error,
            "buffered subscription started"
        );

        subscriber.on_subscribe(Arc::new(BufferSubscription {
            engine: Arc::clone(&engine),
        }));
        if engine.is_cancelled() {
            return;
        }
        self.source.subscribe(Arc::new(UpstreamSubscriber { engine }));
    }
}

impl<T> Storage<T> {
    fn label(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Memory { .. } => "memory",
        }
    }
}

impl<T, P: fmt::Debug> fmt::Debug for Buffered<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffered")
            .field("source", &self.source)
            .field("storage", &self.storage.label())
            .field("mode", &self.mode)
            .finish()
    }
}

/// The consumer's handle.
struct BufferSubscription<T: Send + 'static> {
    engine: Arc<Engine<T>>,
}

impl<T: Send + 'static> Subscription for BufferSubscription<T> {
    fn request(&self, n: i64) -> SpillResult<()> {
        self.engine.request(n)
    }

    fn cancel(&self) {
        self.engine.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.engine.is_cancelled()
    }
}

/// Forwards producer signals into the engine.
struct UpstreamSubscriber<T: Send + 'static> {
    engine: Arc<Engine<T>>,
}

impl<T: Send + 'static> Subscriber<T> for UpstreamSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.engine.set_upstream(Arc::clone(&subscription));
        if self.engine.is_disposed() {
            return;
        }
        if let Err(error) = subscription.request(UNBOUNDED) {
            self.engine.signal_error(error);
        }
    }

    fn on_next(&self, item: T) {
        self.engine.signal_value(item);
    }

    fn on_error(&self, error: SpillError) {
        self.engine.signal_error(error);
    }

    fn on_complete(&self) {
        self.engine.signal_completed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::IterPublisher;
    use parking_lot::Mutex;
    use spillway_codec::serializers;
    use spillway_storage::{FileFactory, MemoryFactory};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[derive(Default)]
    struct Collector {
        subscription: Mutex<Option<Arc<dyn Subscription>>>,
        items: Mutex<Vec<i32>>,
        errors: Mutex<Vec<SpillError>>,
        completions: AtomicUsize,
        cancel_on_subscribe: bool,
    }

    impl Collector {
        fn request(&self, n: i64) {
            let subscription = self.subscription.lock().clone();
            subscription.unwrap().request(n).unwrap();
        }
    }

    impl Subscriber<i32> for Collector {
        fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
            if self.cancel_on_subscribe {
                subscription.cancel();
            }
            *self.subscription.lock() = Some(subscription);
        }

        fn on_next(&self, item: i32) {
            self.items.lock().push(item);
        }

        fn on_error(&self, error: SpillError) {
            self.errors.lock().push(error);
        }

        fn on_complete(&self) {
            self.completions.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn file_buffer_delivers_everything_in_order() {
        let dir = tempdir().unwrap();
        let buffered = buffer_to_file(
            IterPublisher::range(1, 100),
            serializers::integer(),
            DrainMode::Synchronous,
            Options::new()
                .rollover_every(10)
                .file_factory(FileFactory::in_dir(dir.path())),
        )
        .unwrap();

        let collector = Arc::new(Collector::default());
        buffered.subscribe(collector.clone());
        // Everything is on disk before the first request.
        assert!(std::fs::read_dir(dir.path()).unwrap().count() > 0);

        collector.request(UNBOUNDED);
        assert_eq!(*collector.items.lock(), (1..=100).collect::<Vec<_>>());
        assert_eq!(collector.completions.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn memory_buffer_honours_demand() {
        let buffered =
            buffer_in_memory(IterPublisher::range(0, 3), None, DrainMode::Synchronous, true)
                .unwrap();
        let collector = Arc::new(Collector::default());
        buffered.subscribe(collector.clone());

        collector.request(2);
        assert_eq!(*collector.items.lock(), vec![0, 1]);
        assert_eq!(collector.completions.load(Ordering::SeqCst), 0);
        collector.request(1);
        assert_eq!(collector.completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bounded_memory_buffer_overflows() {
        let buffered = buffer_in_memory(
            IterPublisher::range(0, 10),
            Some(4),
            DrainMode::Synchronous,
            true,
        )
        .unwrap();
        let collector = Arc::new(Collector::default());
        buffered.subscribe(collector.clone());

        assert_eq!(
            *collector.errors.lock(),
            vec![SpillError::BackpressureViolation]
        );
        assert!(collector.items.lock().is_empty());
    }

    #[test]
    fn invalid_configuration_is_rejected_up_front() {
        let err = buffer_to_file(
            IterPublisher::range(0, 1),
            serializers::integer(),
            DrainMode::Synchronous,
            Options::new().rollover_every(0),
        )
        .unwrap_err();
        assert!(matches!(err, SpillError::Configuration { .. }));

        let err =
            buffer_in_memory(IterPublisher::range(0, 1), Some(0), DrainMode::Synchronous, true)
                .unwrap_err();
        assert!(matches!(err, SpillError::Configuration { .. }));
    }

    #[test]
    fn cancel_in_on_subscribe_skips_the_source() {
        let subscribed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&subscribed);
        let source = IterPublisher::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::iter::once(Ok(1))
        });
        let buffered = buffer_to_file(
            source,
            serializers::integer(),
            DrainMode::Synchronous,
            Options::new().file_factory(MemoryFactory),
        )
        .unwrap();

        let collector = Arc::new(Collector {
            cancel_on_subscribe: true,
            ..Collector::default()
        });
        buffered.subscribe(collector.clone());

        assert_eq!(subscribed.load(Ordering::SeqCst), 0);
        assert!(collector.items.lock().is_empty());
        assert_eq!(collector.completions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn finished_subscription_lets_go_of_the_consumer() {
        let buffered =
            buffer_in_memory(IterPublisher::range(0, 5), None, DrainMode::Synchronous, true)
                .unwrap();
        let collector = Arc::new(Collector::default());
        buffered.subscribe(collector.clone());
        collector.request(UNBOUNDED);
        assert_eq!(collector.completions.load(Ordering::SeqCst), 1);

        let weak = Arc::downgrade(&collector);
        drop(collector);
        drop(buffered);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn cancelled_subscription_lets_go_of_the_consumer() {
        let dir = tempdir().unwrap();
        let buffered = buffer_to_file(
            IterPublisher::range(0, 50),
            serializers::integer(),
            DrainMode::Synchronous,
            Options::new()
                .rollover_every(10)
                .file_factory(FileFactory::in_dir(dir.path())),
        )
        .unwrap();
        let collector = Arc::new(Collector::default());
        buffered.subscribe(collector.clone());
        collector.request(3);

        let subscription = collector.subscription.lock().clone().unwrap();
        subscription.cancel();
        drop(subscription);

        let weak = Arc::downgrade(&collector);
        drop(collector);
        assert!(weak.upgrade().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn each_subscription_is_independent() {
        let buffered = buffer_to_file(
            IterPublisher::range(0, 5),
            serializers::integer(),
            DrainMode::Synchronous,
            Options::new().file_factory(MemoryFactory),
        )
        .unwrap();

        let first = Arc::new(Collector::default());
        let second = Arc::new(Collector::default());
        buffered.subscribe(first.clone());
        buffered.subscribe(second.clone());
        first.request(UNBOUNDED);
        second.request(2);

        assert_eq!(*first.items.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(*second.items.lock(), vec![0, 1]);
    }
}
