//! Producers for scenario tests.

use parking_lot::Mutex;
use spillway_core::flow::{IterPublisher, Publisher, Subscriber};
use spillway_core::SpillError;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Subscribes to the wrapped publisher on a fresh thread.
///
/// With an [`IterPublisher`] underneath, the whole stream is emitted from
/// that thread, which makes it a producer racing the consumer.
pub struct Threaded<P> {
    source: P,
    name: String,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Runs `source` on its own thread per subscription.
pub fn threaded<P>(source: P, name: impl Into<String>) -> Threaded<P> {
    Threaded {
        source,
        name: name.into(),
        handles: Mutex::new(Vec::new()),
    }
}

impl<P> Threaded<P> {
    /// Waits for every producer thread started so far.
    ///
    /// # Panics
    ///
    /// Panics if a producer thread panicked.
    pub fn join(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            handle.join().expect("producer thread panicked");
        }
    }
}

impl<T, P> Publisher<T> for Threaded<P>
where
    T: Send + 'static,
    P: Publisher<T> + Clone + Send + 'static,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let source = self.source.clone();
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || source.subscribe(subscriber))
            .expect("Failed to spawn producer thread");
        self.handles.lock().push(handle);
    }
}

/// Integers `0..count`, pausing `pause` before each one.
pub fn paced(count: i32, pause: Duration) -> IterPublisher<i32> {
    IterPublisher::new(move || {
        (0..count).map(move |i| {
            thread::sleep(pause);
            Ok(i)
        })
    })
}

/// `values`, then `error`.
pub fn failing_after<T>(values: Vec<T>, error: SpillError) -> IterPublisher<T>
where
    T: Clone + Send + Sync + 'static,
{
    let mut items: Vec<_> = values.into_iter().map(Ok).collect();
    items.push(Err(error));
    IterPublisher::from_results(items)
}

/// `count` strings of `size` characters each; string `i` repeats one
/// letter chosen by `i`.
pub fn large_strings(count: usize, size: usize) -> IterPublisher<String> {
    IterPublisher::new(move || (0..count).map(move |i| Ok(large_string(i, size))))
}

/// The `i`-th string produced by [`large_strings`].
pub fn large_string(i: usize, size: usize) -> String {
    let letter = char::from(b'a' + (i % 26) as u8);
    std::iter::repeat(letter).take(size).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestSubscriber;

    #[test]
    fn threaded_source_emits_off_thread() {
        let source = threaded(IterPublisher::range(0, 10), "producer");
        let subscriber = TestSubscriber::new().shared();
        source.subscribe(subscriber.clone());
        source.join();

        subscriber.assert_values(&(0..10).collect::<Vec<_>>());
        subscriber.assert_completed();
        assert!(subscriber
            .delivery_threads()
            .iter()
            .all(|name| name.as_deref() == Some("producer")));
    }

    #[test]
    fn failing_after_ends_with_error() {
        let subscriber = TestSubscriber::new().shared();
        failing_after(vec![1, 2], SpillError::producer("boo")).subscribe(subscriber.clone());
        subscriber.assert_values(&[1, 2]);
        subscriber.assert_error(&SpillError::producer("boo"));
    }

    #[test]
    fn large_strings_have_requested_size() {
        let subscriber = TestSubscriber::new().shared();
        large_strings(3, 1_000).subscribe(subscriber.clone());
        let values = subscriber.values();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|s| s.len() == 1_000));
        assert_eq!(values[1], large_string(1, 1_000));
    }
}
