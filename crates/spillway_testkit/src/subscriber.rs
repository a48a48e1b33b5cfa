//! A subscriber that records everything it receives.

use parking_lot::{Condvar, Mutex};
use spillway_core::flow::{Subscriber, Subscription, UNBOUNDED};
use spillway_core::{SpillError, SpillErrorKind, SpillResult};
use std::fmt::Debug;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Called after each recorded value with the value, the number of values
/// received so far and the subscription.
pub type NextHook<T> = Box<dyn Fn(&T, usize, &Arc<dyn Subscription>) + Send + Sync>;

struct Recorded<T> {
    values: Vec<T>,
    errors: Vec<SpillError>,
    completions: usize,
    threads: Vec<Option<String>>,
}

/// Records values, errors and completions for assertions.
///
/// ```rust
/// use spillway_core::flow::{IterPublisher, Publisher};
/// use spillway_testkit::TestSubscriber;
///
/// let subscriber = TestSubscriber::new().shared();
/// IterPublisher::range(1, 3).subscribe(subscriber.clone());
/// subscriber.assert_values(&[1, 2, 3]);
/// subscriber.assert_completed();
/// ```
pub struct TestSubscriber<T> {
    initial_request: i64,
    on_next: Option<NextHook<T>>,
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
    recorded: Mutex<Recorded<T>>,
    changed: Condvar,
}

impl<T> Default for TestSubscriber<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TestSubscriber<T> {
    /// Creates a subscriber that requests everything on subscribe.
    #[must_use]
    pub fn new() -> Self {
        Self::with_initial_request(UNBOUNDED)
    }

    /// Creates a subscriber that requests `n` on subscribe (`0` for none).
    #[must_use]
    pub fn with_initial_request(n: i64) -> Self {
        Self {
            initial_request: n,
            on_next: None,
            subscription: Mutex::new(None),
            recorded: Mutex::new(Recorded {
                values: Vec::new(),
                errors: Vec::new(),
                completions: 0,
                threads: Vec::new(),
            }),
            changed: Condvar::new(),
        }
    }

    /// Installs a hook run after every value.
    #[must_use]
    pub fn with_on_next(
        mut self,
        hook: impl Fn(&T, usize, &Arc<dyn Subscription>) + Send + Sync + 'static,
    ) -> Self {
        self.on_next = Some(Box::new(hook));
        self
    }

    /// Wraps the subscriber for subscribing.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns the subscription handed over in `on_subscribe`.
    ///
    /// # Panics
    ///
    /// Panics if the subscriber has not been subscribed.
    pub fn subscription(&self) -> Arc<dyn Subscription> {
        self.subscription
            .lock()
            .clone()
            .expect("subscriber has not been subscribed")
    }

    /// Requests `n` more values.
    ///
    /// # Errors
    ///
    /// Returns the subscription's error for a negative `n`.
    pub fn request(&self, n: i64) -> SpillResult<()> {
        self.subscription().request(n)
    }

    /// Cancels the subscription.
    pub fn cancel(&self) {
        self.subscription().cancel();
    }

    /// Returns `true` if the subscription was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.subscription
            .lock()
            .as_ref()
            .is_some_and(|s| s.is_cancelled())
    }

    /// Number of values received.
    pub fn value_count(&self) -> usize {
        self.recorded.lock().values.len()
    }

    /// Errors received.
    pub fn errors(&self) -> Vec<SpillError> {
        self.recorded.lock().errors.clone()
    }

    /// Number of completions received.
    pub fn completions(&self) -> usize {
        self.recorded.lock().completions
    }

    /// Returns `true` once any terminal signal arrived.
    pub fn is_terminated(&self) -> bool {
        let recorded = self.recorded.lock();
        recorded.completions > 0 || !recorded.errors.is_empty()
    }

    /// Names of the threads `on_next` ran on, one entry per value.
    pub fn delivery_threads(&self) -> Vec<Option<String>> {
        self.recorded.lock().threads.clone()
    }

    /// Waits for a terminal signal. Returns `false` on timeout.
    pub fn await_terminal(&self, timeout: Duration) -> bool {
        self.await_until(timeout, |r| r.completions > 0 || !r.errors.is_empty())
    }

    /// Waits until at least `count` values arrived. Returns `false` on
    /// timeout.
    pub fn await_value_count(&self, count: usize, timeout: Duration) -> bool {
        self.await_until(timeout, |r| r.values.len() >= count)
    }

    fn await_until(&self, timeout: Duration, done: impl Fn(&Recorded<T>) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut recorded = self.recorded.lock();
        while !done(&recorded) {
            if self.changed.wait_until(&mut recorded, deadline).timed_out() {
                return done(&recorded);
            }
        }
        true
    }

    /// Asserts that exactly one completion and no error arrived.
    ///
    /// # Panics
    ///
    /// Panics if the assertion fails.
    pub fn assert_completed(&self) {
        let recorded = self.recorded.lock();
        assert_eq!(recorded.completions, 1, "expected exactly one completion");
        assert!(
            recorded.errors.is_empty(),
            "unexpected errors: {:?}",
            recorded.errors
        );
    }

    /// Asserts that no error arrived.
    ///
    /// # Panics
    ///
    /// Panics if an error arrived.
    pub fn assert_no_errors(&self) {
        let recorded = self.recorded.lock();
        assert!(
            recorded.errors.is_empty(),
            "unexpected errors: {:?}",
            recorded.errors
        );
    }

    /// Asserts that no terminal signal arrived.
    ///
    /// # Panics
    ///
    /// Panics if a completion or an error arrived.
    pub fn assert_not_terminated(&self) {
        let recorded = self.recorded.lock();
        assert_eq!(recorded.completions, 0, "unexpected completion");
        assert!(
            recorded.errors.is_empty(),
            "unexpected errors: {:?}",
            recorded.errors
        );
    }

    /// Asserts that exactly one error of `kind` arrived and no completion.
    ///
    /// # Panics
    ///
    /// Panics if the assertion fails.
    pub fn assert_error_kind(&self, kind: SpillErrorKind) {
        let recorded = self.recorded.lock();
        assert_eq!(recorded.completions, 0, "unexpected completion");
        assert_eq!(
            recorded.errors.len(),
            1,
            "expected exactly one error, got {:?}",
            recorded.errors
        );
        assert_eq!(recorded.errors[0].kind(), kind);
    }

    /// Asserts that exactly `expected` arrived and no completion.
    ///
    /// # Panics
    ///
    /// Panics if the assertion fails.
    pub fn assert_error(&self, expected: &SpillError) {
        let recorded = self.recorded.lock();
        assert_eq!(recorded.completions, 0, "unexpected completion");
        assert_eq!(recorded.errors.as_slice(), std::slice::from_ref(expected));
    }
}

impl<T: Clone> TestSubscriber<T> {
    /// Values received so far.
    pub fn values(&self) -> Vec<T> {
        self.recorded.lock().values.clone()
    }
}

impl<T: PartialEq + Debug> TestSubscriber<T> {
    /// Asserts the exact sequence of values received.
    ///
    /// # Panics
    ///
    /// Panics if the values differ.
    pub fn assert_values(&self, expected: &[T]) {
        assert_eq!(self.recorded.lock().values.as_slice(), expected);
    }
}

impl<T: Clone + Send> Subscriber<T> for TestSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        *self.subscription.lock() = Some(Arc::clone(&subscription));
        if self.initial_request != 0 {
            subscription
                .request(self.initial_request)
                .expect("initial request rejected");
        }
    }

    fn on_next(&self, item: T) {
        let count = {
            let mut recorded = self.recorded.lock();
            recorded
                .threads
                .push(thread::current().name().map(str::to_owned));
            recorded.values.push(item.clone());
            recorded.values.len()
        };
        self.changed.notify_all();

        // Runs unlocked: hooks may sleep, request or cancel.
        if let Some(hook) = &self.on_next {
            hook(&item, count, &self.subscription());
        }
    }

    fn on_error(&self, error: SpillError) {
        self.recorded.lock().errors.push(error);
        self.changed.notify_all();
    }

    fn on_complete(&self) {
        self.recorded.lock().completions += 1;
        self.changed.notify_all();
    }
}
