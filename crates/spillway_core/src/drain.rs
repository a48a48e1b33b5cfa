//! The drain engine: moves queued notifications to a consumer under demand.
//!
//! One engine serves one subscription. Producers push through
//! [`DrainEngine::signal_value`], [`DrainEngine::signal_error`] and
//! [`DrainEngine::signal_completed`]; the consumer pulls with
//! [`DrainEngine::request`]. Every one of these triggers a drain pass.
//!
//! Passes are serialized by a coalescing work counter rather than a lock:
//! the caller that moves the counter off zero runs the loop (inline, or on
//! the executor in asynchronous mode); everyone else just bumps the counter
//! and leaves, and the running loop goes around again before letting go.
//!
//! Terminal signals are held in the engine rather than in the queue. The
//! loop delivers a recorded error as soon as it sees it when the error is
//! immediate, or once the queue is empty when errors are delayed; a
//! completion is delivered once the queue is empty. Teardown (cancelling
//! the producer and closing the queue) always runs before the terminal
//! callback.

use crate::error::{SpillError, SpillResult};
use crate::executor::Executor;
use crate::flow::{add_demand, check_request, consume_demand, Subscriber, Subscription};
use crate::notification::Notification;
use crate::queue::Queue;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where drain passes run.
#[derive(Clone, Default)]
pub enum DrainMode {
    /// On the thread that triggered the pass.
    #[default]
    Synchronous,
    /// On the given executor.
    Asynchronous(Arc<dyn Executor>),
}

impl DrainMode {
    /// Drains on `executor`.
    pub fn on(executor: Arc<dyn Executor>) -> Self {
        Self::Asynchronous(executor)
    }
}

impl fmt::Debug for DrainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synchronous => f.write_str("Synchronous"),
            Self::Asynchronous(_) => f.write_str("Asynchronous"),
        }
    }
}

struct Terminal {
    error: SpillError,
    immediate: bool,
}

/// Per-subscription drain state.
pub struct DrainEngine<T, Q: ?Sized> {
    queue: Arc<Q>,
    /// Released at teardown; the child usually holds our subscription.
    child: Mutex<Option<Arc<dyn Subscriber<T>>>>,
    mode: DrainMode,
    delay_error: bool,
    /// Outstanding demand; `u64::MAX` means unbounded.
    requested: AtomicU64,
    work: AtomicUsize,
    finished: AtomicBool,
    terminal: Mutex<Option<Terminal>>,
    cancelled: AtomicBool,
    done: AtomicBool,
    disposed: AtomicBool,
    upstream: Mutex<Option<Arc<dyn Subscription>>>,
}

impl<T, Q> DrainEngine<T, Q>
where
    T: Send + 'static,
    Q: Queue<T> + ?Sized + 'static,
{
    /// Creates an engine draining `queue` into `child`.
    pub fn new(
        queue: Arc<Q>,
        child: Arc<dyn Subscriber<T>>,
        mode: DrainMode,
        delay_error: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            child: Mutex::new(Some(child)),
            mode,
            delay_error,
            requested: AtomicU64::new(0),
            work: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            terminal: Mutex::new(None),
            cancelled: AtomicBool::new(false),
            done: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            upstream: Mutex::new(None),
        })
    }

    /// Attaches the producer's subscription so teardown can cancel it.
    ///
    /// If the engine is already torn down, `upstream` is cancelled at once.
    pub fn set_upstream(&self, upstream: Arc<dyn Subscription>) {
        if self.disposed.load(Ordering::Acquire) {
            upstream.cancel();
            return;
        }
        *self.upstream.lock() = Some(upstream);
        if self.disposed.load(Ordering::Acquire) {
            self.cancel_upstream();
        }
    }

    /// Queues one value and triggers a pass.
    ///
    /// A rejected or failed offer terminates the stream with an immediate
    /// error; the value is never silently dropped. Values arriving after a
    /// terminal signal are ignored.
    pub fn signal_value(self: &Arc<Self>, item: T) {
        if self.finished.load(Ordering::Acquire) || self.cancelled.load(Ordering::Acquire) {
            return;
        }
        match self.queue.offer(Notification::Value(item)) {
            Ok(true) => {}
            Ok(false) => self.fail(SpillError::BackpressureViolation),
            Err(error) => self.fail(error),
        }
        self.drain();
    }

    /// Records a producer error and triggers a pass. Ignored once finished.
    pub fn signal_error(self: &Arc<Self>, error: SpillError) {
        {
            let mut terminal = self.terminal.lock();
            if self.finished.load(Ordering::Acquire) {
                return;
            }
            debug!(
                kind = error.as_label(),
                delayed = self.delay_error,
                "producer failed"
            );
            *terminal = Some(Terminal {
                error,
                immediate: !self.delay_error,
            });
            self.finished.store(true, Ordering::Release);
        }
        self.cancel_upstream();
        self.drain();
    }

    /// Records producer completion and triggers a pass. Ignored once
    /// finished.
    pub fn signal_completed(self: &Arc<Self>) {
        {
            let _terminal = self.terminal.lock();
            if self.finished.load(Ordering::Acquire) {
                return;
            }
            self.finished.store(true, Ordering::Release);
        }
        self.drain();
    }

    /// Adds demand and triggers a pass.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Configuration`] if `n` is negative.
    pub fn request(self: &Arc<Self>, n: i64) -> SpillResult<()> {
        let n = check_request(n)?;
        if n == 0 {
            return Ok(());
        }
        add_demand(&self.requested, n);
        self.drain();
        Ok(())
    }

    /// Stops delivery and tears down. No terminal callback follows.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("consumer cancelled");
        self.dispose();
    }

    /// Cancels the producer, closes the queue and releases the consumer.
    /// Runs once.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel_upstream();
        self.queue.close();
        drop(self.child.lock().take());
        debug!("subscription torn down");
    }

    /// Returns `true` once the consumer cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns `true` once a terminal signal was delivered.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Returns `true` once the producer finished or a fault occurred.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Returns `true` once teardown ran.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Outstanding demand; `u64::MAX` means unbounded.
    #[must_use]
    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::Acquire)
    }

    /// The backing queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    fn cancel_upstream(&self) {
        let upstream = self.upstream.lock().take();
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }

    /// Records a queue fault as an immediate error, replacing a pending
    /// completion or delayed error.
    fn fail(&self, error: SpillError) {
        {
            let mut terminal = self.terminal.lock();
            if self.done.load(Ordering::Acquire) {
                return;
            }
            if terminal.as_ref().is_some_and(|t| t.immediate) {
                return;
            }
            warn!(
                kind = error.as_label(),
                error = %error,
                "buffer fault, terminating stream"
            );
            *terminal = Some(Terminal {
                error,
                immediate: true,
            });
            self.finished.store(true, Ordering::Release);
        }
        self.cancel_upstream();
    }

    fn drain(self: &Arc<Self>) {
        if self.work.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        match &self.mode {
            DrainMode::Synchronous => self.run(),
            DrainMode::Asynchronous(executor) => {
                let engine = Arc::clone(self);
                if let Err(error) = executor.execute(Box::new(move || engine.run())) {
                    // The pass is ours but nobody will run it: fail here.
                    self.fail(error);
                    self.run();
                }
            }
        }
    }

    fn run(&self) {
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

    /// One pass of the loop. Returns `true` when the subscription is over
    /// (terminal delivered or cancelled); the work counter is then left
    /// non-zero so that no later pass starts.
    fn pass(&self) -> bool {
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                return true;
            }

            if self.finished.load(Ordering::Acquire) {
                let mut terminal = self.terminal.lock();
                let ready = match terminal.as_ref() {
                    Some(t) => t.immediate || self.queue.is_empty(),
                    None => self.queue.is_empty(),
                };
                if ready {
                    let error = terminal.take().map(|t| t.error);
                    drop(terminal);
                    match error {
                        Some(error) => self.deliver_error(error),
                        None => self.deliver_complete(),
                    }
                    return true;
                }
            }

            if self.requested.load(Ordering::Acquire) == 0 {
                return false;
            }

            match self.queue.poll() {
                Ok(Some(Notification::Value(item))) => {
                    if self.cancelled.load(Ordering::Acquire) {
                        return true;
                    }
                    let child = self.child.lock().clone();
                    if let Some(child) = child {
                        child.on_next(item);
                    }
                    consume_demand(&self.requested);
                }
                Ok(Some(Notification::Error(error))) => {
                    self.deliver_error(error);
                    return true;
                }
                Ok(Some(Notification::Complete)) => {
                    self.deliver_complete();
                    return true;
                }
                Ok(None) => return false,
                Err(error) => self.fail(error),
            }
        }
    }

    fn deliver_error(&self, error: SpillError) {
        self.done.store(true, Ordering::Release);
        let child = self.child.lock().take();
        self.dispose();
        debug!(kind = error.as_label(), "delivering error");
        if let Some(child) = child {
            child.on_error(error);
        }
    }

    fn deliver_complete(&self) {
        self.done.store(true, Ordering::Release);
        let child = self.child.lock().take();
        self.dispose();
        debug!("delivering completion");
        if let Some(child) = child {
            child.on_complete();
        }
    }
}

impl<T, Q: ?Sized> fmt::Debug for DrainEngine<T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrainEngine")
            .field("mode", &self.mode)
            .field("delay_error", &self.delay_error)
            .field("requested", &self.requested.load(Ordering::Relaxed))
            .field("finished", &self.finished.load(Ordering::Relaxed))
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .field("done", &self.done.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
