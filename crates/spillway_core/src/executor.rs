//! Execution contexts for asynchronous drain passes.

use crate::error::{SpillError, SpillResult};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, error, warn};

/// A unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks somewhere other than the calling thread.
pub trait Executor: Send + Sync {
    /// Schedules `task`.
    ///
    /// Tasks submitted to one executor must run one at a time, in
    /// submission order.
    ///
    /// # Errors
    ///
    /// Returns an I/O fault if the task was not accepted; it is then
    /// dropped without running.
    fn execute(&self, task: Task) -> SpillResult<()>;
}

/// An executor backed by one dedicated thread.
///
/// Tasks run in submission order. A panicking task is logged and does not
/// take the thread down.
pub struct SingleThreadExecutor {
    name: String,
    sender: Mutex<Option<Sender<Task>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl SingleThreadExecutor {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an I/O fault if the thread cannot be spawned.
    pub fn new(name: impl Into<String>) -> SpillResult<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Task>();
        let thread_name = name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            for task in receiver {
                if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    error!(executor = %thread_name, "task panicked");
                }
            }
            debug!(executor = %thread_name, "executor stopped");
        })?;

        Ok(Self {
            name,
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Starts a worker and wraps it for sharing.
    ///
    /// # Errors
    ///
    /// Returns an I/O fault if the thread cannot be spawned.
    pub fn shared(name: impl Into<String>) -> SpillResult<Arc<Self>> {
        Self::new(name).map(Arc::new)
    }

    /// Returns the worker thread's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` when called from the worker thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Waits until every task submitted before this call has run.
    ///
    /// Returns `false` on timeout or if the executor has shut down.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        if self.is_current() {
            return false;
        }
        let latch = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Arc::clone(&latch);
        let sent = match self.sender.lock().as_ref() {
            Some(sender) => sender
                .send(Box::new(move || {
                    *signal.0.lock() = true;
                    signal.1.notify_all();
                }))
                .is_ok(),
            None => false,
        };
        if !sent {
            return false;
        }

        let (done, cond) = &*latch;
        let mut done = done.lock();
        if !*done {
            cond.wait_for(&mut done, timeout);
        }
        *done
    }

    /// Stops accepting tasks, runs the ones already queued and joins the
    /// worker. Idempotent.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if self.is_current() {
                // Joining ourselves would deadlock; the thread exits once the
                // current task returns.
                return;
            }
            if handle.join().is_err() {
                warn!(executor = %self.name, "executor thread panicked");
            }
        }
    }
}

impl Executor for SingleThreadExecutor {
    fn execute(&self, task: Task) -> SpillResult<()> {
        let sent = match self.sender.lock().as_ref() {
            Some(sender) => sender.send(task).is_ok(),
            None => false,
        };
        if !sent {
            warn!(executor = %self.name, "task submitted after shutdown rejected");
            return Err(SpillError::io(format!(
                "executor {} is shut down",
                self.name
            )));
        }
        Ok(())
    }
}

impl Drop for SingleThreadExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for SingleThreadExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleThreadExecutor")
            .field("name", &self.name)
            .field("running", &self.sender.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_tasks_in_order_on_one_thread() {
        let executor = SingleThreadExecutor::new("test-exec").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..100 {
            let seen = Arc::clone(&seen);
            executor
                .execute(Box::new(move || {
                    let name = thread::current().name().map(str::to_owned);
                    seen.lock().push((i, name));
                }))
                .unwrap();
        }
        assert!(executor.wait_idle(Duration::from_secs(5)));

        let seen = seen.lock();
        assert_eq!(seen.len(), 100);
        assert!(seen.iter().enumerate().all(|(i, (v, _))| i == *v));
        assert!(seen
            .iter()
            .all(|(_, name)| name.as_deref() == Some("test-exec")));
    }

    #[test]
    fn survives_a_panicking_task() {
        let executor = SingleThreadExecutor::new("panicky").unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        executor.execute(Box::new(|| panic!("boom"))).unwrap();
        let counter = Arc::clone(&ran);
        executor
            .execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        assert!(executor.wait_idle(Duration::from_secs(5)));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_drains_queued_tasks_and_rejects_new_ones() {
        let executor = SingleThreadExecutor::new("stopper").unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = Arc::clone(&ran);
            executor
                .execute(Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }
        executor.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 10);

        let counter = Arc::clone(&ran);
        let err = executor
            .execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap_err();
        assert!(matches!(err, SpillError::Io { .. }));
        assert_eq!(ran.load(Ordering::SeqCst), 10);
        assert!(!executor.wait_idle(Duration::from_millis(10)));
        executor.shutdown();
    }

    #[test]
    fn is_current_inside_task() {
        let executor = SingleThreadExecutor::shared("current").unwrap();
        assert!(!executor.is_current());
        let inside = Arc::new(AtomicUsize::new(0));
        let (exec, flag) = (Arc::clone(&executor), Arc::clone(&inside));
        executor
            .execute(Box::new(move || {
                if exec.is_current() {
                    flag.store(1, Ordering::SeqCst);
                }
            }))
            .unwrap();
        assert!(executor.wait_idle(Duration::from_secs(5)));
        assert_eq!(inside.load(Ordering::SeqCst), 1);
    }
}
