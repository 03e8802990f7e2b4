//! Serialized executor: one worker thread, one FIFO queue.
//!
//! Every engine-touching operation is funneled through a single
//! [`SerializedExecutor`]. Callers on any thread either enqueue work and
//! return immediately ([`submit`](SerializedExecutor::submit)) or block until
//! the worker ran it ([`submit_and_wait`](SerializedExecutor::submit_and_wait),
//! [`submit_and_return`](SerializedExecutor::submit_and_return)). Blocking
//! calls made from the worker thread itself run inline.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::{ExecutorError, ExecutorResult};

/// Name of the process-wide worker thread.
pub const GLOBAL_THREAD_NAME: &str = "ringd-executor";

static GLOBAL: OnceLock<Arc<SerializedExecutor>> = OnceLock::new();

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Messages sent to the worker thread via mpsc channel
enum Message {
    Run { task: String, job: Job },
    Shutdown,
}

/// Owns the worker thread and its queue.
pub struct SerializedExecutor {
    queue: mpsc::UnboundedSender<Message>,
    worker: ThreadId,
    closed: AtomicBool,
    name: String,
}

impl SerializedExecutor {
    /// Spawn a new executor with its own worker thread.
    pub fn spawn(name: &str) -> ExecutorResult<Arc<Self>> {
        let (queue, rx) = mpsc::unbounded_channel();
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || worker_loop(thread_name, rx))
            .map_err(|e| ExecutorError::Spawn(e.to_string()))?;

        info!("Executor thread '{}' started", name);
        Ok(Arc::new(Self {
            queue,
            worker: handle.thread().id(),
            closed: AtomicBool::new(false),
            name: name.to_string(),
        }))
    }

    /// The process-wide executor. Its thread is created on first use and
    /// lives for the rest of the process.
    pub fn global() -> ExecutorResult<Arc<Self>> {
        if let Some(executor) = GLOBAL.get() {
            return Ok(executor.clone());
        }

        let executor = Self::spawn(GLOBAL_THREAD_NAME)?;
        if let Err(lost) = GLOBAL.set(executor) {
            // Another thread won the race
            lost.shutdown();
        }
        GLOBAL
            .get()
            .cloned()
            .ok_or_else(|| ExecutorError::Spawn("global executor was not installed".into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the calling thread is this executor's worker thread.
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker
    }

    /// Stop accepting work. Items already queued still run, then the worker exits.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.queue.send(Message::Shutdown);
        info!("Executor '{}' shutting down", self.name);
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Enqueue `work` and return immediately.
    ///
    /// Errors returned by `work` and panics inside it are logged on the worker
    /// thread. A rejected enqueue (executor shut down) is logged, not returned.
    pub fn submit<F>(&self, task: &str, work: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let label = task.to_string();
        self.enqueue(
            task,
            Box::new(move || {
                if let Err(e) = work() {
                    error!(task = %label, "Task failed: {e:#}");
                }
            }),
        );
    }

    /// Run `work` on the worker thread and block until it finished.
    ///
    /// From the worker thread itself, `work` runs inline. A zero `timeout`
    /// waits without bound. Returns `false` if the wait timed out or the
    /// executor rejected the task; errors and panics inside `work` are logged
    /// and still count as completed.
    pub fn submit_and_wait<F>(&self, task: &str, work: F, timeout: Duration) -> bool
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        match self.run_blocking(task, work, timeout) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(task = %task, "Task failed: {e:#}");
                true
            }
            Err(ExecutorError::Panicked { .. }) => true,
            Err(e) => {
                debug!("submit_and_wait did not complete: {e}");
                false
            }
        }
    }

    /// Run `work` on the worker thread and return the value it produced.
    ///
    /// Same inline/blocking rules as [`submit_and_wait`](Self::submit_and_wait),
    /// waiting without bound. `Err(ExecutorError::Rejected)` means the executor
    /// is unusable and must be treated as an internal error by the caller.
    pub fn submit_and_return<T, F>(&self, task: &str, work: F) -> ExecutorResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.run_blocking(task, work, Duration::ZERO).inspect_err(|e| {
            if matches!(e, ExecutorError::Rejected(_)) {
                error!(task = %task, "Can't execute task: executor is unavailable");
            }
        })
    }

    fn run_blocking<T, F>(&self, task: &str, work: F, timeout: Duration) -> ExecutorResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.is_worker_thread() {
            return run_caught(task, work);
        }

        let completion = Arc::new(Completion::new());
        let notifier = Notifier {
            completion: completion.clone(),
            task: task.to_string(),
        };
        let job: Job = Box::new(move || {
            let outcome = run_caught(&notifier.task, work);
            notifier.completion.complete(outcome);
        });

        if !self.enqueue(task, job) {
            return Err(ExecutorError::Rejected(task.to_string()));
        }

        completion
            .wait(timeout)
            .ok_or_else(|| ExecutorError::Timeout(task.to_string()))?
    }

    fn enqueue(&self, task: &str, job: Job) -> bool {
        if self.is_shut_down() {
            error!(task = %task, "Executor '{}' rejected task: shut down", self.name);
            return false;
        }
        let message = Message::Run {
            task: task.to_string(),
            job,
        };
        if self.queue.send(message).is_err() {
            error!(task = %task, "Executor '{}' rejected task: worker has exited", self.name);
            return false;
        }
        true
    }
}

impl Drop for SerializedExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SerializedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedExecutor")
            .field("name", &self.name)
            .field("worker", &self.worker)
            .field("closed", &self.is_shut_down())
            .finish()
    }
}

fn worker_loop(name: String, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = rx.blocking_recv() {
        match message {
            Message::Run { task, job } => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                    error!(task = %task, "Task panicked: {}", panic_message(payload.as_ref()));
                }
            }
            Message::Shutdown => break,
        }
    }

    // Anything queued behind the shutdown marker is dropped, which releases
    // blocked callers with a rejection.
    rx.close();
    let mut dropped = 0usize;
    while let Ok(message) = rx.try_recv() {
        drop(message);
        dropped += 1;
    }
    if dropped > 0 {
        debug!("Executor '{}' dropped {} queued tasks on shutdown", name, dropped);
    }
    info!("Executor thread '{}' exited", name);
}

fn run_caught<T, F>(task: &str, work: F) -> ExecutorResult<T>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        error!(task = %task, "Task panicked: {message}");
        ExecutorError::Panicked {
            task: task.to_string(),
            message,
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Result slot shared between a blocked caller and the worker.
struct Completion<T> {
    slot: Mutex<Option<ExecutorResult<T>>>,
    done: Condvar,
}

impl<T> Completion<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    /// Store `outcome` unless one was already stored, then wake waiters.
    fn complete(&self, outcome: ExecutorResult<T>) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(outcome);
        }
        self.done.notify_all();
    }

    /// Wait for the outcome. Zero `timeout` waits forever; `None` on timeout.
    fn wait(&self, timeout: Duration) -> Option<ExecutorResult<T>> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let mut slot = if timeout.is_zero() {
            self.done
                .wait_while(slot, |s| s.is_none())
                .unwrap_or_else(PoisonError::into_inner)
        } else {
            let (slot, _) = self
                .done
                .wait_timeout_while(slot, timeout, |s| s.is_none())
                .unwrap_or_else(PoisonError::into_inner);
            slot
        };
        slot.take()
    }
}

/// Completes its slot with a rejection if the job is dropped without running.
struct Notifier<T> {
    completion: Arc<Completion<T>>,
    task: String,
}

impl<T> Drop for Notifier<T> {
    fn drop(&mut self) {
        self.completion
            .complete(Err(ExecutorError::Rejected(self.task.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc as std_mpsc;
    use std::time::Instant;

    fn executor() -> Arc<SerializedExecutor> {
        SerializedExecutor::spawn("test-executor").unwrap()
    }

    #[test]
    fn test_fifo_across_threads() {
        let exec = executor();
        let sequencer = Arc::new(Mutex::new(0usize));
        let executed = Arc::new(Mutex::new(Vec::new()));

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let exec = exec.clone();
                let sequencer = sequencer.clone();
                let executed = executed.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        // Hold the sequencer across the enqueue so submission
                        // order equals sequence order.
                        let mut next = sequencer.lock().unwrap();
                        let seq = *next;
                        *next += 1;
                        let executed = executed.clone();
                        exec.submit("record", move || {
                            executed.lock().unwrap().push(seq);
                            Ok(())
                        });
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        assert!(exec.submit_and_wait("barrier", || Ok(()), Duration::ZERO));
        let executed = executed.lock().unwrap();
        assert_eq!(executed.len(), 200);
        assert!(executed.iter().enumerate().all(|(i, &seq)| i == seq));
    }

    #[test]
    fn test_blocking_calls_inline_on_worker() {
        let exec = executor();
        let inner = exec.clone();

        let result = exec
            .submit_and_return("outer", move || {
                let ran = Arc::new(AtomicBool::new(false));
                let flag = ran.clone();
                let waited = inner.submit_and_wait(
                    "inner_wait",
                    move || {
                        flag.store(true, Ordering::SeqCst);
                        Ok(())
                    },
                    Duration::ZERO,
                );
                // Must have run before submit_and_wait returned
                let observed = ran.load(Ordering::SeqCst);
                let value = inner.submit_and_return("inner_return", || 21 * 2);
                (waited, observed, value)
            })
            .unwrap();

        assert_eq!(result, (true, true, Ok(42)));
    }

    #[test]
    fn test_submit_and_return_runs_on_worker() {
        let exec = executor();
        let caller = thread::current().id();

        let worker = exec
            .submit_and_return("thread_id", || thread::current().id())
            .unwrap();
        assert_ne!(worker, caller);
        assert!(!exec.is_worker_thread());

        let value = exec
            .submit_and_return("compute", || {
                thread::sleep(Duration::from_millis(20));
                "computed".to_string()
            })
            .unwrap();
        assert_eq!(value, "computed");
    }

    #[test]
    fn test_failures_do_not_kill_worker() {
        let exec = executor();
        let counter = Arc::new(AtomicUsize::new(0));

        exec.submit("fails", || anyhow::bail!("boom"));
        exec.submit("panics", || panic!("task panic"));
        let c = counter.clone();
        exec.submit("after", move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let panicked = exec.submit_and_return("panics_blocking", || -> u32 { panic!("blocking panic") });
        assert!(matches!(panicked, Err(ExecutorError::Panicked { .. })));

        assert!(exec.submit_and_wait("errors_blocking", || anyhow::bail!("oops"), Duration::ZERO));
        assert_eq!(exec.submit_and_return("still_alive", || 7), Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_submit_and_wait_timeout() {
        let exec = executor();
        let (release_tx, release_rx) = std_mpsc::channel::<()>();

        exec.submit("blocker", move || {
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
            Ok(())
        });

        let start = Instant::now();
        let completed = exec.submit_and_wait("late", || Ok(()), Duration::from_millis(50));
        assert!(!completed);
        assert!(start.elapsed() >= Duration::from_millis(50));

        release_tx.send(()).unwrap();
        assert!(exec.submit_and_wait("after_release", || Ok(()), Duration::from_secs(5)));
    }

    #[test]
    fn test_rejected_after_shutdown() {
        let exec = executor();
        exec.shutdown();

        assert!(!exec.submit_and_wait("rejected", || Ok(()), Duration::ZERO));
        assert_eq!(
            exec.submit_and_return("rejected", || 1),
            Err(ExecutorError::Rejected("rejected".to_string()))
        );
        // Fire-and-forget only logs
        exec.submit("rejected", || Ok(()));
    }

    #[test]
    fn test_queued_work_runs_before_shutdown() {
        let exec = executor();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let c = counter.clone();
            exec.submit("count", move || {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let (done_tx, done_rx) = std_mpsc::channel();
        exec.submit("last", move || {
            done_tx.send(()).ok();
            Ok(())
        });
        exec.shutdown();

        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_global_is_shared() {
        let a = SerializedExecutor::global().unwrap();
        let b = SerializedExecutor::global().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), GLOBAL_THREAD_NAME);
        assert_eq!(b.submit_and_return("global", || 5), Ok(5));
    }
}
