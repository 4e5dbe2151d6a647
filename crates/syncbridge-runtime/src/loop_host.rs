//! The background loop thread and its submission primitives

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use syncbridge_core::{
    BridgeError, BridgeResult, BridgeState, ErrorCallback, StateCell, SynchronizerConfig,
};
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::interrupt::InterruptHub;
use crate::{CrossLoopFuture, ScheduledCall};

/// Owns one background thread running one cooperative event loop
///
/// The thread starts lazily on the first submission and is torn down by
/// [`LoopHost::shutdown`]. Cloning the host is cheap; all clones share the
/// same loop.
#[derive(Clone)]
pub struct LoopHost {
    inner: Arc<HostInner>,
}

struct HostInner {
    config: SynchronizerConfig,
    state: StateCell,
    boot: Mutex<Option<LoopCore>>,
    interrupts: InterruptHub,
    failure: Mutex<Option<String>>,
    on_task_error: Option<ErrorCallback>,
}

/// Live pieces of a started loop, kept under the boot lock
struct LoopCore {
    handle: tokio::runtime::Handle,
    thread: Option<thread::JoinHandle<()>>,
    thread_id: thread::ThreadId,
    stop: CancellationToken,
    cancel_root: CancellationToken,
    tracker: TaskTracker,
}

/// Cheap clone of the parts a submission needs
#[derive(Clone)]
pub(crate) struct CoreRef {
    handle: tokio::runtime::Handle,
    thread_id: thread::ThreadId,
    cancel_root: CancellationToken,
    tracker: TaskTracker,
}

impl CoreRef {
    /// Token for a new task, child of the loop's cancellation root
    pub(crate) fn child_token(&self) -> CancellationToken {
        self.cancel_root.child_token()
    }
}

impl LoopCore {
    fn to_ref(&self) -> CoreRef {
        CoreRef {
            handle: self.handle.clone(),
            thread_id: self.thread_id,
            cancel_root: self.cancel_root.clone(),
            tracker: self.tracker.clone(),
        }
    }
}

impl LoopHost {
    /// Create an inert host; the loop thread starts on first use
    pub fn new(config: SynchronizerConfig, on_task_error: Option<ErrorCallback>) -> Self {
        Self {
            inner: Arc::new(HostInner {
                config,
                state: StateCell::new(),
                boot: Mutex::new(None),
                interrupts: InterruptHub::new(),
                failure: Mutex::new(None),
                on_task_error,
            }),
        }
    }

    /// The synchronizer's logical name
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// The configuration this host was created with
    pub fn config(&self) -> &SynchronizerConfig {
        &self.inner.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> BridgeState {
        self.inner.state.get()
    }

    /// Number of tasks currently tracked on the loop
    pub fn task_count(&self) -> usize {
        self.inner.boot.lock().as_ref().map_or(0, |c| c.tracker.len())
    }

    /// True when called from the loop thread itself
    pub fn is_loop_thread(&self) -> bool {
        self.inner
            .boot
            .lock()
            .as_ref()
            .is_some_and(|c| c.thread_id == thread::current().id())
    }

    /// Cancel every in-flight blocking call, as a termination signal would
    ///
    /// Returns the number of calls hit. The watcher installed by
    /// `forward_interrupt` goes through this same path.
    pub fn interrupt(&self) -> usize {
        self.inner.interrupts.fire()
    }

    /// Block the calling OS thread until `fut` completes on the loop
    ///
    /// Forbidden on the loop thread itself, where parking would deadlock
    /// the loop.
    pub fn run_blocking<F, T>(&self, fut: F) -> BridgeResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let core = self.ensure_core()?;
        if thread::current().id() == core.thread_id {
            return Err(BridgeError::WouldDeadlock);
        }
        let (tx, rx) = mpsc::channel();
        let token = core.cancel_root.child_token();
        // armed before the task exists, so a signal can never slip between
        // the spawn and the arm
        let armed = self.inner.interrupts.arm(token.clone());
        self.submit(&core, token, fut, move |out| {
            let _ = tx.send(out);
        });
        match rx.recv() {
            Ok(Err(BridgeError::Cancelled)) if armed.fired() => Err(BridgeError::Interrupted),
            Ok(out) => out,
            Err(_) => Err(self.disconnect_error()),
        }
    }

    /// Return an awaitable resolving to `fut`'s outcome on the loop
    ///
    /// Submission is deferred to the first poll, so the returned future may
    /// be built anywhere and driven by any runtime. Awaiting it from a task
    /// already running on this host's loop is fine; the loop keeps turning
    /// while the caller task is suspended.
    pub fn run_cooperative<F, T>(&self, fut: F) -> CrossLoopFuture<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        CrossLoopFuture::queued(self.clone(), Box::pin(fut))
    }

    /// Submit `fut` and return a handle immediately
    pub fn schedule<F, T>(&self, fut: F) -> BridgeResult<ScheduledCall<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let core = self.ensure_core()?;
        let (tx, rx) = mpsc::channel();
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let token = core.cancel_root.child_token();
        self.submit(&core, token.clone(), fut, move |out| {
            flag.store(true, Ordering::SeqCst);
            let _ = tx.send(out);
        });
        Ok(ScheduledCall::new(rx, token, done, self.clone()))
    }

    /// Spawn `fut` as a tracked task governed by `token` and hand its
    /// outcome to `deliver` exactly once
    pub(crate) fn submit<F, T, D>(
        &self,
        core: &CoreRef,
        token: CancellationToken,
        fut: F,
        deliver: D,
    ) where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        D: FnOnce(BridgeResult<T>) + Send + 'static,
    {
        let cancel = token;
        let task = async move {
            let outcome = {
                let guarded = AssertUnwindSafe(fut).catch_unwind();
                tokio::pin!(guarded);
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    out = &mut guarded => Some(out),
                }
            };
            // the user future is dropped at the end of the block above, so a
            // cancellation outcome is delivered only after finalization
            match outcome {
                None => deliver(Err(BridgeError::Cancelled)),
                Some(Ok(value)) => deliver(Ok(value)),
                Some(Err(payload)) => {
                    deliver(Err(BridgeError::Panicked(panic_message(payload.as_ref()))))
                }
            }
        };
        core.handle.spawn(core.tracker.track_future(task));
    }

    /// Get the running core, starting the loop thread if needed
    pub(crate) fn ensure_core(&self) -> BridgeResult<CoreRef> {
        let mut boot = self.inner.boot.lock();
        match self.inner.state.get() {
            BridgeState::Stopping | BridgeState::Stopped => return Err(self.closed_error()),
            BridgeState::Failed => return Err(self.failure_error()),
            BridgeState::Inert | BridgeState::Running => {}
        }
        let thread_died = boot
            .as_ref()
            .is_some_and(|c| c.thread.as_ref().is_some_and(|t| t.is_finished()));
        if thread_died {
            *boot = None;
            self.mark_failed("loop thread terminated unexpectedly");
            return Err(self.failure_error());
        }
        if let Some(core) = boot.as_ref() {
            return Ok(core.to_ref());
        }
        let core = self.start_locked()?;
        self.inner.state.set(BridgeState::Running);
        tracing::info!(
            name = %self.inner.config.name,
            thread = %self.inner.config.effective_thread_name(),
            "synchronizer loop started"
        );
        let core_ref = core.to_ref();
        *boot = Some(core);
        Ok(core_ref)
    }

    fn start_locked(&self) -> BridgeResult<LoopCore> {
        let config = &self.inner.config;
        let stop = CancellationToken::new();
        let cancel_root = CancellationToken::new();
        let tracker = TaskTracker::new();
        let (boot_tx, boot_rx) = mpsc::channel();
        let main = LoopMain {
            stop: stop.clone(),
            tracker: tracker.clone(),
            grace: config.shutdown_grace(),
            forward_interrupt: config.forward_interrupt,
            interrupts: self.inner.interrupts.clone(),
            on_task_error: self.inner.on_task_error.clone(),
            name: config.name.clone(),
        };
        let thread = thread::Builder::new()
            .name(config.effective_thread_name())
            .spawn(move || main.run(boot_tx))
            .map_err(|e| BridgeError::LoopFailed(format!("failed to spawn loop thread: {e}")))?;
        let handle = match boot_rx.recv() {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                return Err(BridgeError::LoopFailed(format!(
                    "failed to build event loop: {e}"
                )))
            }
            Err(_) => {
                return Err(BridgeError::LoopFailed(
                    "loop thread exited during startup".to_string(),
                ))
            }
        };
        Ok(LoopCore {
            handle,
            thread_id: thread.thread().id(),
            thread: Some(thread),
            stop,
            cancel_root,
            tracker,
        })
    }

    /// Cancel all tracked tasks, drain them within the grace period, stop
    /// the loop, and join the thread
    ///
    /// Idempotent; later submissions fail fast with the closed error.
    pub fn shutdown(&self) -> BridgeResult<()> {
        let core = {
            let mut boot = self.inner.boot.lock();
            match self.inner.state.get() {
                BridgeState::Stopping | BridgeState::Stopped | BridgeState::Failed => {
                    return Ok(())
                }
                BridgeState::Inert => {
                    self.inner.state.set(BridgeState::Stopped);
                    return Ok(());
                }
                BridgeState::Running => {}
            }
            self.inner.state.set(BridgeState::Stopping);
            boot.take()
        };
        let Some(mut core) = core else {
            self.inner.state.set(BridgeState::Stopped);
            return Ok(());
        };
        tracing::info!(name = %self.inner.config.name, "synchronizer shutting down");
        core.cancel_root.cancel();
        core.stop.cancel();
        if let Some(thread) = core.thread.take() {
            if thread::current().id() != core.thread_id {
                let _ = thread.join();
            }
        }
        self.inner.state.set(BridgeState::Stopped);
        tracing::info!(name = %self.inner.config.name, "synchronizer stopped");
        Ok(())
    }

    fn mark_failed(&self, cause: &str) {
        *self.inner.failure.lock() = Some(cause.to_string());
        self.inner.state.set(BridgeState::Failed);
        tracing::error!(name = %self.inner.config.name, cause, "synchronizer loop failed");
        if let Some(report) = &self.inner.on_task_error {
            report(&BridgeError::LoopFailed(cause.to_string()));
        }
    }

    fn closed_error(&self) -> BridgeError {
        BridgeError::Closed {
            name: self.inner.config.name.clone(),
        }
    }

    fn failure_error(&self) -> BridgeError {
        let cause = self
            .inner
            .failure
            .lock()
            .clone()
            .unwrap_or_else(|| "loop failed".to_string());
        BridgeError::LoopFailed(cause)
    }

    /// Error for a result channel that closed without delivering
    pub(crate) fn disconnect_error(&self) -> BridgeError {
        match self.inner.state.get() {
            BridgeState::Stopping | BridgeState::Stopped => self.closed_error(),
            BridgeState::Failed => self.failure_error(),
            _ => BridgeError::LoopFailed("result channel closed unexpectedly".to_string()),
        }
    }
}

impl Drop for HostInner {
    fn drop(&mut self) {
        if let Some(core) = self.boot.get_mut().take() {
            core.cancel_root.cancel();
            core.stop.cancel();
            // no join: the loop thread drains and exits on its own, and the
            // last handle may be dropped on the loop thread itself
        }
    }
}

impl std::fmt::Debug for LoopHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHost")
            .field("name", &self.inner.config.name)
            .field("state", &self.inner.state.get())
            .finish()
    }
}

/// Everything the loop thread's main function needs
struct LoopMain {
    stop: CancellationToken,
    tracker: TaskTracker,
    grace: Duration,
    forward_interrupt: bool,
    interrupts: InterruptHub,
    on_task_error: Option<ErrorCallback>,
    name: String,
}

impl LoopMain {
    fn run(self, boot_tx: mpsc::Sender<Result<tokio::runtime::Handle, std::io::Error>>) {
        let rt = match Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                let _ = boot_tx.send(Err(e));
                return;
            }
        };
        let _ = boot_tx.send(Ok(rt.handle().clone()));
        rt.block_on(async {
            if self.forward_interrupt {
                let hub = self.interrupts.clone();
                tokio::spawn(async move {
                    loop {
                        match tokio::signal::ctrl_c().await {
                            Ok(()) => {
                                let hit = hub.fire();
                                tracing::info!(hit, "termination signal forwarded to blocking calls");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "cannot listen for termination signals");
                                break;
                            }
                        }
                    }
                });
            }
            self.stop.cancelled().await;
            self.tracker.close();
            if tokio::time::timeout(self.grace, self.tracker.wait())
                .await
                .is_err()
            {
                let abandoned = self.tracker.len();
                tracing::warn!(
                    name = %self.name,
                    abandoned,
                    "shutdown grace period expired; abandoning unfinished tasks"
                );
                if let Some(report) = &self.on_task_error {
                    report(&BridgeError::LoopFailed(format!(
                        "{abandoned} task(s) abandoned at shutdown"
                    )));
                }
            }
        });
        // dropping the runtime discards anything still pending
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "loop_host/loop_host_tests.rs"]
mod loop_host_tests;
