//! Handle for submit-and-return-immediately calls

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use syncbridge_core::{BridgeError, BridgeResult};
use tokio_util::sync::CancellationToken;

use crate::LoopHost;

/// Handle to a task scheduled on the background loop
///
/// Returned by [`LoopHost::schedule`] and the wrappers' future-requested
/// entry points. The task keeps running whether or not the handle is
/// polled; dropping the handle detaches it.
pub struct ScheduledCall<T> {
    rx: mpsc::Receiver<BridgeResult<T>>,
    cached: Option<BridgeResult<T>>,
    cancel: CancellationToken,
    done: Arc<AtomicBool>,
    host: LoopHost,
}

impl<T: Send + 'static> ScheduledCall<T> {
    pub(crate) fn new(
        rx: mpsc::Receiver<BridgeResult<T>>,
        cancel: CancellationToken,
        done: Arc<AtomicBool>,
        host: LoopHost,
    ) -> Self {
        Self {
            rx,
            cached: None,
            cancel,
            done,
            host,
        }
    }

    /// Block until the task completes and return its outcome
    pub fn result(mut self) -> BridgeResult<T> {
        if let Some(out) = self.cached.take() {
            return out;
        }
        match self.rx.recv() {
            Ok(out) => out,
            Err(_) => Err(self.host.disconnect_error()),
        }
    }

    /// Block up to `timeout` for the outcome
    ///
    /// On [`BridgeError::ResultTimeout`] the handle stays usable and the
    /// task keeps running.
    pub fn result_timeout(&mut self, timeout: Duration) -> BridgeResult<T> {
        if let Some(out) = self.cached.take() {
            return out;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(out) => out,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(BridgeError::ResultTimeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(self.host.disconnect_error()),
        }
    }

    /// Block up to `timeout` for completion without consuming the outcome
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        if self.cached.is_some() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(out) => {
                self.cached = Some(out);
                true
            }
            Err(mpsc::RecvTimeoutError::Timeout) => false,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                self.cached = Some(Err(self.host.disconnect_error()));
                true
            }
        }
    }

    /// Request cancellation of the scheduled task
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the task has finalized (returned, failed, or cancelled)
    pub fn done(&self) -> bool {
        self.cached.is_some() || self.done.load(Ordering::SeqCst)
    }
}

impl<T> std::fmt::Debug for ScheduledCall<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledCall")
            .field("done", &self.done.load(Ordering::SeqCst))
            .finish()
    }
}
