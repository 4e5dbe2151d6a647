//! Error types for the synchronizer bridge

use std::sync::Arc;

use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Callback invoked for errors that have no caller left to report to,
/// such as tasks abandoned at shutdown or a dead loop thread.
pub type ErrorCallback = Arc<dyn Fn(&BridgeError) + Send + Sync>;

/// Error type for bridge operations.
///
/// User errors never appear here: a wrapped function whose output is a
/// `Result` delivers that `Result` verbatim as the call's value. This enum
/// only covers failures of the bridge itself.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A call was submitted after the synchronizer shut down
    #[error("synchronizer `{name}` is closed")]
    Closed { name: String },

    /// The in-flight task was cancelled before completing
    #[error("task cancelled")]
    Cancelled,

    /// A terminating signal cancelled the in-flight task of a blocking call
    #[error("blocking call interrupted by termination signal")]
    Interrupted,

    /// Blocking entry invoked on the synchronizer's own loop thread
    #[error("deadlock detected: blocking entry invoked on the synchronizer loop thread")]
    WouldDeadlock,

    /// The background event loop crashed or could not be started
    #[error("synchronizer loop failed: {0}")]
    LoopFailed(String),

    /// The wrapped future panicked on the background loop
    #[error("wrapped task panicked: {0}")]
    Panicked(String),

    /// Waiting for a scheduled result exceeded the given deadline
    #[error("timed out waiting for task result")]
    ResultTimeout,

    /// `schedule` invoked on a wrapper created with `allow_futures = false`
    #[error("wrapper `{name}` does not accept future-requested calls")]
    FuturesNotAllowed { name: String },

    /// Lifecycle state machine rejected a transition
    #[error("invalid lifecycle state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },
}

impl BridgeError {
    /// True for the cancellation kind, whichever path produced it
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BridgeError::Cancelled | BridgeError::Interrupted)
    }

    /// True when the error means the synchronizer is gone for good
    pub fn is_shutdown(&self) -> bool {
        matches!(
            self,
            BridgeError::Closed { .. } | BridgeError::LoopFailed(_)
        )
    }

    /// True for caller mistakes that are reported synchronously
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            BridgeError::WouldDeadlock | BridgeError::FuturesNotAllowed { .. }
        )
    }
}

#[cfg(test)]
#[path = "error/error_tests.rs"]
mod error_tests;
