//! Synchronizer lifecycle state machine

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::{BridgeError, BridgeResult};

/// Lifecycle states of a synchronizer's background loop
///
/// State transitions:
/// ```text
/// Inert → Running → Stopping → Stopped
///   └──────────────────────────→┘ (shutdown before first use)
///         Any state → Failed (loop thread death)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    /// Created but the loop thread has not started yet
    #[default]
    Inert,
    /// The loop thread is up and accepting submissions
    Running,
    /// Shutdown in progress; in-flight tasks are being cancelled and drained
    Stopping,
    /// The loop has been drained and the thread joined
    Stopped,
    /// The loop thread died unexpectedly; the synchronizer is unusable
    Failed,
}

impl BridgeState {
    /// Check if this state can transition to the target state
    pub fn can_transition_to(&self, target: BridgeState) -> bool {
        use BridgeState::*;
        matches!(
            (self, target),
            (Inert, Running)
                | (Running, Stopping)
                | (Stopping, Stopped)
                // shutdown before the loop ever started
                | (Inert, Stopped)
                // any live state can fail
                | (Inert, Failed)
                | (Running, Failed)
                | (Stopping, Failed)
        )
    }

    /// Check if new work may be submitted in this state
    pub fn can_submit(&self) -> bool {
        matches!(self, BridgeState::Inert | BridgeState::Running)
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgeState::Stopped | BridgeState::Failed)
    }
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeState::Inert => write!(f, "Inert"),
            BridgeState::Running => write!(f, "Running"),
            BridgeState::Stopping => write!(f, "Stopping"),
            BridgeState::Stopped => write!(f, "Stopped"),
            BridgeState::Failed => write!(f, "Failed"),
        }
    }
}

/// Thread-safe state holder
///
/// Shared between the loop thread, blocking callers, and shutdown; all of
/// them only need atomic load/store semantics.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Create a cell in the [`BridgeState::Inert`] state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state
    pub fn get(&self) -> BridgeState {
        match self.0.load(Ordering::SeqCst) {
            0 => BridgeState::Inert,
            1 => BridgeState::Running,
            2 => BridgeState::Stopping,
            3 => BridgeState::Stopped,
            _ => BridgeState::Failed,
        }
    }

    /// Set the state directly, bypassing transition validation
    ///
    /// Use this for failure paths where normal transitions don't apply.
    pub fn set(&self, state: BridgeState) {
        let value = match state {
            BridgeState::Inert => 0,
            BridgeState::Running => 1,
            BridgeState::Stopping => 2,
            BridgeState::Stopped => 3,
            BridgeState::Failed => 4,
        };
        self.0.store(value, Ordering::SeqCst);
    }

    /// Attempt to transition to a new state
    pub fn transition_to(&self, target: BridgeState) -> BridgeResult<()> {
        let current = self.get();
        if current.can_transition_to(target) {
            self.set(target);
            Ok(())
        } else {
            Err(BridgeError::InvalidState {
                expected: format!("state that can transition to {}", target),
                actual: current.to_string(),
            })
        }
    }
}

#[cfg(test)]
#[path = "state/state_tests.rs"]
mod state_tests;
