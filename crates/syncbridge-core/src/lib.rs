//! syncbridge-core - Error, state, and configuration types
//!
//! This crate provides the foundational types shared by the syncbridge
//! runtime and wrapper layers:
//! - [`BridgeError`] / [`BridgeResult`] for error handling
//! - [`BridgeState`] and [`StateCell`] for lifecycle management
//! - [`SynchronizerConfig`] for synchronizer configuration

mod config;
mod error;
mod state;

pub use config::SynchronizerConfig;
pub use error::{BridgeError, BridgeResult, ErrorCallback};
pub use state::{BridgeState, StateCell};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{BridgeError, BridgeResult, BridgeState, SynchronizerConfig};
}
