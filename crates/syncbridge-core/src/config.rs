//! Synchronizer configuration

use serde::{Deserialize, Serialize};

/// Configuration for a synchronizer and its background loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchronizerConfig {
    /// Logical name, used for singleton lookup and error messages
    #[serde(default = "default_name")]
    pub name: String,

    /// Name of the loop thread (default: derived from `name`)
    #[serde(default)]
    pub thread_name: Option<String>,

    /// How long shutdown waits for cancelled tasks to finalize before
    /// abandoning them, in milliseconds
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,

    /// How long consumer-side teardown of a wrapped generator or scope
    /// waits for finalization on the loop, in milliseconds
    #[serde(default = "default_finalize_timeout")]
    pub finalize_timeout_ms: u64,

    /// Forward SIGINT to in-flight blocking calls, cancelling their
    /// background tasks so the blocked thread is released promptly
    #[serde(default)]
    pub forward_interrupt: bool,

    /// Emit a warning when a blocking entry is invoked from inside an
    /// async context that could have used the `.aio` form instead
    #[serde(default = "default_true")]
    pub warn_blocking_in_async: bool,
}

fn default_name() -> String {
    "synchronizer".to_string()
}

fn default_shutdown_grace() -> u64 {
    5000
}

fn default_finalize_timeout() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            thread_name: None,
            shutdown_grace_ms: default_shutdown_grace(),
            finalize_timeout_ms: default_finalize_timeout(),
            forward_interrupt: false,
            warn_blocking_in_async: true,
        }
    }
}

impl SynchronizerConfig {
    /// Create a configuration with the default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with the given logical name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a configuration from JSON bytes
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes)
    }

    /// Set the loop thread name
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    /// Set the shutdown grace period
    pub fn with_shutdown_grace_ms(mut self, ms: u64) -> Self {
        self.shutdown_grace_ms = ms;
        self
    }

    /// Set the generator/scope finalization timeout
    pub fn with_finalize_timeout_ms(mut self, ms: u64) -> Self {
        self.finalize_timeout_ms = ms;
        self
    }

    /// Enable or disable SIGINT forwarding to in-flight blocking calls
    pub fn with_forward_interrupt(mut self, on: bool) -> Self {
        self.forward_interrupt = on;
        self
    }

    /// The effective loop thread name
    pub fn effective_thread_name(&self) -> String {
        self.thread_name
            .clone()
            .unwrap_or_else(|| format!("syncbridge-{}", self.name))
    }

    /// The shutdown grace period as a [`std::time::Duration`]
    pub fn shutdown_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_grace_ms)
    }

    /// The finalization timeout as a [`std::time::Duration`]
    pub fn finalize_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.finalize_timeout_ms)
    }
}
