//! Configuration for kalam-bind.
//!
//! All options deserialize with per-field defaults, so a partial JSON document
//! (or none at all) yields a working configuration.
//!
//! # Example
//!
//! ```rust
//! use kalam_bind::{AuthOptions, BindOptions, CoordinatorOptions};
//!
//! // Defaults: flush on the next scheduler turn, no password length check
//! let options = BindOptions::default();
//!
//! // Coalesce subscription changes over a 16ms window and reject short passwords
//! let options = BindOptions::new()
//!     .with_coordinator(CoordinatorOptions::new().with_flush_delay_ms(16))
//!     .with_auth(AuthOptions::new().with_min_password_length(Some(8)));
//! ```

use crate::error::{KalamBindError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::runtime::RuntimeFlavor;

/// Upper bound for `flush_delay_ms`; anything longer stops being "the same tick".
pub const MAX_FLUSH_DELAY_MS: u64 = 60_000;

/// Shortest batching window on a multi-thread runtime.
///
/// There an idle worker can pick up the deferred flush while the caller is
/// still inside its synchronous section, so a yield alone does not close the
/// window.
pub const MULTI_THREAD_MIN_FLUSH_DELAY_MS: u64 = 10;

/// Options for a [`SubscriptionBatchCoordinator`](crate::SubscriptionBatchCoordinator).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorOptions {
    /// Delay between the first mutation of a batch and its flush, in milliseconds.
    ///
    /// `0` (the default) flushes on the next turn of the async scheduler, which
    /// coalesces every call made before the caller next awaits.
    #[serde(default)]
    pub flush_delay_ms: u64,
}

impl CoordinatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the accumulation window in milliseconds
    pub fn with_flush_delay_ms(mut self, delay_ms: u64) -> Self {
        self.flush_delay_ms = delay_ms;
        self
    }

    /// Accumulation window as a `Duration`
    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }

    /// Window actually used on a runtime of the given flavor.
    ///
    /// Current-thread runtimes use `flush_delay_ms` as configured; any other
    /// flavor uses at least [`MULTI_THREAD_MIN_FLUSH_DELAY_MS`].
    pub fn effective_flush_delay(&self, flavor: RuntimeFlavor) -> Duration {
        match flavor {
            RuntimeFlavor::CurrentThread => self.flush_delay(),
            _ => self
                .flush_delay()
                .max(Duration::from_millis(MULTI_THREAD_MIN_FLUSH_DELAY_MS)),
        }
    }
}

/// Options for the [`AuthBinding`](crate::AuthBinding).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOptions {
    /// Reject passwords shorter than this before calling the transport.
    /// Default: None (length is left to the server)
    #[serde(default)]
    pub min_password_length: Option<usize>,
}

impl AuthOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum password length checked client-side
    pub fn with_min_password_length(mut self, min: Option<usize>) -> Self {
        self.min_password_length = min;
        self
    }
}

/// Top-level configuration for a [`KalamBindClient`](crate::KalamBindClient).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindOptions {
    #[serde(default)]
    pub coordinator: CoordinatorOptions,

    #[serde(default)]
    pub auth: AuthOptions,
}

impl BindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coordinator(mut self, coordinator: CoordinatorOptions) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn with_auth(mut self, auth: AuthOptions) -> Self {
        self.auth = auth;
        self
    }

    /// Parse options from a JSON document and validate them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: BindOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Check option values for consistency
    pub fn validate(&self) -> Result<()> {
        if self.coordinator.flush_delay_ms > MAX_FLUSH_DELAY_MS {
            return Err(KalamBindError::ConfigurationError(format!(
                "flush_delay_ms must be at most {} (got {})",
                MAX_FLUSH_DELAY_MS, self.coordinator.flush_delay_ms
            )));
        }
        if self.auth.min_password_length == Some(0) {
            return Err(KalamBindError::ConfigurationError(
                "min_password_length must be positive; use null to disable the check".into(),
            ));
        }
        Ok(())
    }
}
