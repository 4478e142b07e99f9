//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::config::duration::parse_duration;
use std::time::Duration;
use tracing::warn;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Command-line flags on the binary take precedence over the environment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Requeue interval for converged resources
    pub poll_interval: Duration,
    /// Reconciliations admitted per second across all kinds
    /// Burst equals the rate
    pub max_reconcile_rate: u32,
    /// Concurrent reconciliations per kind
    pub max_concurrent_reconciles: usize,
    /// Exponential backoff starting value (milliseconds)
    pub backoff_base_ms: u64,
    /// Exponential backoff maximum value (seconds)
    pub backoff_max_secs: u64,
    /// Deadline for a single reconciliation (seconds)
    pub reconcile_timeout_secs: u64,
    /// Timeout for one request to the LiteLLM proxy (seconds)
    pub external_request_timeout_secs: u64,
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            poll_interval: Duration::from_secs(60),
            max_reconcile_rate: DEFAULT_MAX_RECONCILE_RATE,
            max_concurrent_reconciles: DEFAULT_MAX_CONCURRENT_RECONCILES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            external_request_timeout_secs: DEFAULT_EXTERNAL_REQUEST_TIMEOUT_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            poll_interval: env_var_or_default_duration("POLL_INTERVAL", DEFAULT_POLL_INTERVAL),
            max_reconcile_rate: env_var_or_default(
                "MAX_RECONCILE_RATE",
                DEFAULT_MAX_RECONCILE_RATE,
            )
            .max(1),
            max_concurrent_reconciles: env_var_or_default(
                "MAX_CONCURRENT_RECONCILES",
                DEFAULT_MAX_CONCURRENT_RECONCILES,
            )
            .max(1),
            backoff_base_ms: env_var_or_default("BACKOFF_BASE_MS", DEFAULT_BACKOFF_BASE_MS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            reconcile_timeout_secs: env_var_or_default(
                "RECONCILE_TIMEOUT_SECS",
                DEFAULT_RECONCILE_TIMEOUT_SECS,
            ),
            external_request_timeout_secs: env_var_or_default(
                "EXTERNAL_REQUEST_TIMEOUT_SECS",
                DEFAULT_EXTERNAL_REQUEST_TIMEOUT_SECS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
        }
    }

    /// Get backoff base duration
    pub fn backoff_base_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Get backoff max duration
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    /// Get reconcile timeout duration
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Get external request timeout duration
    pub fn external_request_timeout(&self) -> Duration {
        Duration::from_secs(self.external_request_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as a duration string or return default
fn env_var_or_default_duration(key: &str, default: &str) -> Duration {
    let fallback = parse_duration(default).unwrap_or(Duration::from_secs(60));
    match std::env::var(key) {
        Ok(value) => parse_duration(&value).unwrap_or_else(|e| {
            warn!("Ignoring {}={}: {}, using {}", key, value, e, default);
            fallback
        }),
        Err(_) => fallback,
    }
}
