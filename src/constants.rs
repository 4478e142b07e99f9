//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group for every custom resource served by this provider
pub const API_GROUP: &str = "litellm.crossplane.io";

/// API version for every custom resource served by this provider
pub const API_VERSION: &str = "v1alpha1";

/// Field manager used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "provider-litellm";

/// Finalizer guarding managed records until the external resource is gone
pub const MANAGED_FINALIZER: &str = "finalizer.managedresource.crossplane.io";

/// Finalizer guarding ProviderConfigs while managed records still use them
pub const PROVIDER_CONFIG_FINALIZER: &str = "in-use.crossplane.io";

/// Label linking a ProviderConfigUsage to its ProviderConfig
pub const PROVIDER_CONFIG_LABEL: &str = "litellm.crossplane.io/provider-config";

/// Default ProviderConfig name when a record does not reference one
pub const DEFAULT_PROVIDER_CONFIG_NAME: &str = "default";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default poll interval for converged records
pub const DEFAULT_POLL_INTERVAL: &str = "1m";

/// Default number of reconciliations admitted per second, process-wide
pub const DEFAULT_MAX_RECONCILE_RATE: u32 = 10;

/// Default number of concurrent reconciliations per kind
pub const DEFAULT_MAX_CONCURRENT_RECONCILES: usize = 10;

/// Default exponential backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Default exponential backoff maximum value (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 60;

/// Default deadline for a single reconciliation (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 60;

/// Default timeout for one HTTP request to the LiteLLM proxy (seconds)
pub const DEFAULT_EXTERNAL_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Number of unconditional status write attempts after a mutating external call
pub const CRITICAL_STATUS_WRITE_ATTEMPTS: u32 = 3;
