//! # Runtime
//!
//! Scheduling around the reconcilers: work queues fed by Kubernetes watches,
//! worker pools, the process-wide rate limiter and the error policy.
//!
//! ## Module Structure
//!
//! - `queue.rs` - Deduplicating delayed work queue with per-key backoff
//! - `rate_limiter.rs` - Token bucket shared by every kind
//! - `error_policy.rs` - Error kind to scheduling action
//! - `controller.rs` - Workers and watch streams for one kind
//! - `initialization.rs` - Process setup (TLS, tracing, metrics, client)

pub mod controller;
pub mod error_policy;
pub mod initialization;
pub mod queue;
pub mod rate_limiter;

pub use controller::{Controller, DesiredStateFilter};
pub use error_policy::error_policy;
pub use queue::WorkQueue;
pub use rate_limiter::TokenBucket;

use crate::config::ControllerConfig;
use crate::controller::reconciler::{Action, ReconcilerError};
use async_trait::async_trait;
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A reconciler the runtime can schedule
#[async_trait]
pub trait Reconcile: Send + Sync {
    /// Kind name used in logs and metrics
    fn kind(&self) -> &'static str;

    /// Requeue interval for converged records and configuration errors
    fn poll_interval(&self) -> Duration;

    async fn reconcile(
        &self,
        name: &str,
        cancel: CancellationToken,
    ) -> Result<Action, ReconcilerError>;
}

/// Everything a kind's `setup` needs to register its controller
#[derive(Clone)]
pub struct SetupContext {
    pub client: Client,
    pub config: ControllerConfig,
    /// Shared by all kinds
    pub limiter: Arc<TokenBucket>,
    /// Fires on process shutdown
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for SetupContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
