//! # Initialization
//!
//! Process setup: rustls crypto provider, tracing, metrics, the HTTP server
//! and the Kubernetes client.

use crate::config::ControllerConfig;
use crate::observability;
use crate::runtime::{SetupContext, TokenBucket};
use crate::server::{start_server, ServerState};
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "provider_litellm=info";
const DEBUG_LOG_FILTER: &str = "provider_litellm=debug";

/// Everything `main` needs after initialization
pub struct InitializationResult {
    pub context: SetupContext,
    pub server_state: Arc<ServerState>,
    pub server_handle: JoinHandle<()>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field(
                "server_ready",
                &self
                    .server_state
                    .is_ready
                    .load(std::sync::atomic::Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

/// Install the ring crypto provider for rustls
///
/// Must run before any TLS connection is made.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }
}

pub fn init_tracing(debug: bool) {
    let fallback = if debug {
        DEBUG_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .try_init()
    {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// Initialize the provider runtime
///
/// The readiness probe stays unready until the caller marks it after every
/// controller is registered.
pub async fn initialize(
    config: ControllerConfig,
    debug: bool,
    shutdown: CancellationToken,
) -> Result<InitializationResult> {
    install_crypto_provider();
    init_tracing(debug);

    info!("Starting LiteLLM provider");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        "Poll interval {:?}, max reconcile rate {}/s, {} workers per kind",
        config.poll_interval, config.max_reconcile_rate, config.max_concurrent_reconciles
    );

    observability::metrics::register_metrics().context("Failed to register metrics")?;

    let server_state = Arc::new(ServerState::default());
    let server_handle = {
        let state = Arc::clone(&server_state);
        let port = config.metrics_port;
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state, shutdown).await {
                error!("HTTP server error: {}", e);
            }
        })
    };

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let limiter = Arc::new(TokenBucket::new(
        config.max_reconcile_rate,
        config.max_reconcile_rate,
    ));

    Ok(InitializationResult {
        context: SetupContext {
            client,
            config,
            limiter,
            shutdown,
        },
        server_state,
        server_handle,
    })
}
