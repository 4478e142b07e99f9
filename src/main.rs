//! # LiteLLM Provider
//!
//! Kubernetes controller reconciling LiteLLM proxy `Key` and `Team` managed
//! resources, plus the ProviderConfig lifecycle controller.
//!
//! Configuration comes from the environment (see [`ControllerConfig`]); the
//! flags below override it.

use anyhow::{Context, Result};
use clap::Parser;
use provider_litellm::config::{parse_duration, ControllerConfig};
use provider_litellm::controller::provider_config;
use provider_litellm::provider::{key, team};
use provider_litellm::runtime::initialization::initialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// LiteLLM provider
#[derive(Debug, Parser)]
#[command(name = "provider-litellm", version, about, long_about = None)]
struct Cli {
    /// Run with debug logging
    #[arg(short, long)]
    debug: bool,

    /// How often converged resources are checked for drift, e.g. `30s`, `1m`
    #[arg(long, value_name = "DURATION")]
    poll: Option<String>,

    /// Global reconciles per second across all kinds
    #[arg(long, value_name = "RATE")]
    max_reconcile_rate: Option<u32>,
}

impl Cli {
    fn apply(&self, mut config: ControllerConfig) -> Result<ControllerConfig> {
        if let Some(poll) = &self.poll {
            config.poll_interval =
                parse_duration(poll).with_context(|| format!("Invalid --poll value: {poll}"))?;
        }
        if let Some(rate) = self.max_reconcile_rate {
            config.max_reconcile_rate = rate.max(1);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.apply(ControllerConfig::from_env())?;

    let shutdown = CancellationToken::new();
    let init = initialize(config, cli.debug, shutdown.clone()).await?;
    let ctx = init.context;

    let mut handles = Vec::new();
    handles.extend(key::setup(&ctx));
    handles.extend(team::setup(&ctx));
    handles.extend(provider_config::setup(&ctx));
    init.server_state.mark_ready();
    info!("Controllers running");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal, waiting for in-flight reconciliations to complete...");
    init.server_state
        .is_ready
        .store(false, std::sync::atomic::Ordering::Relaxed);
    shutdown.cancel();

    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            error!("Controller task failed: {}", e);
        }
    }
    if let Err(e) = init.server_handle.await {
        error!("HTTP server task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}
