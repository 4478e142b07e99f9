//! # External Connector
//!
//! Produces an [`ExternalClient`] bound to the ProviderConfig a managed
//! resource references.
//!
//! Steps run in a fixed order and each failure maps to its own error:
//!
//! 1. Check the record kind
//! 2. Track ProviderConfig usage
//! 3. Load the ProviderConfig
//! 4. Resolve credentials
//! 5. Construct the client

use crate::controller::reconciler::external::ExternalClient;
use crate::controller::reconciler::store::{ProviderConfigStore, StoreError, UsageTracker};
use crate::controller::reconciler::types::ErrorKind;
use crate::credentials::{extract_api_key, CredentialError, CredentialResolver};
use crate::managed::Managed;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, Instrument};
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("managed resource is not a {expected} (got {actual})")]
    NotManagedRecord {
        expected: &'static str,
        actual: String,
    },
    #[error("cannot track ProviderConfig usage: {0}")]
    TrackFailed(#[source] StoreError),
    #[error("cannot get ProviderConfig {name}")]
    ProviderConfigNotFound {
        name: String,
        #[source]
        source: Option<StoreError>,
    },
    #[error("cannot get credentials: {0}")]
    CredentialUnavailable(#[from] CredentialError),
    #[error("cannot create new client: {0}")]
    ClientConstructionFailed(#[source] anyhow::Error),
}

impl ConnectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotManagedRecord { .. } => ErrorKind::ContractViolation,
            Self::TrackFailed(_) => ErrorKind::TransientTransportError,
            Self::ProviderConfigNotFound { .. }
            | Self::CredentialUnavailable(_)
            | Self::ClientConstructionFailed(_) => ErrorKind::ConfigurationError,
        }
    }
}

/// Inputs for constructing an external client
#[derive(Clone)]
pub struct ClientParams {
    /// Base URL of the external API
    pub api_base: String,
    pub api_key: Zeroizing<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for ClientParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientParams")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Builds an external client from resolved parameters
pub type ClientConstructor =
    Arc<dyn Fn(ClientParams) -> Result<Box<dyn ExternalClient>, anyhow::Error> + Send + Sync>;

/// Connects a managed resource to its external system
#[async_trait]
pub trait ExternalConnector: Send + Sync {
    async fn connect(&self, mr: &dyn Managed) -> Result<Box<dyn ExternalClient>, ConnectError>;
}

/// Connector resolving ProviderConfig and credentials for one managed kind
#[derive(Clone)]
pub struct ProviderConnector {
    kind: &'static str,
    usage: Arc<dyn UsageTracker>,
    configs: Arc<dyn ProviderConfigStore>,
    credentials: CredentialResolver,
    new_client: ClientConstructor,
    request_timeout: Duration,
}

impl std::fmt::Debug for ProviderConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConnector")
            .field("kind", &self.kind)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl ProviderConnector {
    pub fn new(
        kind: &'static str,
        usage: Arc<dyn UsageTracker>,
        configs: Arc<dyn ProviderConfigStore>,
        credentials: CredentialResolver,
        new_client: ClientConstructor,
        request_timeout: Duration,
    ) -> Self {
        Self {
            kind,
            usage,
            configs,
            credentials,
            new_client,
            request_timeout,
        }
    }
}

#[async_trait]
impl ExternalConnector for ProviderConnector {
    async fn connect(&self, mr: &dyn Managed) -> Result<Box<dyn ExternalClient>, ConnectError> {
        let span = tracing::debug_span!(
            "connect",
            resource.kind = mr.kind(),
            resource.name = mr.name(),
            provider_config = mr.provider_config_name()
        );

        async move {
            if mr.kind() != self.kind {
                return Err(ConnectError::NotManagedRecord {
                    expected: self.kind,
                    actual: mr.kind().to_string(),
                });
            }

            self.usage
                .track(mr)
                .await
                .map_err(ConnectError::TrackFailed)?;

            let name = mr.provider_config_name();
            let config = match self.configs.get(name).await {
                Ok(Some(config)) => config,
                Ok(None) => {
                    return Err(ConnectError::ProviderConfigNotFound {
                        name: name.to_string(),
                        source: None,
                    })
                }
                Err(e) => {
                    return Err(ConnectError::ProviderConfigNotFound {
                        name: name.to_string(),
                        source: Some(e),
                    })
                }
            };

            let bytes = self.credentials.resolve(&config.spec.credentials).await?;
            let api_key = extract_api_key(&bytes)?;
            debug!(api_base = %config.spec.api_base, "Resolved ProviderConfig");

            let client = (self.new_client)(ClientParams {
                api_base: config.spec.api_base.clone(),
                api_key,
                timeout: self.request_timeout,
            })
            .map_err(ConnectError::ClientConstructionFailed)?;

            Ok(client)
        }
        .instrument(span)
        .await
    }
}
