//! # Credentials
//!
//! Resolves the credential bytes a ProviderConfig points at.
//!
//! Resolution is deterministic for a given descriptor and never cached, so a
//! rotated Secret or environment value is picked up on the next reconcile.
//! Bytes are wrapped in `Zeroizing` and wiped when dropped.
//!
//! ## Sources
//!
//! - `None` - empty credential, for proxies without authentication
//! - `Inline` - literal value in the ProviderConfig
//! - `Secret` - key of a Kubernetes Secret, through a [`SecretStore`]
//! - `Environment` - environment variable of the controller process
//! - `Filesystem` - file mounted into the controller pod

mod kubernetes;

pub use kubernetes::KubeSecretStore;

use crate::crd::{CredentialsSource, ProviderCredentials};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credentials source {source_kind} requires a selector")]
    MissingSelector { source_kind: CredentialsSource },
    #[error("secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },
    #[error("key {key} not found in secret {namespace}/{name}")]
    KeyNotFound {
        namespace: String,
        name: String,
        key: String,
    },
    #[error("environment variable {name} is not set")]
    EnvNotSet { name: String },
    #[error("cannot read credentials file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read secret store: {0}")]
    Store(String),
    #[error("invalid API key: {0}")]
    InvalidApiKey(String),
}

/// Read access to Kubernetes Secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Bytes stored under `key` in Secret `namespace/name`
    async fn get(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Zeroizing<Vec<u8>>, CredentialError>;
}

/// Environment variable lookup, injectable for tests
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves credential descriptors into bytes
#[derive(Clone)]
pub struct CredentialResolver {
    secrets: Arc<dyn SecretStore>,
    env: EnvLookup,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver").finish_non_exhaustive()
    }
}

impl CredentialResolver {
    /// Resolver reading Secrets from `secrets` and variables from the process environment
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            secrets,
            env: Arc::new(|name: &str| std::env::var(name).ok()),
        }
    }

    #[must_use]
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    pub async fn resolve(
        &self,
        credentials: &ProviderCredentials,
    ) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
        let source_kind = credentials.source;
        let missing = || CredentialError::MissingSelector { source_kind };
        debug!(credentials.source = %source_kind, "Resolving credentials");

        match source_kind {
            CredentialsSource::None => Ok(Zeroizing::new(Vec::new())),
            CredentialsSource::Inline => {
                let value = credentials.inline.as_ref().ok_or_else(missing)?;
                Ok(Zeroizing::new(value.as_bytes().to_vec()))
            }
            CredentialsSource::Secret => {
                let selector = credentials.secret_ref.as_ref().ok_or_else(missing)?;
                self.secrets
                    .get(&selector.namespace, &selector.name, &selector.key)
                    .await
            }
            CredentialsSource::Environment => {
                let selector = credentials.env.as_ref().ok_or_else(missing)?;
                let value = (self.env)(&selector.name).ok_or_else(|| CredentialError::EnvNotSet {
                    name: selector.name.clone(),
                })?;
                Ok(Zeroizing::new(value.into_bytes()))
            }
            CredentialsSource::Filesystem => {
                let selector = credentials.fs.as_ref().ok_or_else(missing)?;
                let bytes = tokio::fs::read(&selector.path).await.map_err(|source| {
                    CredentialError::Unreadable {
                        path: selector.path.clone(),
                        source,
                    }
                })?;
                Ok(Zeroizing::new(bytes))
            }
        }
    }
}

/// Extract the proxy API key from credential bytes
///
/// A JSON object yields its `api_key` field; anything else is taken as UTF-8
/// text with surrounding whitespace trimmed.
pub fn extract_api_key(bytes: &[u8]) -> Result<Zeroizing<String>, CredentialError> {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_slice::<serde_json::Value>(bytes)
    {
        return match map.get("api_key") {
            Some(serde_json::Value::String(key)) => Ok(Zeroizing::new(key.trim().to_string())),
            _ => Err(CredentialError::InvalidApiKey(
                "JSON credentials have no string api_key field".to_string(),
            )),
        };
    }

    let text = std::str::from_utf8(bytes).map_err(|_utf8| {
        CredentialError::InvalidApiKey("credentials are not valid UTF-8".to_string())
    })?;
    Ok(Zeroizing::new(text.trim().to_string()))
}
