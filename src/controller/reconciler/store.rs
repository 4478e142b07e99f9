//! # Stores
//!
//! Storage collaborators of the reconciler and connector, with their
//! Kubernetes implementations.
//!
//! Writes to managed records are JSON merge patches carrying
//! `metadata.resourceVersion`, so the API server rejects them with 409 when
//! the record changed since it was read.

use crate::constants::{API_GROUP, API_VERSION, FIELD_MANAGER, PROVIDER_CONFIG_LABEL};
use crate::controller::reconciler::types::ErrorKind;
use crate::crd::{ProviderConfig, ProviderConfigUsage, ProviderConfigUsageSpec, ProviderConfigReference, TypedReference};
use crate::managed::{Managed, ManagedResource};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict writing {name}: {message}")]
    Conflict { name: String, message: String },
    #[error("Kubernetes API request failed: {0}")]
    Kube(#[source] kube::Error),
    #[error("cannot serialize object: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict { .. } => ErrorKind::ConflictError,
            Self::Kube(_) | Self::Serialization(_) | Self::Unavailable(_) => {
                ErrorKind::TransientTransportError
            }
        }
    }

    /// Classify a kube error, mapping HTTP 409 to `Conflict`
    pub fn from_kube(name: &str, error: kube::Error) -> Self {
        match &error {
            kube::Error::Api(api_err) if api_err.code == 409 => Self::Conflict {
                name: name.to_string(),
                message: api_err.message.clone(),
            },
            _ => Self::Kube(error),
        }
    }
}

/// Read and write access to records of one managed kind
#[async_trait]
pub trait RecordStore<M>: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<M>, StoreError>;

    /// Write metadata (finalizers); fails with `Conflict` if the record changed
    async fn update(&self, record: &M) -> Result<M, StoreError>;

    /// Write status; fails with `Conflict` if the record changed
    async fn update_status(&self, record: &M) -> Result<M, StoreError>;

    /// Write status without a resourceVersion precondition
    async fn force_update_status(&self, record: &M) -> Result<M, StoreError>;
}

/// Read access to ProviderConfigs
#[async_trait]
pub trait ProviderConfigStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<ProviderConfig>, StoreError>;
}

/// Records which managed resources use which ProviderConfig
#[async_trait]
pub trait UsageTracker: Send + Sync {
    async fn track(&self, mr: &dyn Managed) -> Result<(), StoreError>;
}

fn patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

/// Extract the `status` stanza of a serialized record
pub(crate) fn status_value<M: serde::Serialize>(record: &M) -> Result<serde_json::Value, StoreError> {
    let value = serde_json::to_value(record)?;
    Ok(value.get("status").cloned().unwrap_or(serde_json::Value::Null))
}

/// `RecordStore` backed by the Kubernetes API
pub struct KubeRecordStore<M: ManagedResource> {
    api: Api<M>,
}

impl<M: ManagedResource> std::fmt::Debug for KubeRecordStore<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeRecordStore").finish_non_exhaustive()
    }
}

impl<M: ManagedResource> KubeRecordStore<M> {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl<M: ManagedResource> RecordStore<M> for KubeRecordStore<M> {
    async fn get(&self, name: &str) -> Result<Option<M>, StoreError> {
        self.api
            .get_opt(name)
            .await
            .map_err(|e| StoreError::from_kube(name, e))
    }

    async fn update(&self, record: &M) -> Result<M, StoreError> {
        let name = Managed::name(record);
        let patch = json!({
            "metadata": {
                "resourceVersion": Managed::meta(record).resource_version,
                "finalizers": Managed::meta(record).finalizers,
            }
        });
        debug!(resource.kind = Managed::kind(record), resource.name = name, "Patching finalizers");
        self.api
            .patch(name, &patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(name, e))
    }

    async fn update_status(&self, record: &M) -> Result<M, StoreError> {
        let name = Managed::name(record);
        let patch = json!({
            "metadata": { "resourceVersion": Managed::meta(record).resource_version },
            "status": status_value(record)?,
        });
        self.api
            .patch_status(name, &patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(name, e))
    }

    async fn force_update_status(&self, record: &M) -> Result<M, StoreError> {
        let name = Managed::name(record);
        let patch = json!({ "status": status_value(record)? });
        self.api
            .patch_status(name, &patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(name, e))
    }
}

/// `ProviderConfigStore` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeProviderConfigStore {
    api: Api<ProviderConfig>,
}

impl std::fmt::Debug for KubeProviderConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeProviderConfigStore").finish_non_exhaustive()
    }
}

impl KubeProviderConfigStore {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl ProviderConfigStore for KubeProviderConfigStore {
    async fn get(&self, name: &str) -> Result<Option<ProviderConfig>, StoreError> {
        self.api
            .get_opt(name)
            .await
            .map_err(|e| StoreError::from_kube(name, e))
    }
}

/// Name of the usage object for a managed resource
pub fn usage_name(mr: &dyn Managed) -> String {
    format!("{}-{}", mr.kind().to_lowercase(), mr.name())
}

/// Build the ProviderConfigUsage recording that `mr` uses its ProviderConfig
pub fn build_usage(mr: &dyn Managed) -> ProviderConfigUsage {
    let api_version = format!("{API_GROUP}/{API_VERSION}");
    let mut usage = ProviderConfigUsage::new(
        &usage_name(mr),
        ProviderConfigUsageSpec {
            provider_config_ref: ProviderConfigReference {
                name: mr.provider_config_name().to_string(),
            },
            resource_ref: TypedReference {
                api_version: api_version.clone(),
                kind: mr.kind().to_string(),
                name: mr.name().to_string(),
            },
        },
    );
    usage.metadata.labels = Some(BTreeMap::from([(
        PROVIDER_CONFIG_LABEL.to_string(),
        mr.provider_config_name().to_string(),
    )]));
    if let Some(uid) = mr.meta().uid.clone() {
        usage.metadata.owner_references = Some(vec![OwnerReference {
            api_version,
            kind: mr.kind().to_string(),
            name: mr.name().to_string(),
            uid,
            controller: Some(true),
            block_owner_deletion: Some(true),
        }]);
    }
    usage
}

/// `UsageTracker` that server-side applies a ProviderConfigUsage per record
#[derive(Clone)]
pub struct KubeUsageTracker {
    api: Api<ProviderConfigUsage>,
}

impl std::fmt::Debug for KubeUsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeUsageTracker").finish_non_exhaustive()
    }
}

impl KubeUsageTracker {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl UsageTracker for KubeUsageTracker {
    async fn track(&self, mr: &dyn Managed) -> Result<(), StoreError> {
        let usage = build_usage(mr);
        let name = usage_name(mr);
        self.api
            .patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&usage),
            )
            .await
            .map_err(|e| StoreError::from_kube(&name, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Key, KeySpec, Team, TeamSpec};

    #[test]
    fn test_usage_name_uses_lowercase_kind() {
        let key = Key::new("svc-a", KeySpec::default());
        let team = Team::new("platform", TeamSpec::default());
        assert_eq!(usage_name(&key), "key-svc-a");
        assert_eq!(usage_name(&team), "team-platform");
    }

    #[test]
    fn test_build_usage_labels_and_owner() {
        let mut key = Key::new("svc-a", KeySpec::default());
        key.spec.provider_config_ref = Some(ProviderConfigReference {
            name: "staging".to_string(),
        });
        key.metadata.uid = Some("uid-1".to_string());

        let usage = build_usage(&key);
        assert_eq!(
            usage
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get(PROVIDER_CONFIG_LABEL))
                .map(String::as_str),
            Some("staging")
        );
        assert_eq!(usage.spec.resource_ref.kind, "Key");
        assert_eq!(usage.spec.resource_ref.api_version, "litellm.crossplane.io/v1alpha1");
        let owners = usage.metadata.owner_references.unwrap_or_default();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].uid, "uid-1");
    }

    #[test]
    fn test_status_value_extracts_status() {
        let mut key = Key::new("svc-a", KeySpec::default());
        assert_eq!(status_value(&key).unwrap(), serde_json::Value::Null);

        key.set_at_provider(crate::crd::KeyObservation {
            key: Some("sk-1".to_string()),
            ..Default::default()
        });
        let status = status_value(&key).unwrap();
        assert_eq!(status["atProvider"]["key"], "sk-1");
        assert!(status["atProvider"]["expires"].is_null());
    }

    #[test]
    fn test_conflict_kind() {
        let err = StoreError::Conflict {
            name: "svc-a".to_string(),
            message: "the object has been modified".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::ConflictError);
        assert_eq!(
            StoreError::Unavailable("down".to_string()).kind(),
            ErrorKind::TransientTransportError
        );
    }
}
