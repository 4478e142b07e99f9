//! # Key
//!
//! Managed resource for a LiteLLM virtual key.
//!
//! ```yaml
//! apiVersion: litellm.crossplane.io/v1alpha1
//! kind: Key
//! metadata:
//!   name: svc-a
//! spec:
//!   forProvider:
//!     key_alias: svc-a
//!     duration: 24h
//!     models: ["gpt-4o"]
//!   providerConfigRef:
//!     name: default
//!   writeConnectionSecretToRef:
//!     name: svc-a-litellm
//!     namespace: apps
//! ```

use crate::crd::{Condition, DeletionPolicy, ProviderConfigReference, SecretReference};
use crate::managed::Managed;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;

#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Key",
    group = "litellm.crossplane.io",
    version = "v1alpha1",
    status = "KeyStatus",
    category = "crossplane",
    category = "managed",
    category = "litellm",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}, {"name":"Alias", "type":"string", "jsonPath":".spec.forProvider.key_alias"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KeySpec {
    /// Desired state of the key on the LiteLLM proxy
    #[serde(default)]
    pub for_provider: KeyParameters,
    /// ProviderConfig used to reach the proxy (defaults to `default`)
    #[serde(default)]
    pub provider_config_ref: Option<ProviderConfigReference>,
    /// Secret that receives the generated key
    #[serde(default)]
    pub write_connection_secret_to_ref: Option<SecretReference>,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// Desired key parameters, using the proxy's own field names
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct KeyParameters {
    /// Lifetime of the key (e.g. `24h`); only used at creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_alias: Option<String>,
    /// Caller-chosen key value; the proxy generates one when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_duration: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Observed key state, overwritten after every successful proxy call
///
/// Fields are serialized even when empty so a merge patch clears stale values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct KeyObservation {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    #[serde(default)]
    pub at_provider: Option<KeyObservation>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Key {
    /// Identifier of the key on the proxy, if one is known
    pub fn external_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.at_provider.as_ref())
            .and_then(|o| o.key.as_deref())
            .or(self.spec.for_provider.key.as_deref())
            .filter(|k| !k.is_empty())
    }

    /// Replace the observed state wholesale
    pub fn set_at_provider(&mut self, observation: KeyObservation) {
        self.status.get_or_insert_with(KeyStatus::default).at_provider = Some(observation);
    }
}

impl Managed for Key {
    fn kind(&self) -> &'static str {
        "Key"
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn provider_config_ref(&self) -> Option<&ProviderConfigReference> {
        self.spec.provider_config_ref.as_ref()
    }

    fn write_connection_secret_to_ref(&self) -> Option<&SecretReference> {
        self.spec.write_connection_secret_to_ref.as_ref()
    }

    fn deletion_policy(&self) -> DeletionPolicy {
        self.spec.deletion_policy
    }

    fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map_or(&[], |s| s.conditions.as_slice())
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status.get_or_insert_with(KeyStatus::default).conditions
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
