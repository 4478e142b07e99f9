//! # ProviderConfig
//!
//! Connection settings for a LiteLLM proxy, and the usage objects that pin a
//! ProviderConfig while managed resources still reference it.
//!
//! ```yaml
//! apiVersion: litellm.crossplane.io/v1alpha1
//! kind: ProviderConfig
//! metadata:
//!   name: default
//! spec:
//!   apiBase: http://litellm.litellm.svc:4000
//!   credentials:
//!     source: Secret
//!     secretRef:
//!       namespace: crossplane-system
//!       name: litellm-master-key
//!       key: credentials
//! ```

use crate::crd::{Condition, ProviderConfigReference, TypedReference};
use serde::{Deserialize, Serialize};

#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ProviderConfig",
    group = "litellm.crossplane.io",
    version = "v1alpha1",
    status = "ProviderConfigStatus",
    category = "crossplane",
    category = "provider",
    category = "litellm",
    printcolumn = r#"{"name":"API Base", "type":"string", "jsonPath":".spec.apiBase"}, {"name":"Users", "type":"integer", "jsonPath":".status.users"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    /// Base URL of the LiteLLM proxy, e.g. `http://litellm:4000`
    pub api_base: String,
    /// Where the proxy master key comes from
    pub credentials: ProviderCredentials,
}

/// Credential descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    pub source: CredentialsSource,
    /// Literal value, used when `source: Inline`
    #[serde(default)]
    pub inline: Option<String>,
    #[serde(default)]
    pub secret_ref: Option<SecretKeySelector>,
    #[serde(default)]
    pub env: Option<EnvSelector>,
    #[serde(default)]
    pub fs: Option<FsSelector>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum CredentialsSource {
    #[default]
    None,
    Inline,
    Secret,
    Environment,
    Filesystem,
}

impl std::fmt::Display for CredentialsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Inline => "Inline",
            Self::Secret => "Secret",
            Self::Environment => "Environment",
            Self::Filesystem => "Filesystem",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    pub namespace: String,
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvSelector {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FsSelector {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigStatus {
    /// Number of managed resources currently using this ProviderConfig
    #[serde(default)]
    pub users: Option<i64>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Records that one managed resource uses a ProviderConfig
///
/// Named `<kind-lowercase>-<resource-name>` and owned by the managed resource,
/// so it disappears together with it.
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ProviderConfigUsage",
    group = "litellm.crossplane.io",
    version = "v1alpha1",
    category = "crossplane",
    category = "provider",
    category = "litellm",
    printcolumn = r#"{"name":"Config", "type":"string", "jsonPath":".spec.providerConfigRef.name"}, {"name":"Resource", "type":"string", "jsonPath":".spec.resourceRef.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigUsageSpec {
    pub provider_config_ref: ProviderConfigReference,
    pub resource_ref: TypedReference,
}
