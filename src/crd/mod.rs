//! # Custom Resource Definitions
//!
//! CRD types served by the provider, all cluster-scoped under
//! `litellm.crossplane.io/v1alpha1`.
//!
//! ## Module Structure
//!
//! - `common.rs` - Spec and status fragments shared by managed resources
//! - `key.rs` - LiteLLM virtual keys
//! - `team.rs` - LiteLLM teams
//! - `provider_config.rs` - Proxy connection settings and usage tracking

mod common;
mod key;
mod provider_config;
mod team;

pub use common::{
    Condition, DeletionPolicy, ProviderConfigReference, SecretReference, TypedReference,
};
pub use key::{Key, KeyObservation, KeyParameters, KeySpec, KeyStatus};
pub use provider_config::{
    CredentialsSource, EnvSelector, FsSelector, ProviderConfig, ProviderConfigSpec,
    ProviderConfigStatus, ProviderConfigUsage, ProviderConfigUsageSpec, ProviderCredentials,
    SecretKeySelector,
};
pub use team::{Team, TeamObservation, TeamParameters, TeamSpec, TeamStatus};
