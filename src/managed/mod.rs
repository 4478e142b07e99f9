//! # Managed Resources
//!
//! The kind-independent view of a managed resource that the reconciler,
//! connector and publisher work with.
//!
//! `Managed` is object safe so external clients can accept `&mut dyn Managed`
//! and downcast to their concrete kind. `ManagedResource` adds the Kubernetes
//! bounds the generic reconciler and record store need.

pub mod conditions;

use crate::crd::{Condition, DeletionPolicy, ProviderConfigReference, SecretReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ClusterResourceScope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt::Debug;

/// Kind-independent accessors for a managed resource
pub trait Managed: Any + Send + Sync + Debug {
    /// Kind name, e.g. `Key`
    fn kind(&self) -> &'static str;

    fn meta(&self) -> &ObjectMeta;

    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn provider_config_ref(&self) -> Option<&ProviderConfigReference>;

    fn write_connection_secret_to_ref(&self) -> Option<&SecretReference>;

    fn deletion_policy(&self) -> DeletionPolicy;

    fn conditions(&self) -> &[Condition];

    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    /// ProviderConfig name, falling back to `default`
    fn provider_config_name(&self) -> &str {
        self.provider_config_ref()
            .map_or(crate::constants::DEFAULT_PROVIDER_CONFIG_NAME, |r| {
                r.name.as_str()
            })
    }

    fn is_deleting(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    fn has_finalizer(&self, finalizer: &str) -> bool {
        self.meta()
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == finalizer))
    }

    /// Returns true if the finalizer was added
    fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.meta_mut()
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(finalizer.to_string());
        true
    }

    /// Returns true if the finalizer was removed
    fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let Some(finalizers) = self.meta_mut().finalizers.as_mut() else {
            return false;
        };
        let before = finalizers.len();
        finalizers.retain(|f| f != finalizer);
        before != finalizers.len()
    }
}

/// A managed resource kind that the generic reconciler can drive
pub trait ManagedResource:
    Managed
    + kube::Resource<DynamicType = (), Scope = ClusterResourceScope>
    + Clone
    + Serialize
    + DeserializeOwned
    + 'static
{
}

impl<T> ManagedResource for T where
    T: Managed
        + kube::Resource<DynamicType = (), Scope = ClusterResourceScope>
        + Clone
        + Serialize
        + DeserializeOwned
        + 'static
{
}
