//! # Connection Publisher
//!
//! Writes connection details to the Secret named by a managed resource's
//! `writeConnectionSecretToRef`.
//!
//! Resources without the reference are skipped. Secrets are Opaque, owned by
//! the managed resource and only rewritten when their content changes.

use crate::constants::{API_GROUP, API_VERSION, FIELD_MANAGER};
use crate::controller::reconciler::external::ConnectionDetails;
use crate::controller::reconciler::store::StoreError;
use crate::managed::Managed;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::{debug, info};

#[async_trait]
pub trait ConnectionPublisher: Send + Sync {
    /// Persist connection details for `mr`
    async fn publish(
        &self,
        mr: &dyn Managed,
        details: &ConnectionDetails,
    ) -> Result<(), StoreError>;

    /// Remove previously published connection details
    async fn unpublish(&self, mr: &dyn Managed) -> Result<(), StoreError>;
}

/// Build the connection Secret for `mr`, or `None` if it has no reference
pub fn connection_secret(mr: &dyn Managed, details: &ConnectionDetails) -> Option<Secret> {
    let target = mr.write_connection_secret_to_ref()?;
    let owner_references = mr.meta().uid.clone().map(|uid| {
        vec![OwnerReference {
            api_version: format!("{API_GROUP}/{API_VERSION}"),
            kind: mr.kind().to_string(),
            name: mr.name().to_string(),
            uid,
            controller: Some(true),
            block_owner_deletion: None,
        }]
    });

    Some(Secret {
        metadata: ObjectMeta {
            name: Some(target.name.clone()),
            namespace: Some(target.namespace.clone()),
            owner_references,
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(
            details
                .iter()
                .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    })
}

/// Publisher writing Kubernetes Secrets
#[derive(Clone)]
pub struct KubeConnectionPublisher {
    client: Client,
}

impl std::fmt::Debug for KubeConnectionPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeConnectionPublisher").finish_non_exhaustive()
    }
}

impl KubeConnectionPublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConnectionPublisher for KubeConnectionPublisher {
    async fn publish(
        &self,
        mr: &dyn Managed,
        details: &ConnectionDetails,
    ) -> Result<(), StoreError> {
        let Some(secret) = connection_secret(mr, details) else {
            return Ok(());
        };
        let name = secret.metadata.name.clone().unwrap_or_default();
        let namespace = secret.metadata.namespace.clone().unwrap_or_default();
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);

        let existing = secrets
            .get_opt(&name)
            .await
            .map_err(|e| StoreError::from_kube(&name, e))?;
        if existing.is_some_and(|s| s.data == secret.data) {
            debug!(secret = %format!("{namespace}/{name}"), "Connection secret unchanged");
            return Ok(());
        }

        secrets
            .patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&secret),
            )
            .await
            .map_err(|e| StoreError::from_kube(&name, e))?;
        info!(
            resource.kind = mr.kind(),
            resource.name = mr.name(),
            "Published connection details to {}/{}",
            namespace,
            name
        );
        Ok(())
    }

    async fn unpublish(&self, mr: &dyn Managed) -> Result<(), StoreError> {
        let Some(target) = mr.write_connection_secret_to_ref() else {
            return Ok(());
        };
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &target.namespace);
        match secrets.delete(&target.name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(
                    resource.kind = mr.kind(),
                    resource.name = mr.name(),
                    "Deleted connection secret {}/{}",
                    target.namespace,
                    target.name
                );
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(StoreError::from_kube(&target.name, e)),
        }
    }
}
