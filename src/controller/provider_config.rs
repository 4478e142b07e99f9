//! # ProviderConfig Lifecycle
//!
//! Keeps `status.users` of every ProviderConfig equal to the number of
//! ProviderConfigUsage objects labelled with its name, and holds the
//! `in-use.crossplane.io` finalizer until that number drops to zero.
//!
//! Usages are created by the connector and garbage collected with their
//! managed resource, so deleting a ProviderConfig waits for every Key and
//! Team that references it.

use crate::constants::{PROVIDER_CONFIG_FINALIZER, PROVIDER_CONFIG_LABEL};
use crate::controller::reconciler::{Action, ReconcilerError, StoreError};
use crate::crd::{ProviderConfig, ProviderConfigUsage};
use crate::runtime::controller::{watch_desired_state, watch_mapped};
use crate::runtime::{Controller, Reconcile, SetupContext};
use async_trait::async_trait;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

pub const KIND: &str = "ProviderConfig";

/// What the lifecycle controller does with a ProviderConfig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStep {
    /// Live and missing the finalizer
    AddFinalizer,
    /// Live with the finalizer; only `status.users` may need updating
    Track,
    /// Deleting but still referenced
    Blocked,
    /// Deleting and unreferenced; drop the finalizer
    Release,
    /// Deleting without our finalizer
    Done,
}

pub fn plan(deleting: bool, has_finalizer: bool, users: i64) -> LifecycleStep {
    match (deleting, has_finalizer) {
        (false, false) => LifecycleStep::AddFinalizer,
        (false, true) => LifecycleStep::Track,
        (true, false) => LifecycleStep::Done,
        (true, true) if users > 0 => LifecycleStep::Blocked,
        (true, true) => LifecycleStep::Release,
    }
}

pub struct ProviderConfigReconciler {
    configs: Api<ProviderConfig>,
    usages: Api<ProviderConfigUsage>,
    poll_interval: Duration,
}

impl std::fmt::Debug for ProviderConfigReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfigReconciler")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl ProviderConfigReconciler {
    pub fn new(client: Client, poll_interval: Duration) -> Self {
        Self {
            configs: Api::all(client.clone()),
            usages: Api::all(client),
            poll_interval,
        }
    }

    async fn count_users(&self, name: &str) -> Result<i64, StoreError> {
        let params = ListParams::default().labels(&format!("{PROVIDER_CONFIG_LABEL}={name}"));
        let list = self
            .usages
            .list(&params)
            .await
            .map_err(|e| StoreError::from_kube(name, e))?;
        Ok(i64::try_from(list.items.len()).unwrap_or(i64::MAX))
    }

    async fn patch_finalizers(
        &self,
        pc: &ProviderConfig,
        finalizers: Vec<String>,
    ) -> Result<(), StoreError> {
        let name = pc.name_any();
        let patch = json!({
            "metadata": {
                "resourceVersion": pc.resource_version(),
                "finalizers": finalizers,
            }
        });
        self.configs
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(&name, e))?;
        Ok(())
    }

    async fn write_users(&self, pc: &ProviderConfig, users: i64) -> Result<(), StoreError> {
        let current = pc.status.as_ref().and_then(|s| s.users);
        if current == Some(users) {
            return Ok(());
        }
        let name = pc.name_any();
        debug!(resource.kind = KIND, resource.name = %name, "users {:?} -> {}", current, users);
        let patch = json!({ "status": { "users": users } });
        self.configs
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(&name, e))?;
        Ok(())
    }

    async fn reconcile_config(&self, name: &str) -> Result<Action, ReconcilerError> {
        let Some(pc) = self
            .configs
            .get_opt(name)
            .await
            .map_err(|e| StoreError::from_kube(name, e))?
        else {
            return Ok(Action::Forget);
        };

        let users = self.count_users(name).await?;
        let has_finalizer = pc.finalizers().iter().any(|f| f == PROVIDER_CONFIG_FINALIZER);
        let deleting = pc.meta().deletion_timestamp.is_some();

        match plan(deleting, has_finalizer, users) {
            LifecycleStep::AddFinalizer => {
                let mut finalizers = pc.finalizers().to_vec();
                finalizers.push(PROVIDER_CONFIG_FINALIZER.to_string());
                self.patch_finalizers(&pc, finalizers).await?;
                // The patch bumped resourceVersion; count again on the next pass
                Ok(Action::Immediately)
            }
            LifecycleStep::Track => {
                self.write_users(&pc, users).await?;
                Ok(Action::RequeueAfter(self.poll_interval))
            }
            LifecycleStep::Blocked => {
                warn!(
                    resource.kind = KIND,
                    resource.name = name,
                    "Deletion blocked: in use by {} resources",
                    users
                );
                self.write_users(&pc, users).await?;
                Ok(Action::RequeueAfter(self.poll_interval))
            }
            LifecycleStep::Release => {
                let finalizers = pc
                    .finalizers()
                    .iter()
                    .filter(|f| *f != PROVIDER_CONFIG_FINALIZER)
                    .cloned()
                    .collect();
                self.patch_finalizers(&pc, finalizers).await?;
                info!(resource.kind = KIND, resource.name = name, "No users left, released");
                Ok(Action::Forget)
            }
            LifecycleStep::Done => Ok(Action::Forget),
        }
    }
}

#[async_trait]
impl Reconcile for ProviderConfigReconciler {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn reconcile(
        &self,
        name: &str,
        _cancel: CancellationToken,
    ) -> Result<Action, ReconcilerError> {
        self.reconcile_config(name)
            .instrument(tracing::info_span!(
                "reconcile",
                resource.kind = KIND,
                resource.name = name
            ))
            .await
    }
}

fn usage_config_name(usage: &ProviderConfigUsage) -> Option<String> {
    let name = usage
        .labels()
        .get(PROVIDER_CONFIG_LABEL)
        .cloned()
        .unwrap_or_else(|| usage.spec.provider_config_ref.name.clone());
    (!name.is_empty()).then_some(name)
}

/// Register the ProviderConfig lifecycle controller
pub fn setup(ctx: &SetupContext) -> Vec<JoinHandle<()>> {
    let reconciler = Arc::new(ProviderConfigReconciler::new(
        ctx.client.clone(),
        ctx.config.poll_interval,
    ));
    let controller = Controller::new(reconciler, Arc::clone(&ctx.limiter), &ctx.config);
    let queue = controller.queue();

    let configs: Api<ProviderConfig> = Api::all(ctx.client.clone());
    let usages: Api<ProviderConfigUsage> = Api::all(ctx.client.clone());

    vec![
        tokio::spawn(
            watch_desired_state(configs, Arc::clone(&queue), ctx.shutdown.clone())
                .instrument(tracing::info_span!("watch", resource.kind = KIND)),
        ),
        tokio::spawn(
            watch_mapped(usages, queue, ctx.shutdown.clone(), usage_config_name)
                .instrument(tracing::info_span!("watch", resource.kind = "ProviderConfigUsage")),
        ),
        tokio::spawn(controller.run(ctx.shutdown.clone())),
    ]
}
