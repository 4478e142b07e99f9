//! # Provider Modules
//!
//! LiteLLM adapters for each managed kind and the wiring that turns one into
//! a running controller.
//!
//! - `litellm`: REST transport and wire types
//! - `key`: `Key` external client
//! - `team`: `Team` external client
//! - `diff`: desired/observed field comparison

pub mod diff;
pub mod key;
pub mod litellm;
pub mod team;

use crate::controller::publisher::KubeConnectionPublisher;
use crate::controller::reconciler::{
    ClientConstructor, KubeProviderConfigStore, KubeRecordStore, KubeUsageTracker,
    ProviderConnector, Reconciler,
};
use crate::credentials::{CredentialResolver, KubeSecretStore};
use crate::managed::ManagedResource;
use crate::runtime::controller::watch_desired_state;
use crate::runtime::{Controller, SetupContext};
use kube::api::Api;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Wire a managed kind: Kubernetes stores, connector, reconciler, workers and watch
pub(crate) fn setup_managed<M: ManagedResource>(
    ctx: &SetupContext,
    kind: &'static str,
    new_client: ClientConstructor,
) -> Vec<JoinHandle<()>> {
    let client = &ctx.client;
    let connector = ProviderConnector::new(
        kind,
        Arc::new(KubeUsageTracker::new(client.clone())),
        Arc::new(KubeProviderConfigStore::new(client.clone())),
        CredentialResolver::new(Arc::new(KubeSecretStore::new(client.clone()))),
        new_client,
        ctx.config.external_request_timeout(),
    );
    let reconciler = Arc::new(Reconciler::<M>::new(
        kind,
        Arc::new(KubeRecordStore::<M>::new(client.clone())),
        Arc::new(connector),
        Arc::new(KubeConnectionPublisher::new(client.clone())),
        ctx.config.poll_interval,
    ));

    let controller = Controller::new(reconciler, Arc::clone(&ctx.limiter), &ctx.config);
    let records: Api<M> = Api::all(client.clone());

    vec![
        tokio::spawn(
            watch_desired_state(records, controller.queue(), ctx.shutdown.clone())
                .instrument(tracing::info_span!("watch", resource.kind = kind)),
        ),
        tokio::spawn(controller.run(ctx.shutdown.clone())),
    ]
}
