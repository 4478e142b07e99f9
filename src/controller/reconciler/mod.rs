//! # Reconciler
//!
//! Core reconciliation logic for managed resources.
//!
//! The reconciler is level triggered: every invocation reads the record,
//! connects to the external system, observes it and issues at most one
//! mutating call to converge.
//!
//! ## Reconciliation Flow
//!
//! 1. Load the record and make sure it carries the finalizer
//! 2. Deleting records are finalized instead
//! 3. Connect (ProviderConfig, credentials, client)
//! 4. Observe the external resource
//! 5. Create, update, or report it available
//! 6. Write status and conditions, publish connection details
//!
//! Scheduling lives in `runtime`; the reconciler only returns an [`Action`].

pub mod connect;
pub mod external;
mod finalize;
mod status;
pub mod store;
pub mod types;

pub use connect::{ClientConstructor, ClientParams, ConnectError, ExternalConnector, ProviderConnector};
pub use external::{ConnectionDetails, ExternalClient, ExternalError, ExternalObservation};
pub use store::{
    KubeProviderConfigStore, KubeRecordStore, KubeUsageTracker, ProviderConfigStore,
    RecordStore, StoreError, UsageTracker,
};
pub use types::{Action, ErrorKind, ReconcilerError};

use crate::constants::MANAGED_FINALIZER;
use crate::controller::publisher::ConnectionPublisher;
use crate::managed::conditions;
use crate::managed::{Managed, ManagedResource};
use crate::observability::metrics;
use crate::runtime::Reconcile;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Per-kind reconciler for managed resources
pub struct Reconciler<M: ManagedResource> {
    kind: &'static str,
    records: Arc<dyn RecordStore<M>>,
    connector: Arc<dyn ExternalConnector>,
    publisher: Arc<dyn ConnectionPublisher>,
    poll_interval: Duration,
}

impl<M: ManagedResource> std::fmt::Debug for Reconciler<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("kind", &self.kind)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl<M: ManagedResource> Reconciler<M> {
    pub fn new(
        kind: &'static str,
        records: Arc<dyn RecordStore<M>>,
        connector: Arc<dyn ExternalConnector>,
        publisher: Arc<dyn ConnectionPublisher>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            kind,
            records,
            connector,
            publisher,
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Reconcile the record named `name` once
    pub async fn reconcile(
        &self,
        name: &str,
        cancel: CancellationToken,
    ) -> Result<Action, ReconcilerError> {
        let span = tracing::info_span!("reconcile", resource.kind = self.kind, resource.name = name);
        self.reconcile_inner(name, &cancel).instrument(span).await
    }

    async fn reconcile_inner(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Action, ReconcilerError> {
        let Some(mut record) = self.records.get(name).await? else {
            debug!("{} {} no longer exists", self.kind, name);
            return Ok(Action::Forget);
        };

        if record.is_deleting() {
            if !record.has_finalizer(MANAGED_FINALIZER) {
                return Ok(Action::Forget);
            }
            return self.finalize(record, cancel).await;
        }

        if record.add_finalizer(MANAGED_FINALIZER) {
            record = self.records.update(&record).await?;
            debug!("Added finalizer {}", MANAGED_FINALIZER);
        }
        ensure_not_cancelled(cancel)?;

        let before = record.clone();

        let client = match self.connect(&record, cancel).await {
            Ok(client) => client,
            Err(ReconcilerError::Cancelled) => return Err(ReconcilerError::Cancelled),
            Err(e) => {
                mark_unavailable(&mut record, &e);
                self.write_status(&before, &record, false).await?;
                return Err(e);
            }
        };

        let observed = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ReconcilerError::Cancelled),
            result = client.observe(&mut record) => result,
        };
        metrics::record_external_operation(self.kind, "observe", observed.is_ok());
        let observation = match observed {
            Ok(observation) => observation,
            Err(e) => {
                let e = ReconcilerError::from(e);
                mark_unsynced(&mut record, &e);
                self.write_status(&before, &record, false).await?;
                return Err(e);
            }
        };

        if !observation.exists {
            ensure_not_cancelled(cancel)?;
            info!("Creating external resource");
            let created = client.create(&mut record).await;
            metrics::record_external_operation(self.kind, "create", created.is_ok());
            return match created {
                Ok(details) => {
                    conditions::set(record.conditions_mut(), conditions::creating());
                    self.publish_and_persist(&before, record, &details).await
                }
                Err(e) => {
                    let e = ReconcilerError::from(e);
                    mark_unsynced(&mut record, &e);
                    self.write_status(&before, &record, false).await?;
                    Err(e)
                }
            };
        }

        if !observation.up_to_date {
            ensure_not_cancelled(cancel)?;
            info!("Updating external resource");
            let updated = client.update(&mut record).await;
            metrics::record_external_operation(self.kind, "update", updated.is_ok());
            return match updated {
                Ok(details) => {
                    let mut merged = observation.connection_details;
                    merged.extend(details);
                    self.publish_and_persist(&before, record, &merged).await
                }
                Err(e) => {
                    let e = ReconcilerError::from(e);
                    mark_unsynced(&mut record, &e);
                    self.write_status(&before, &record, false).await?;
                    Err(e)
                }
            };
        }

        if let Err(e) = self
            .publisher
            .publish(&record, &observation.connection_details)
            .await
        {
            let e = ReconcilerError::Publish(e);
            mark_unsynced(&mut record, &e);
            self.write_status(&before, &record, false).await?;
            return Err(e);
        }
        conditions::set(record.conditions_mut(), conditions::available());
        conditions::set(record.conditions_mut(), conditions::reconcile_success());
        self.write_status(&before, &record, false).await?;
        debug!("External resource is up to date");
        Ok(Action::RequeueAfter(self.poll_interval))
    }

    /// Connect, giving up early if the reconcile is cancelled
    async fn connect(
        &self,
        record: &M,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ExternalClient>, ReconcilerError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ReconcilerError::Cancelled),
            result = self.connector.connect(record) => result.map_err(ReconcilerError::from),
        }
    }

    /// Finish a successful mutating call: publish details, then record the
    /// outcome unconditionally
    async fn publish_and_persist(
        &self,
        before: &M,
        mut record: M,
        details: &ConnectionDetails,
    ) -> Result<Action, ReconcilerError> {
        let published = self.publisher.publish(&record, details).await;
        match &published {
            Ok(()) => {
                conditions::set(record.conditions_mut(), conditions::reconcile_success());
            }
            Err(e) => {
                warn!("Failed to publish connection details: {}", e);
                conditions::set(
                    record.conditions_mut(),
                    conditions::reconcile_error(e.kind().as_str(), e.to_string()),
                );
            }
        }
        self.write_status(before, &record, true).await?;
        published.map_err(ReconcilerError::Publish)?;
        Ok(Action::RequeueAfter(self.poll_interval))
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), ReconcilerError> {
    if cancel.is_cancelled() {
        return Err(ReconcilerError::Cancelled);
    }
    Ok(())
}

/// Ready=False and Synced=False, reason = error kind
fn mark_unavailable(record: &mut dyn Managed, error: &ReconcilerError) {
    let reason = error.kind().as_str();
    conditions::set(
        record.conditions_mut(),
        conditions::unavailable(reason, error.to_string()),
    );
    conditions::set(
        record.conditions_mut(),
        conditions::reconcile_error(reason, error.to_string()),
    );
}

/// Synced=False, reason = error kind
fn mark_unsynced(record: &mut dyn Managed, error: &ReconcilerError) {
    conditions::set(
        record.conditions_mut(),
        conditions::reconcile_error(error.kind().as_str(), error.to_string()),
    );
}

#[async_trait]
impl<M: ManagedResource> Reconcile for Reconciler<M> {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn reconcile(
        &self,
        name: &str,
        cancel: CancellationToken,
    ) -> Result<Action, ReconcilerError> {
        Reconciler::<M>::reconcile(self, name, cancel).await
    }
}
