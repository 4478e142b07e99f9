//! # Finalization
//!
//! Deletion path of the reconciler.
//!
//! The finalizer is only released once the external resource is confirmed
//! gone (or the deletion policy is `Orphan`). Connection details are
//! unpublished first so a released record never leaves a stale Secret behind.

use crate::constants::MANAGED_FINALIZER;
use crate::controller::reconciler::{
    ensure_not_cancelled, mark_unavailable, Action, Reconciler, ReconcilerError,
};
use crate::crd::DeletionPolicy;
use crate::managed::{Managed, ManagedResource};
use crate::observability::metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

impl<M: ManagedResource> Reconciler<M> {
    pub(crate) async fn finalize(
        &self,
        mut record: M,
        cancel: &CancellationToken,
    ) -> Result<Action, ReconcilerError> {
        if record.deletion_policy() == DeletionPolicy::Orphan {
            info!("Deletion policy is Orphan, leaving external resource in place");
            self.publisher
                .unpublish(&record)
                .await
                .map_err(ReconcilerError::Publish)?;
            self.release(record).await?;
            return Ok(Action::Forget);
        }

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
        ensure_not_cancelled(cancel)?;

        info!("Deleting external resource");
        let deleted = client.delete(&mut record).await;
        metrics::record_external_operation(self.kind, "delete", deleted.is_ok());
        if let Err(e) = deleted {
            let e = ReconcilerError::from(e);
            mark_unavailable(&mut record, &e);
            self.write_status(&before, &record, false).await?;
            return Err(e);
        }

        self.publisher
            .unpublish(&record)
            .await
            .map_err(ReconcilerError::Publish)?;
        self.release(record).await?;
        info!("✅ External resource deleted, finalizer released");
        Ok(Action::Forget)
    }

    /// Remove the managed finalizer so the API server can drop the record
    async fn release(&self, mut record: M) -> Result<(), ReconcilerError> {
        if record.remove_finalizer(MANAGED_FINALIZER) {
            self.records.update(&record).await?;
            debug!(resource.name = Managed::name(&record), "Removed finalizer");
        }
        Ok(())
    }
}
