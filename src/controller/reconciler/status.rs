//! # Status Persistence
//!
//! Writes status back to the record store.
//!
//! Unchanged status is never written, so reconciles do not trigger watch
//! events of their own. Regular writes carry the record's resourceVersion and
//! fail with a conflict if the record moved on. After a mutating external call
//! the write falls back to an unconditional patch: status is owned by this
//! controller and losing the identifier of a created resource would orphan it.

use crate::constants::CRITICAL_STATUS_WRITE_ATTEMPTS;
use crate::controller::reconciler::store::status_value;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::managed::{Managed, ManagedResource};
use tracing::{debug, error, warn};

impl<M: ManagedResource> Reconciler<M> {
    /// Persist `after`'s status if it differs from `before`'s
    ///
    /// `critical` is set after a mutating external call succeeded.
    pub(crate) async fn write_status(
        &self,
        before: &M,
        after: &M,
        critical: bool,
    ) -> Result<(), ReconcilerError> {
        if status_value(before)? == status_value(after)? {
            debug!("Status unchanged, skipping update");
            return Ok(());
        }

        if !critical {
            self.records.update_status(after).await?;
            return Ok(());
        }

        let mut attempt = 1;
        let mut result = self.records.update_status(after).await;
        while let Err(e) = &result {
            if attempt >= CRITICAL_STATUS_WRITE_ATTEMPTS {
                break;
            }
            warn!(
                attempt,
                "Status write after external mutation failed: {}, retrying without precondition",
                e
            );
            attempt += 1;
            result = self.records.force_update_status(after).await;
        }

        result.map(|_| ()).map_err(|e| {
            error!(
                resource.name = Managed::name(after),
                "❌ External resource changed but status could not be recorded: {}", e
            );
            ReconcilerError::from(e)
        })
    }
}
