//! # Error Policy
//!
//! Maps a failed reconcile to the scheduling action for its key.

use crate::controller::reconciler::{Action, ErrorKind, ReconcilerError};
use crate::observability;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Classify a reconcile error into the next action
///
/// | Error kind                | Action                    |
/// |---------------------------|---------------------------|
/// | `ContractViolation`       | `AwaitChange`, logged as a bug |
/// | `ConfigurationError`      | `RequeueAfter(poll)`      |
/// | `TransientTransportError` | `Backoff`                 |
/// | `DecodeError`             | `Backoff`, with a warning |
/// | `ConflictError`           | `Immediately`             |
/// | `Cancelled`               | `Immediately`             |
pub fn error_policy(
    kind: &str,
    name: &str,
    error: &ReconcilerError,
    poll_interval: Duration,
) -> Action {
    let error_kind = error.kind();
    observability::metrics::increment_reconciliation_errors(kind, error_kind.as_str());

    match error_kind {
        ErrorKind::ContractViolation => {
            error!(
                resource.kind = kind,
                resource.name = name,
                error.kind = %error_kind,
                "❌ Contract violation, this is a bug; waiting for the next change: {}",
                error
            );
            Action::AwaitChange
        }
        ErrorKind::ConfigurationError => {
            warn!(
                resource.kind = kind,
                resource.name = name,
                error.kind = %error_kind,
                "Configuration error, retrying in {:?}: {}",
                poll_interval,
                error
            );
            Action::RequeueAfter(poll_interval)
        }
        ErrorKind::TransientTransportError => {
            warn!(
                resource.kind = kind,
                resource.name = name,
                error.kind = %error_kind,
                "Transient error, backing off: {}",
                error
            );
            Action::Backoff
        }
        ErrorKind::DecodeError => {
            warn!(
                resource.kind = kind,
                resource.name = name,
                error.kind = %error_kind,
                "⚠️  Unexpected response from external system, backing off: {}",
                error
            );
            Action::Backoff
        }
        ErrorKind::ConflictError | ErrorKind::Cancelled => {
            debug!(
                resource.kind = kind,
                resource.name = name,
                error.kind = %error_kind,
                "Requeueing immediately: {}",
                error
            );
            Action::Immediately
        }
    }
}
