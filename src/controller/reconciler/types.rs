//! # Reconciler Types
//!
//! Error taxonomy, reconcile outcomes and the top-level reconciler error.

use crate::controller::reconciler::connect::ConnectError;
use crate::controller::reconciler::external::ExternalError;
use crate::controller::reconciler::store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Error classification shared by every layer
///
/// The kind decides the retry policy and becomes the condition reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The record handed to a component is not the kind it serves; a bug
    ContractViolation,
    /// Missing or invalid ProviderConfig, credentials or client settings
    ConfigurationError,
    /// Network, timeout, non-success status or API server failure
    TransientTransportError,
    /// Malformed response from the external system
    DecodeError,
    /// Optimistic concurrency precondition failed
    ConflictError,
    /// Reconcile abandoned on shutdown or deadline
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContractViolation => "ContractViolation",
            Self::ConfigurationError => "ConfigurationError",
            Self::TransientTransportError => "TransientTransportError",
            Self::DecodeError => "DecodeError",
            Self::ConflictError => "ConflictError",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the scheduler should do with a key after a reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Visit again after the given delay
    RequeueAfter(Duration),
    /// Visit again after the key's exponential backoff delay
    Backoff,
    /// Visit again as soon as a worker is free
    Immediately,
    /// Wait for the next change event
    AwaitChange,
    /// The record is gone; drop all per-key state
    Forget,
}

impl Action {
    /// Label used for the requeue metric
    pub fn reason(&self) -> &'static str {
        match self {
            Self::RequeueAfter(_) => "poll",
            Self::Backoff => "backoff",
            Self::Immediately => "immediate",
            Self::AwaitChange => "await-change",
            Self::Forget => "forget",
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    External(#[from] ExternalError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to publish connection details: {0}")]
    Publish(#[source] StoreError),
    #[error("reconcile cancelled")]
    Cancelled,
}

impl ReconcilerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect(e) => e.kind(),
            Self::External(e) => e.kind(),
            Self::Store(e) | Self::Publish(e) => e.kind(),
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}
