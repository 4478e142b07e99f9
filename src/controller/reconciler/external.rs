//! # External Client Contract
//!
//! Operations the reconciler issues against one external resource kind.
//!
//! Every method receives the record as `&mut dyn Managed` and first downcasts
//! it to the concrete kind it serves. A record of any other kind is a contract
//! violation. Successful calls overwrite `status.atProvider` wholesale.

use crate::controller::reconciler::types::ErrorKind;
use crate::managed::Managed;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Connection details produced by an external client
///
/// Only the connection publisher persists these; they are never stored on a record.
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Result of observing the external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    pub exists: bool,
    pub up_to_date: bool,
    pub connection_details: ConnectionDetails,
}

impl ExternalObservation {
    pub fn absent() -> Self {
        Self::default()
    }
}

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("managed resource is not a {expected} (got {actual})")]
    NotManagedRecord {
        expected: &'static str,
        actual: String,
    },
    #[error("{operation} request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
    #[error("cannot decode {operation} response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl ExternalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotManagedRecord { .. } => ErrorKind::ContractViolation,
            Self::Transport { .. } => ErrorKind::TransientTransportError,
            Self::Decode { .. } => ErrorKind::DecodeError,
        }
    }

    pub fn not_managed(expected: &'static str, actual: &dyn Managed) -> Self {
        Self::NotManagedRecord {
            expected,
            actual: actual.kind().to_string(),
        }
    }
}

/// Client bound to one external system with resolved credentials
#[async_trait]
pub trait ExternalClient: Send + Sync {
    /// Report whether the external resource exists and matches the desired state
    async fn observe(&self, mr: &mut dyn Managed) -> Result<ExternalObservation, ExternalError>;

    /// Create the external resource
    async fn create(&self, mr: &mut dyn Managed) -> Result<ConnectionDetails, ExternalError>;

    /// Bring the external resource in line with the desired state
    async fn update(&self, mr: &mut dyn Managed) -> Result<ConnectionDetails, ExternalError>;

    /// Delete the external resource; an already absent resource is success
    async fn delete(&self, mr: &mut dyn Managed) -> Result<(), ExternalError>;
}
