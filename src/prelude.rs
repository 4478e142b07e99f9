//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use provider_litellm::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Managed resource contract
pub use crate::managed::{Managed, ManagedResource};

// Reconciler types
pub use crate::controller::reconciler::{
    Action, ConnectError, ConnectionDetails, ErrorKind, ExternalClient, ExternalConnector,
    ExternalError, ExternalObservation, Reconciler, ReconcilerError, RecordStore, StoreError,
};

// Connection publishing
pub use crate::controller::publisher::ConnectionPublisher;

// Credentials
pub use crate::credentials::{CredentialError, CredentialResolver, SecretStore};

// Config
pub use crate::config::ControllerConfig;

// Runtime
pub use crate::runtime::{Reconcile, SetupContext};

// LiteLLM adapters
pub use crate::provider::key::KeyClient;
pub use crate::provider::litellm::LiteLlmClient;
pub use crate::provider::team::TeamClient;
