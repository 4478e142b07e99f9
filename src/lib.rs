//! LiteLLM Provider Library
//!
//! Reconciles LiteLLM proxy keys and teams declared as Kubernetes managed
//! resources.
//!
//! ## Quick Start
//!
//! ```rust
//! use provider_litellm::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod credentials;
pub mod managed;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
pub mod server;
