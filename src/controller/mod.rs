//! # Controller
//!
//! - `backoff`: Exponential per-key backoff
//! - `publisher`: Connection secret publishing
//! - `reconciler`: Managed resource reconciliation
//! - `provider_config`: ProviderConfig usage tracking and deletion guard

pub mod backoff;
pub mod provider_config;
pub mod publisher;
pub mod reconciler;
