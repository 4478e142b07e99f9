//! # Configuration
//!
//! Environment-driven controller settings and duration parsing.

pub mod controller;
pub mod duration;

pub use controller::ControllerConfig;
pub use duration::parse_duration;
