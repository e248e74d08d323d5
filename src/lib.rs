/// CRD types
pub mod api;

/// Reconcilers driven by the controller runtime
pub mod controllers;

/// Child objects derived from a SpringBoot
pub mod workload;

/// Errors, metrics, status helpers, configuration and log setup
pub mod util;

pub use crate::util::errors::{Error, Result};
