//! Domain layer for the taskpilot controller
//!
//! This module contains the request-scoped and process-wide data model, the
//! error taxonomy, and the port traits for external collaborators.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult};
