//! CLI command implementations.

pub mod analyze;
pub mod milestone;
pub mod policy;
