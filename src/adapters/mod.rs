//! Adapters implementing the domain ports.
//!
//! Production deployments plug their own model, memory and tool backends
//! into the ports; the in-memory adapters here back tests and local runs.

pub mod mock;

pub use mock::{MockCapabilityExecutor, ScriptedModelClient};
