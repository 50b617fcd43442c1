//! Taskpilot - agent task-execution controller
//!
//! Turns a user request into a bounded sequence of model-reasoning steps and
//! capability invocations. Complex requests get an advisory plan, progress
//! is tracked against it, claimed milestones are verified deterministically,
//! and sustained failure triggers a bounded number of replans. Declarative
//! policy constraints are enforced mechanically rather than left to the
//! model.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and the collaborator ports
//! - **Service Layer** (`services`): the controller components
//! - **Adapters** (`adapters`): in-memory collaborators for tests and local runs
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use taskpilot::services::{CapabilityRegistry, EventEmitter, ExecutionLoop, PolicyStore};
//!
//! let policy = Arc::new(PolicyStore::open(".taskpilot/POLICY.md").await?);
//! let controller = ExecutionLoop::new(&config, policy, registry, model, executor, memory);
//! let (events, mut rx) = EventEmitter::channel();
//! let outcome = controller.run(ExecutionRequest::new("..."), &events, cancel).await;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    CapabilityCall, CapabilityDescriptor, CapabilityOutcome, Config, ExecutionOutcome,
    ExecutionRequest, ProgressEvent, TerminalState,
};
pub use domain::ports::{CapabilityExecutor, MemoryRetriever, ModelClient};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CapabilityRegistry, EventEmitter, ExecutionLoop, PolicyStore};
