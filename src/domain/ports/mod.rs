//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces for the controller's collaborators:
//! - ModelClient: the reasoning actor (model-calling layer)
//! - MemoryRetriever: read-only long-term memory retrieval
//! - CapabilityExecutor: concrete tool execution
//!
//! These traits define the contracts that keep the execution loop independent
//! of specific transport, provider and tool implementations.

pub mod capability_executor;
pub mod memory_retriever;
pub mod model_client;
pub mod null_memory;

pub use capability_executor::CapabilityExecutor;
pub use memory_retriever::MemoryRetriever;
pub use model_client::ModelClient;
pub use null_memory::NullMemoryRetriever;
