//! Model client port - interface for the reasoning actor.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CapabilityDescriptor, ChatMessage, ModelResponse};

/// The model-calling collaborator.
///
/// Provider failover and request formatting live behind this trait; the
/// execution loop treats each call as a single fallible operation and
/// applies its own timeout and cancellation around it.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Ask the model for its next turn given the working context and the
    /// capabilities it may request.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        capabilities: &[CapabilityDescriptor],
    ) -> DomainResult<ModelResponse>;
}
