//! Memory retriever port - read-only access to long-term memory.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::MemorySnippet;

/// Retrieval collaborator consumed when building working context.
#[async_trait]
pub trait MemoryRetriever: Send + Sync {
    /// Return at most `top_k` snippets ranked by relevance to `query`.
    async fn retrieve(&self, query: &str, top_k: usize) -> DomainResult<Vec<MemorySnippet>>;
}
