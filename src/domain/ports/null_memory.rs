//! Null memory retriever implementation.
//!
//! Used when memory features are not needed but the type system
//! requires a MemoryRetriever implementation.

use async_trait::async_trait;

use super::MemoryRetriever;
use crate::domain::errors::DomainResult;
use crate::domain::models::MemorySnippet;

/// A no-op memory retriever that never returns anything.
#[derive(Debug, Clone, Default)]
pub struct NullMemoryRetriever;

impl NullMemoryRetriever {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MemoryRetriever for NullMemoryRetriever {
    async fn retrieve(&self, _query: &str, _top_k: usize) -> DomainResult<Vec<MemorySnippet>> {
        Ok(Vec::new())
    }
}
