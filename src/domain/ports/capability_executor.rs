//! Capability executor port - interface for concrete tool execution.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::DomainResult;
use crate::domain::models::CapabilityOutcome;

/// Capability execution collaborator.
///
/// Used for ordinary capability calls and for milestone checks. By
/// convention the `file_exists` capability reports `success = true` only when
/// the `path` parameter exists, and `run_command` reports `success = true`
/// only when `command` exits with status zero.
///
/// `Err` is reserved for transport-level problems (the tool could not be
/// reached at all); the execution loop treats it like a failed outcome.
#[async_trait]
pub trait CapabilityExecutor: Send + Sync {
    async fn invoke(&self, name: &str, params: &Value) -> DomainResult<CapabilityOutcome>;
}
