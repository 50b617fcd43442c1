//! Domain errors for the taskpilot controller.

use thiserror::Error;

/// Domain-level errors that can occur while driving a request.
///
/// Only a subset of these ever unwind a request. Capability and milestone
/// failures are folded back into the execution loop's state machine; see
/// [`DomainError::is_soft_correction`].
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Policy document {path} is malformed: {reason}")]
    PolicyParse { path: String, reason: String },

    #[error("Failed to read policy document {path}: {source}")]
    PolicyIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Capability '{capability}' is not allowed in skill context '{skill}'")]
    CapabilityNotAllowed { capability: String, skill: String },

    #[error("Capability '{capability}' is denied by policy rule {rule_id}")]
    CapabilityDenied { capability: String, rule_id: String },

    #[error("Unknown skill: {0}")]
    SkillNotFound(String),

    #[error("Model call failed: {0}")]
    ModelCall(String),

    #[error("Capability execution failed: {0}")]
    CapabilityExecution(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Plan generation failed: {0}")]
    PlanGeneration(String),

    #[error("Replan limit reached ({0} replans)")]
    ReplanLimitReached(u32),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether this error is a controller-side rejection that should be
    /// answered with a corrective prompt rather than counted as a failure.
    pub fn is_soft_correction(&self) -> bool {
        matches!(
            self,
            Self::CapabilityNotFound(_)
                | Self::CapabilityNotAllowed { .. }
                | Self::CapabilityDenied { .. }
        )
    }
}
