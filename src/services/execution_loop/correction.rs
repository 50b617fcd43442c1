//! Corrective prompts injected instead of counting failures.

use crate::domain::errors::DomainError;

/// A controller-side refusal the reasoning actor gets a chance to fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftCorrection {
    /// A requested capability was refused before execution.
    Rejected { capability: String, reason: String },
    /// A text-only answer to a request that needed a capability call.
    MissingCapabilityCall,
}

impl SoftCorrection {
    /// Build a rejection from an authorization error.
    pub fn rejected(capability: &str, error: &DomainError) -> Self {
        Self::Rejected {
            capability: capability.to_string(),
            reason: error.to_string(),
        }
    }

    pub fn prompt(&self, available: &[String]) -> String {
        let available = if available.is_empty() {
            "none".to_string()
        } else {
            available.join(", ")
        };
        match self {
            Self::Rejected { capability, reason } => format!(
                "The call to `{capability}` was refused and did not run ({reason}). \
                 Choose one of the available capabilities instead: {available}."
            ),
            Self::MissingCapabilityCall => format!(
                "This request asks for an action, but no capability was called. \
                 Do not describe the result; perform it with a capability call. Available: {available}."
            ),
        }
    }
}
