//! Milestone validation results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which deterministic check backs a milestone claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    FileExists,
    SyntaxCheck,
    ImportTest,
    Custom,
}

impl fmt::Display for ValidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileExists => write!(f, "file_exists"),
            Self::SyntaxCheck => write!(f, "syntax_check"),
            Self::ImportTest => write!(f, "import_test"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Outcome of checking one milestone claim. Never cached across claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneValidation {
    pub passed: bool,
    pub message: String,
    pub validation_type: ValidationType,
}

impl MilestoneValidation {
    pub fn pass(validation_type: ValidationType, message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            validation_type,
        }
    }

    pub fn fail(validation_type: ValidationType, message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            validation_type,
        }
    }
}
