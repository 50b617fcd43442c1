//! Result of request complexity classification.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Complex => write!(f, "complex"),
        }
    }
}

/// Produced once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub complexity: Complexity,
    /// Confidence in the classification, in `[0, 1]`.
    pub confidence: f64,
    /// Indicators that contributed to the score, as `category:keyword`.
    pub matched_indicators: Vec<String>,
    pub needs_plan: bool,
}

impl TaskAnalysis {
    /// Classification for empty or whitespace-only input.
    pub fn empty() -> Self {
        Self {
            complexity: Complexity::Simple,
            confidence: 0.0,
            matched_indicators: Vec::new(),
            needs_plan: false,
        }
    }

    pub fn is_complex(&self) -> bool {
        self.complexity == Complexity::Complex
    }
}
