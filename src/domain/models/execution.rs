//! Request, outcome and progress-event types for the execution loop.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::conversation::ChatMessage;
use super::milestone::MilestoneValidation;
use super::plan::PlanState;
use super::task_analysis::TaskAnalysis;

/// A user request handed to the controller by the transport layer.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub request_id: Uuid,
    pub text: String,
    /// Prior conversation turns, oldest first.
    pub history: Vec<ChatMessage>,
    /// Skill whose allow-list restricts capability use for this request.
    pub active_skill: Option<String>,
    /// Whether the context is shared with other participants (group chats).
    pub shared_context: bool,
}

impl ExecutionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            text: text.into(),
            history: Vec::new(),
            active_skill: None,
            shared_context: false,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.active_skill = Some(skill.into());
        self
    }

    pub fn shared(mut self) -> Self {
        self.shared_context = true;
        self
    }
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TerminalState {
    Success { answer: String },
    MaxIterations { iterations: u32 },
    ReplanExhausted { replans: u32 },
    /// A collaborator failure the loop cannot recover from.
    Failed { reason: String },
    Cancelled,
}

impl TerminalState {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Event kind reported for non-successful endings.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::MaxIterations { .. } => Some(ErrorKind::MaxIterations),
            Self::ReplanExhausted { .. } => Some(ErrorKind::ReplanExhausted),
            Self::Failed { .. } => Some(ErrorKind::Failed),
            Self::Cancelled => Some(ErrorKind::Cancelled),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Success { answer } => answer.clone(),
            Self::MaxIterations { iterations } => {
                format!("ran out of turns after {iterations} iterations without a final answer")
            }
            Self::ReplanExhausted { replans } => {
                format!("could not complete after {replans} replans")
            }
            Self::Failed { reason } => reason.clone(),
            Self::Cancelled => "request cancelled".to_string(),
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { .. } => write!(f, "success"),
            Self::MaxIterations { .. } => write!(f, "max_iterations"),
            Self::ReplanExhausted { .. } => write!(f, "replan_exhausted"),
            Self::Failed { .. } => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Summary returned to the caller once the loop terminates.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub request_id: Uuid,
    pub terminal: TerminalState,
    pub iterations: u32,
    pub analysis: TaskAnalysis,
    pub plan: Option<PlanState>,
    /// Corrective prompts injected instead of counting failures.
    pub soft_corrections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MaxIterations,
    ReplanExhausted,
    Failed,
    Cancelled,
}

/// Progress events streamed to the transport layer.
///
/// The `type` tags are the wire contract other layers render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    TaskAnalysis {
        request_id: Uuid,
        analysis: TaskAnalysis,
    },
    PlanGenerated {
        request_id: Uuid,
        plan: String,
        total_steps: usize,
    },
    PlanAdjustment {
        request_id: Uuid,
        reason: String,
        replan_count: u32,
        plan: String,
    },
    ToolResult {
        request_id: Uuid,
        capability: String,
        success: bool,
        /// True when the controller refused to run the call.
        blocked: bool,
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        milestone: Option<MilestoneValidation>,
    },
    FinalAnswer {
        request_id: Uuid,
        answer: String,
        iterations: u32,
    },
    Error {
        request_id: Uuid,
        kind: ErrorKind,
        message: String,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. } | Self::Error { .. })
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TaskAnalysis { .. } => "task_analysis",
            Self::PlanGenerated { .. } => "plan_generated",
            Self::PlanAdjustment { .. } => "plan_adjustment",
            Self::ToolResult { .. } => "tool_result",
            Self::FinalAnswer { .. } => "final_answer",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_names() {
        let id = Uuid::new_v4();
        let event = ProgressEvent::FinalAnswer {
            request_id: id,
            answer: "done".into(),
            iterations: 1,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "final_answer");
        assert_eq!(event.event_type(), "final_answer");
        assert!(event.is_terminal());

        let event = ProgressEvent::PlanAdjustment {
            request_id: id,
            reason: "连续失败 2 次".into(),
            replan_count: 1,
            plan: "1. retry".into(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "plan_adjustment");
        assert!(!event.is_terminal());

        let event = ProgressEvent::Error {
            request_id: id,
            kind: ErrorKind::ReplanExhausted,
            message: "x".into(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "replan_exhausted");
    }

    #[test]
    fn test_terminal_error_kinds() {
        assert_eq!(TerminalState::Success { answer: "a".into() }.error_kind(), None);
        assert_eq!(
            TerminalState::MaxIterations { iterations: 8 }.error_kind(),
            Some(ErrorKind::MaxIterations)
        );
        assert_eq!(TerminalState::Cancelled.error_kind(), Some(ErrorKind::Cancelled));
        assert!(TerminalState::ReplanExhausted { replans: 2 }
            .message()
            .contains("2 replans"));
    }
}
