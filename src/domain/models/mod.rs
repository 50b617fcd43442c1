//! Domain models for the taskpilot controller.

pub mod capability;
pub mod config;
pub mod conversation;
pub mod execution;
pub mod milestone;
pub mod plan;
pub mod policy;
pub mod task_analysis;

pub use capability::{CapabilityCall, CapabilityDescriptor, CapabilityOutcome, SkillContext};
pub use config::{
    AnalyzerConfig, Config, ControllerConfig, LoggingConfig, MemoryConfig, MilestoneConfig,
    PlannerConfig, PolicyConfig,
};
pub use conversation::{ChatMessage, ChatRole, MemorySnippet, ModelResponse};
pub use execution::{ErrorKind, ExecutionOutcome, ExecutionRequest, ProgressEvent, TerminalState};
pub use milestone::{MilestoneValidation, ValidationType};
pub use plan::PlanState;
pub use policy::{PolicyBundle, Rule, RuleAction, RuleKind};
pub use task_analysis::{Complexity, TaskAnalysis};
