//! Controller services.
//!
//! Leaves first: policy and capabilities, analysis and planning, plan
//! tracking and milestone checks, then the execution loop that drives them.

pub mod action_intent;
pub mod capability_registry;
pub mod context_builder;
pub mod event_emitter;
pub mod execution_loop;
pub mod milestone_validator;
pub mod plan_tracker;
pub mod planner;
pub mod policy_store;
pub mod task_analyzer;

pub use action_intent::ActionIntentDetector;
pub use capability_registry::{CapabilityRegistry, CapabilitySet};
pub use context_builder::ContextBuilder;
pub use event_emitter::EventEmitter;
pub use execution_loop::{ExecutionLoop, SoftCorrection};
pub use milestone_validator::{MilestoneContext, MilestoneValidator};
pub use plan_tracker::{PlanTracker, PlanTrackerConfig};
pub use planner::{GeneratedPlan, Planner};
pub use policy_store::{PolicyReloadEvent, PolicyStore};
pub use task_analyzer::TaskAnalyzer;
