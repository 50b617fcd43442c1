//! Per-request plan state.
//!
//! `PlanState` is created when a request needs a plan and is owned
//! exclusively by that request's execution loop. All mutation goes through
//! [`PlanTracker`](crate::services::PlanTracker); this module only exposes
//! read accessors outside the crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanState {
    pub(crate) original_plan_text: String,
    pub(crate) steps: Vec<String>,
    /// 1-based; `total_steps + 1` once every step is done.
    pub(crate) current_step: usize,
    pub(crate) completed_steps: Vec<String>,
    pub(crate) consecutive_failure_count: u32,
    pub(crate) replan_count: u32,
    pub(crate) iteration_count: u32,
    /// Iteration count at which the current plan was adopted.
    pub(crate) plan_started_at_iteration: u32,
    pub(crate) validated_milestones: BTreeSet<String>,
    pub(crate) last_failure: Option<String>,
    pub(crate) replan_reasons: Vec<String>,
}

impl PlanState {
    pub fn new(plan_text: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            original_plan_text: plan_text.into(),
            steps,
            current_step: 1,
            completed_steps: Vec::new(),
            consecutive_failure_count: 0,
            replan_count: 0,
            iteration_count: 0,
            plan_started_at_iteration: 0,
            validated_milestones: BTreeSet::new(),
            last_failure: None,
            replan_reasons: Vec::new(),
        }
    }

    pub fn original_plan_text(&self) -> &str {
        &self.original_plan_text
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    pub fn consecutive_failure_count(&self) -> u32 {
        self.consecutive_failure_count
    }

    pub fn replan_count(&self) -> u32 {
        self.replan_count
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn validated_milestones(&self) -> &BTreeSet<String> {
        &self.validated_milestones
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn replan_reasons(&self) -> &[String] {
        &self.replan_reasons
    }

    /// Iterations spent on the plan currently in force.
    pub fn iterations_on_current_plan(&self) -> u32 {
        self.iteration_count.saturating_sub(self.plan_started_at_iteration)
    }

    /// Description of the step the actor is working on, if any remain.
    pub fn current_step_description(&self) -> Option<&str> {
        self.current_step
            .checked_sub(1)
            .and_then(|idx| self.steps.get(idx))
            .map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.current_step > self.steps.len()
    }
}
