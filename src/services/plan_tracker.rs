//! Plan progress tracking and replan decisions.
//!
//! The tracker is the only code that mutates [`PlanState`]. It is stateless
//! itself, holding just the thresholds, so a single instance serves every
//! request.

use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ControllerConfig, PlanState};
use crate::services::planner::GeneratedPlan;

const MAX_FAILURE_DETAIL_CHARS: usize = 500;

/// Thresholds governing replans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanTrackerConfig {
    pub failure_threshold: u32,
    pub stagnation_threshold: u32,
    pub max_replan_count: u32,
}

impl Default for PlanTrackerConfig {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}

impl From<&ControllerConfig> for PlanTrackerConfig {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            stagnation_threshold: config.stagnation_threshold,
            max_replan_count: config.max_replan_count,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanTracker {
    config: PlanTrackerConfig,
}

impl PlanTracker {
    pub fn new(config: PlanTrackerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> PlanTrackerConfig {
        self.config
    }

    /// Count one loop iteration against the plan.
    pub fn record_iteration(&self, state: &mut PlanState) {
        state.iteration_count += 1;
    }

    /// Fold one capability (or milestone) result into the plan.
    ///
    /// Success completes the current step and clears the failure streak;
    /// failure only extends the streak.
    pub fn update_from_result(&self, state: &mut PlanState, capability: &str, succeeded: bool, output: &str) {
        if succeeded {
            let label = state
                .current_step_description()
                .map_or_else(|| capability.to_string(), ToString::to_string);
            state.completed_steps.push(label);
            state.current_step = (state.current_step + 1).min(state.steps.len() + 1);
            state.consecutive_failure_count = 0;
            debug!(
                capability,
                current_step = state.current_step,
                completed = state.completed_steps.len(),
                "plan step completed"
            );
        } else {
            state.consecutive_failure_count += 1;
            state.last_failure = Some(truncate(&format!("{capability}: {output}"), MAX_FAILURE_DETAIL_CHARS));
            debug!(
                capability,
                consecutive_failures = state.consecutive_failure_count,
                "plan step failed"
            );
        }
    }

    /// Record that a milestone claim was verified.
    pub fn mark_milestone_validated(&self, state: &mut PlanState, step: &str) {
        state.validated_milestones.insert(step.to_string());
    }

    /// The condition that calls for a new plan, ignoring the replan ceiling.
    ///
    /// Failures are checked first: a hard failure is a stronger signal than
    /// slow progress. Stagnation only counts while nothing at all has been
    /// completed, measured over iterations spent on the current plan.
    pub fn replan_trigger(&self, state: &PlanState) -> Option<String> {
        if state.consecutive_failure_count >= self.config.failure_threshold {
            return Some(format!("连续失败 {} 次", state.consecutive_failure_count));
        }
        if state.completed_steps.is_empty()
            && state.iterations_on_current_plan() >= self.config.stagnation_threshold
        {
            return Some(format!("{} 次迭代后仍无进展", state.iterations_on_current_plan()));
        }
        None
    }

    pub fn is_exhausted(&self, state: &PlanState) -> bool {
        state.replan_count >= self.config.max_replan_count
    }

    /// Whether the loop should replan now, and why.
    ///
    /// Always `false` once the replan ceiling is reached.
    pub fn should_replan(&self, state: &PlanState) -> (bool, String) {
        if self.is_exhausted(state) {
            return (false, String::new());
        }
        match self.replan_trigger(state) {
            Some(reason) => (true, reason),
            None => (false, String::new()),
        }
    }

    /// Swap in a new plan. A replan is a full replacement, not a patch.
    pub fn record_replan(&self, state: &mut PlanState, reason: &str, plan: GeneratedPlan) -> DomainResult<()> {
        if self.is_exhausted(state) {
            return Err(DomainError::ReplanLimitReached(state.replan_count));
        }
        state.replan_count += 1;
        state.consecutive_failure_count = 0;
        state.original_plan_text = plan.text;
        state.steps = plan.steps;
        state.current_step = 1;
        state.plan_started_at_iteration = state.iteration_count;
        state.replan_reasons.push(reason.to_string());
        info!(
            reason,
            replan_count = state.replan_count,
            total_steps = state.steps.len(),
            "plan replaced"
        );
        Ok(())
    }

    /// Replan bookkeeping when no replacement plan could be generated: the
    /// attempt still consumes budget so the ceiling keeps its meaning.
    pub fn record_failed_replan(&self, state: &mut PlanState, reason: &str) -> DomainResult<()> {
        let plan = GeneratedPlan {
            text: state.original_plan_text.clone(),
            steps: state.steps.clone(),
        };
        self.record_replan(state, reason, plan)
    }

    /// Advisory progress summary injected into the next turn's context.
    pub fn progress_summary(&self, state: &PlanState) -> String {
        let mut lines = vec!["## Plan Progress".to_string(), state.original_plan_text.clone(), String::new()];

        match state.current_step_description() {
            Some(desc) => lines.push(format!(
                "Current step: {}/{}: {desc}",
                state.current_step,
                state.steps.len()
            )),
            None => lines.push("All planned steps are done; give the final answer.".to_string()),
        }

        if !state.completed_steps.is_empty() {
            lines.push("Completed:".to_string());
            lines.extend(state.completed_steps.iter().map(|s| format!("- {s}")));
        }
        if state.consecutive_failure_count > 0 {
            lines.push(format!(
                "Consecutive failures: {} (replanning at {})",
                state.consecutive_failure_count, self.config.failure_threshold
            ));
            if let Some(failure) = &state.last_failure {
                lines.push(format!("Last failure: {failure}"));
            }
        }
        if state.replan_count > 0 {
            lines.push(format!(
                "Replans used: {}/{}",
                state.replan_count, self.config.max_replan_count
            ));
        }
        lines.push("The plan is guidance; adapt it if the situation requires.".to_string());
        lines.join("\n")
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}
