//! Model-backed plan generation for complex requests.
//!
//! Plans are short, ordered, natural-language step lists. They are advisory
//! context for the reasoning actor, not a schema it must follow, so parsing
//! is deliberately lenient.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ChatMessage, PlanState, PlannerConfig};
use crate::domain::ports::ModelClient;

static STEP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:\d+\s*[.)、:：]|[-*•]|(?:step|步骤)\s*\d+\s*[.)、:：]?)\s*(.+?)\s*$")
        .expect("step regex is valid")
});

/// A freshly generated plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPlan {
    /// Normalized numbered rendering of `steps`.
    pub text: String,
    pub steps: Vec<String>,
}

impl GeneratedPlan {
    pub fn from_steps(steps: Vec<String>) -> Self {
        let text = steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {step}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        Self { text, steps }
    }

    pub fn into_state(self) -> PlanState {
        PlanState::new(self.text, self.steps)
    }
}

/// Generates and regenerates plans through the model collaborator.
pub struct Planner {
    client: Arc<dyn ModelClient>,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(client: Arc<dyn ModelClient>, config: PlannerConfig) -> Self {
        Self { client, config }
    }

    /// Produce a plan for `goal`.
    #[instrument(skip(self, capability_names), fields(capabilities = capability_names.len()))]
    pub async fn generate(&self, goal: &str, capability_names: &[String]) -> DomainResult<GeneratedPlan> {
        let prompt = self.build_generation_prompt(goal, capability_names);
        self.request_plan(prompt).await
    }

    /// Produce a replacement plan after the current one stalled.
    #[instrument(skip(self, capability_names, previous), fields(replan = previous.replan_count() + 1))]
    pub async fn regenerate(
        &self,
        goal: &str,
        capability_names: &[String],
        previous: &PlanState,
        reason: &str,
    ) -> DomainResult<GeneratedPlan> {
        let prompt = self.build_replan_prompt(goal, capability_names, previous, reason);
        self.request_plan(prompt).await
    }

    async fn request_plan(&self, prompt: String) -> DomainResult<GeneratedPlan> {
        let messages = [
            ChatMessage::system(
                "You are a planning assistant. Reply with a numbered list of steps and nothing else.",
            ),
            ChatMessage::user(prompt),
        ];
        let response = self
            .client
            .chat(&messages, &[])
            .await
            .map_err(|e| DomainError::PlanGeneration(e.to_string()))?;

        let mut steps = parse_steps(&response.text);
        if steps.is_empty() {
            return Err(DomainError::PlanGeneration("model returned no steps".to_string()));
        }
        if steps.len() > self.config.max_steps {
            debug!(parsed = steps.len(), max = self.config.max_steps, "truncating plan");
            steps.truncate(self.config.max_steps);
        }
        Ok(GeneratedPlan::from_steps(steps))
    }

    fn build_generation_prompt(&self, goal: &str, capability_names: &[String]) -> String {
        format!(
            r"## Goal
{goal}

## Available Capabilities
{}

## Instructions
Break the goal into {}-{} ordered steps. Each step is one short sentence.
A step may name the capability it expects to use in parentheses, e.g. `(read_file)`.
Keep the plan practical; it guides the work but does not have to be followed literally.",
            format_capabilities(capability_names),
            self.config.min_steps,
            self.config.max_steps,
        )
    }

    fn build_replan_prompt(
        &self,
        goal: &str,
        capability_names: &[String],
        previous: &PlanState,
        reason: &str,
    ) -> String {
        let completed = if previous.completed_steps().is_empty() {
            "None".to_string()
        } else {
            previous
                .completed_steps()
                .iter()
                .map(|s| format!("- {s}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r"## Goal
{goal}

## Previous Plan
{}

## Why It Is Being Replaced
{reason}
Last failure: {}

## Already Completed
{completed}

## Available Capabilities
{}

## Instructions
Write a new plan of {}-{} ordered steps that takes a different approach where the old one failed.
Do not repeat completed work.",
            previous.original_plan_text(),
            previous.last_failure().unwrap_or("none recorded"),
            format_capabilities(capability_names),
            self.config.min_steps,
            self.config.max_steps,
        )
    }
}

fn format_capabilities(names: &[String]) -> String {
    if names.is_empty() {
        "None".to_string()
    } else {
        names.join(", ")
    }
}

/// Extract ordered steps from model output.
///
/// Numbered, bulleted and `Step N:` / `步骤N` lines are recognised. If no
/// line looks like a list item, every non-empty non-heading line is a step.
pub fn parse_steps(text: &str) -> Vec<String> {
    let listed: Vec<String> = text
        .lines()
        .filter_map(|line| STEP_LINE.captures(line))
        .map(|caps| caps[1].to_string())
        .filter(|step| !step.is_empty())
        .collect();
    if !listed.is_empty() {
        return listed;
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}
