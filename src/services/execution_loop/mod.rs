//! The ReAct controller.
//!
//! One [`ExecutionLoop`] serves any number of concurrent requests; all
//! per-request state lives in a private `RequestRun` owned by the call to
//! [`ExecutionLoop::run`]. Each iteration asks the reasoning actor for its
//! next move, enforces policy and skill constraints on any requested
//! capability calls, executes the permitted ones in request order, folds
//! the results (and milestone checks) into the plan, and decides whether
//! to continue, replan or stop.
//!
//! The loop suspends only at collaborator calls, each under a timeout and
//! the request's cancellation token.

mod correction;
mod suspend;

pub use correction::SoftCorrection;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::DomainError;
use crate::domain::models::{
    CapabilityCall, CapabilityDescriptor, CapabilityOutcome, ChatMessage, Config, ControllerConfig,
    ErrorKind, ExecutionOutcome, ExecutionRequest, MemorySnippet, MilestoneValidation, PlanState,
    PolicyBundle, ProgressEvent, SkillContext, TaskAnalysis, TerminalState, ValidationType,
};
use crate::domain::ports::{CapabilityExecutor, MemoryRetriever, ModelClient};
use crate::services::action_intent::ActionIntentDetector;
use crate::services::capability_registry::{CapabilityRegistry, CapabilitySet};
use crate::services::context_builder::ContextBuilder;
use crate::services::event_emitter::EventEmitter;
use crate::services::milestone_validator::{classify, MilestoneContext, MilestoneValidator};
use crate::services::plan_tracker::{PlanTracker, PlanTrackerConfig};
use crate::services::planner::Planner;
use crate::services::policy_store::PolicyStore;
use crate::services::task_analyzer::TaskAnalyzer;
use suspend::{guarded, Suspended};

/// What the loop does after an iteration.
enum Flow {
    Continue,
    Finish(TerminalState),
}

/// Everything one request owns while it runs.
struct RequestRun {
    request: ExecutionRequest,
    analysis: TaskAnalysis,
    policy: Arc<PolicyBundle>,
    capabilities: Arc<CapabilitySet>,
    skill: Option<SkillContext>,
    declared: Vec<CapabilityDescriptor>,
    plan: Option<PlanState>,
    memory: Vec<MemorySnippet>,
    transcript: Vec<ChatMessage>,
    iterations: u32,
    executed: usize,
    soft_corrections: u32,
}

impl RequestRun {
    fn declared_names(&self) -> Vec<String> {
        self.declared.iter().map(|d| d.name.clone()).collect()
    }
}

pub struct ExecutionLoop {
    config: ControllerConfig,
    policy: Arc<PolicyStore>,
    registry: Arc<CapabilityRegistry>,
    model: Arc<dyn ModelClient>,
    executor: Arc<dyn CapabilityExecutor>,
    analyzer: TaskAnalyzer,
    planner: Planner,
    tracker: PlanTracker,
    validator: MilestoneValidator,
    context: ContextBuilder,
    intent: ActionIntentDetector,
    workspace_root: Option<PathBuf>,
}

impl ExecutionLoop {
    pub fn new(
        config: &Config,
        policy: Arc<PolicyStore>,
        registry: Arc<CapabilityRegistry>,
        model: Arc<dyn ModelClient>,
        executor: Arc<dyn CapabilityExecutor>,
        memory: Arc<dyn MemoryRetriever>,
    ) -> Self {
        Self {
            config: config.controller.clone(),
            analyzer: TaskAnalyzer::new(&config.analyzer),
            planner: Planner::new(Arc::clone(&model), config.planner.clone()),
            tracker: PlanTracker::new(PlanTrackerConfig::from(&config.controller)),
            validator: MilestoneValidator::new(Arc::clone(&executor), config.milestone.clone()),
            context: ContextBuilder::new(memory, &config.memory),
            intent: ActionIntentDetector::new(config.controller.tool_enforcement_iterations),
            policy,
            registry,
            model,
            executor,
            workspace_root: None,
        }
    }

    /// Resolve relative milestone paths against `root`.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Drive `request` to a terminal state.
    ///
    /// Never returns an error: every ending, including collaborator
    /// failures and cancellation, is a [`TerminalState`] and is reported
    /// as exactly one terminal event on `events`.
    #[instrument(skip_all, fields(request_id = %request.request_id))]
    pub async fn run(
        &self,
        request: ExecutionRequest,
        events: &EventEmitter,
        cancel: CancellationToken,
    ) -> ExecutionOutcome {
        let analysis = self.analyzer.analyze(&request.text);
        info!(
            complexity = %analysis.complexity,
            confidence = analysis.confidence,
            needs_plan = analysis.needs_plan,
            "request analyzed"
        );
        events.emit(ProgressEvent::TaskAnalysis {
            request_id: request.request_id,
            analysis: analysis.clone(),
        });

        let mut run = RequestRun {
            request,
            analysis,
            policy: self.policy.current(),
            capabilities: self.registry.snapshot(),
            skill: None,
            declared: Vec::new(),
            plan: None,
            memory: Vec::new(),
            transcript: Vec::new(),
            iterations: 0,
            executed: 0,
            soft_corrections: 0,
        };

        let terminal = self.drive(&mut run, events, &cancel).await;
        self.finish(run, terminal, events)
    }

    async fn drive(&self, run: &mut RequestRun, events: &EventEmitter, cancel: &CancellationToken) -> TerminalState {
        if let Some(skill) = run.request.active_skill.as_deref() {
            match run.capabilities.skill_context(skill) {
                Ok(ctx) => run.skill = ctx,
                Err(err) => return TerminalState::Failed { reason: err.to_string() },
            }
        }
        run.declared = run.capabilities.declared(run.skill.as_ref(), &run.policy);

        if run.analysis.needs_plan {
            if let Flow::Finish(terminal) = self.plan_request(run, events, cancel).await {
                return terminal;
            }
        }

        match guarded(
            self.context.load_memory(&run.request, &run.policy),
            self.model_timeout(),
            cancel,
        )
        .await
        {
            Suspended::Done(memory) => run.memory = memory,
            Suspended::TimedOut => warn!("memory retrieval timed out; continuing without memory"),
            Suspended::Cancelled => return TerminalState::Cancelled,
        }

        let ceiling = self.iteration_ceiling(run);
        debug!(ceiling, planned = run.plan.is_some(), "starting reasoning loop");

        for iteration in 1..=ceiling {
            if cancel.is_cancelled() {
                return TerminalState::Cancelled;
            }
            run.iterations = iteration;
            if let Some(plan) = run.plan.as_mut() {
                self.tracker.record_iteration(plan);
            }
            if let Flow::Finish(terminal) = self.iterate(run, events, cancel).await {
                return terminal;
            }
        }

        TerminalState::MaxIterations { iterations: ceiling }
    }

    /// Iteration budget: larger while a plan is active, never above a
    /// policy-imposed cap.
    fn iteration_ceiling(&self, run: &RequestRun) -> u32 {
        let base = if run.plan.is_some() {
            self.config.max_iterations_with_plan
        } else {
            self.config.max_iterations
        };
        run.policy.iteration_cap().map_or(base, |cap| base.min(cap))
    }

    /// Generate the initial plan. A failed generation is logged and the
    /// request continues unplanned.
    async fn plan_request(&self, run: &mut RequestRun, events: &EventEmitter, cancel: &CancellationToken) -> Flow {
        let names = run.declared_names();
        match guarded(self.planner.generate(&run.request.text, &names), self.model_timeout(), cancel).await {
            Suspended::Done(Ok(plan)) => {
                info!(total_steps = plan.steps.len(), "plan generated");
                events.emit(ProgressEvent::PlanGenerated {
                    request_id: run.request.request_id,
                    plan: plan.text.clone(),
                    total_steps: plan.steps.len(),
                });
                run.plan = Some(plan.into_state());
            }
            Suspended::Done(Err(err)) => warn!(error = %err, "plan generation failed; continuing without a plan"),
            Suspended::TimedOut => warn!("plan generation timed out; continuing without a plan"),
            Suspended::Cancelled => return Flow::Finish(TerminalState::Cancelled),
        }
        Flow::Continue
    }

    async fn iterate(&self, run: &mut RequestRun, events: &EventEmitter, cancel: &CancellationToken) -> Flow {
        let plan_summary = run.plan.as_ref().map(|p| self.tracker.progress_summary(p));
        let system = ContextBuilder::system_prompt(&run.policy, run.skill.as_ref(), &run.memory, plan_summary.as_deref());
        let messages = ContextBuilder::build(&run.request, system, &run.transcript);

        let response = match guarded(self.model.chat(&messages, &run.declared), self.model_timeout(), cancel).await {
            Suspended::Done(Ok(response)) => response,
            Suspended::Done(Err(err)) => {
                return Flow::Finish(TerminalState::Failed { reason: err.to_string() });
            }
            Suspended::TimedOut => {
                let err = DomainError::Timeout {
                    operation: "model call".to_string(),
                    seconds: self.config.model_timeout_secs,
                };
                return Flow::Finish(TerminalState::Failed { reason: err.to_string() });
            }
            Suspended::Cancelled => return Flow::Finish(TerminalState::Cancelled),
        };

        debug!(
            iteration = run.iterations,
            calls = response.capability_calls.len(),
            "model responded"
        );

        if !response.requests_capabilities() {
            if self
                .intent
                .missing_capability_call(&run.request.text, &response.text, run.iterations, run.executed)
            {
                info!(iteration = run.iterations, "text-only answer to an action request; correcting");
                run.transcript.push(ChatMessage::assistant(response.text));
                self.inject_corrections(run, &[SoftCorrection::MissingCapabilityCall]);
                return Flow::Continue;
            }
            return Flow::Finish(TerminalState::Success { answer: response.text });
        }

        run.transcript.push(ChatMessage::assistant_with_calls(
            response.text.clone(),
            response.capability_calls.clone(),
        ));

        let mut corrections = Vec::new();
        let mut executed_calls: Vec<CapabilityCall> = Vec::new();

        for call in response.capability_calls {
            let verdict = run
                .capabilities
                .authorize(&call.name, run.skill.as_ref(), &run.policy)
                .map(|_| ());
            if let Err(err) = verdict {
                warn!(capability = %call.name, error = %err, "capability call refused");
                events.emit(ProgressEvent::ToolResult {
                    request_id: run.request.request_id,
                    capability: call.name.clone(),
                    success: false,
                    blocked: true,
                    output: err.to_string(),
                    step: None,
                    milestone: None,
                });
                run.transcript.push(ChatMessage::tool(&call.id, format!("refused: {err}")));
                corrections.push(SoftCorrection::rejected(&call.name, &err));
                continue;
            }

            let outcome = match guarded(
                self.executor.invoke(&call.name, &call.params),
                self.capability_timeout(),
                cancel,
            )
            .await
            {
                Suspended::Done(Ok(outcome)) => outcome,
                Suspended::Done(Err(err)) => {
                    CapabilityOutcome::failure(DomainError::CapabilityExecution(err.to_string()).to_string())
                }
                Suspended::TimedOut => CapabilityOutcome::failure(
                    DomainError::Timeout {
                        operation: format!("capability {}", call.name),
                        seconds: self.config.capability_timeout_secs,
                    }
                    .to_string(),
                ),
                Suspended::Cancelled => return Flow::Finish(TerminalState::Cancelled),
            };
            run.executed += 1;
            executed_calls.push(call.clone());

            let step = run.plan.as_ref().filter(|p| !p.is_complete()).map(PlanState::current_step);
            let (succeeded, milestone) =
                match self.fold_result(run.plan.as_mut(), &call, &outcome, &executed_calls, cancel).await {
                    Suspended::Done(folded) => folded,
                    Suspended::TimedOut | Suspended::Cancelled => {
                        return Flow::Finish(TerminalState::Cancelled);
                    }
                };

            debug!(capability = %call.name, success = succeeded, "capability result applied");

            let mut content = outcome.summary();
            if let Some(validation) = milestone.as_ref().filter(|v| !v.passed) {
                content.push_str(&format!("\nmilestone check failed: {}", validation.message));
            }
            events.emit(ProgressEvent::ToolResult {
                request_id: run.request.request_id,
                capability: call.name.clone(),
                success: succeeded,
                blocked: false,
                output: content.clone(),
                step,
                milestone,
            });
            run.transcript.push(ChatMessage::tool(&call.id, content));
        }

        if !corrections.is_empty() {
            self.inject_corrections(run, &corrections);
        }

        let Some(plan) = run.plan.as_ref() else {
            return Flow::Continue;
        };
        let Some(reason) = self.tracker.replan_trigger(plan) else {
            return Flow::Continue;
        };
        if self.tracker.is_exhausted(plan) {
            warn!(replan_count = plan.replan_count(), reason = %reason, "replan budget exhausted");
            return Flow::Finish(TerminalState::ReplanExhausted {
                replans: plan.replan_count(),
            });
        }
        self.replan(run, reason, events, cancel).await
    }

    /// Apply one executed capability to the plan, verifying milestone
    /// claims first. Returns the effective success and any validation.
    ///
    /// Only `Done` or `Cancelled` are ever returned.
    async fn fold_result(
        &self,
        plan: Option<&mut PlanState>,
        call: &CapabilityCall,
        outcome: &CapabilityOutcome,
        executed_calls: &[CapabilityCall],
        cancel: &CancellationToken,
    ) -> Suspended<(bool, Option<MilestoneValidation>)> {
        let Some(plan) = plan else {
            return Suspended::Done((outcome.success, None));
        };

        let mut succeeded = outcome.success;
        let mut detail = outcome.summary();
        let mut milestone = None;

        let step = plan
            .current_step_description()
            .filter(|step| self.validator.should_validate(step))
            .map(ToString::to_string);
        if let (true, Some(step)) = (outcome.success, step) {
            let context = MilestoneContext::new(self.workspace_root.clone(), executed_calls.to_vec());
            let validation = match guarded(
                self.validator.validate(&step, &context),
                self.capability_timeout(),
                cancel,
            )
            .await
            {
                Suspended::Done(validation) => validation,
                Suspended::TimedOut => MilestoneValidation::fail(
                    classify(&step).unwrap_or(ValidationType::Custom),
                    "milestone check timed out",
                ),
                Suspended::Cancelled => return Suspended::Cancelled,
            };
            if validation.passed {
                self.tracker.mark_milestone_validated(plan, &step);
            } else {
                info!(step = %step, message = %validation.message, "milestone claim rejected");
                succeeded = false;
                detail = format!("milestone check failed: {}", validation.message);
            }
            milestone = Some(validation);
        }

        self.tracker.update_from_result(plan, &call.name, succeeded, &detail);
        Suspended::Done((succeeded, milestone))
    }

    async fn replan(&self, run: &mut RequestRun, reason: String, events: &EventEmitter, cancel: &CancellationToken) -> Flow {
        let names = run.declared_names();
        let Some(plan) = run.plan.as_mut() else {
            return Flow::Continue;
        };

        let generated = match guarded(
            self.planner.regenerate(&run.request.text, &names, plan, &reason),
            self.model_timeout(),
            cancel,
        )
        .await
        {
            Suspended::Done(Ok(generated)) => Some(generated),
            Suspended::Done(Err(err)) => {
                warn!(error = %err, "replan generation failed; keeping the current plan");
                None
            }
            Suspended::TimedOut => {
                warn!("replan generation timed out; keeping the current plan");
                None
            }
            Suspended::Cancelled => return Flow::Finish(TerminalState::Cancelled),
        };

        let recorded = match generated {
            Some(generated) => self.tracker.record_replan(plan, &reason, generated),
            None => self.tracker.record_failed_replan(plan, &reason),
        };
        if recorded.is_err() {
            return Flow::Finish(TerminalState::ReplanExhausted {
                replans: plan.replan_count(),
            });
        }

        events.emit(ProgressEvent::PlanAdjustment {
            request_id: run.request.request_id,
            reason: reason.clone(),
            replan_count: plan.replan_count(),
            plan: plan.original_plan_text().to_string(),
        });
        run.transcript.push(ChatMessage::user(format!(
            "The plan was revised ({reason}). Continue from the first step of the new plan without repeating completed work."
        )));
        Flow::Continue
    }

    fn inject_corrections(&self, run: &mut RequestRun, corrections: &[SoftCorrection]) {
        let available = run.declared_names();
        let prompt = corrections
            .iter()
            .map(|c| c.prompt(&available))
            .collect::<Vec<_>>()
            .join("\n");
        run.soft_corrections += u32::try_from(corrections.len()).unwrap_or(u32::MAX);
        run.transcript.push(ChatMessage::user(prompt));
    }

    fn finish(&self, run: RequestRun, terminal: TerminalState, events: &EventEmitter) -> ExecutionOutcome {
        let request_id = run.request.request_id;
        match &terminal {
            TerminalState::Success { answer } => {
                info!(iterations = run.iterations, "request completed");
                events.emit(ProgressEvent::FinalAnswer {
                    request_id,
                    answer: answer.clone(),
                    iterations: run.iterations,
                });
            }
            other => {
                if matches!(other, TerminalState::Cancelled) {
                    info!(iterations = run.iterations, "request cancelled");
                } else {
                    warn!(iterations = run.iterations, terminal = %other, message = %other.message(), "request ended without an answer");
                }
                events.emit(ProgressEvent::Error {
                    request_id,
                    kind: other.error_kind().unwrap_or(ErrorKind::Failed),
                    message: other.message(),
                });
            }
        }

        ExecutionOutcome {
            request_id,
            terminal,
            iterations: run.iterations,
            analysis: run.analysis,
            plan: run.plan,
            soft_corrections: run.soft_corrections,
        }
    }

    fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.config.model_timeout_secs)
    }

    fn capability_timeout(&self) -> Duration {
        Duration::from_secs(self.config.capability_timeout_secs)
    }
}
