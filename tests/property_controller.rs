use proptest::prelude::*;
use std::sync::Arc;

use taskpilot::adapters::MockCapabilityExecutor;
use taskpilot::domain::models::{
    CapabilityDescriptor, MilestoneConfig, PlanState, PolicyBundle, SkillContext,
};
use taskpilot::services::milestone_validator::{FILE_KEYWORDS, IMPORT_KEYWORDS, SYNTAX_KEYWORDS};
use taskpilot::services::{
    CapabilityRegistry, CapabilitySet, GeneratedPlan, MilestoneValidator, PlanTracker, PlanTrackerConfig,
};
use taskpilot::DomainError;

fn plan(steps: usize) -> PlanState {
    GeneratedPlan::from_steps((1..=steps).map(|i| format!("step {i}")).collect()).into_state()
}

fn tracker(failure_threshold: u32, stagnation_threshold: u32, max_replan_count: u32) -> PlanTracker {
    PlanTracker::new(PlanTrackerConfig {
        failure_threshold,
        stagnation_threshold,
        max_replan_count,
    })
}

fn registry_snapshot(names: &[String]) -> Arc<CapabilitySet> {
    CapabilityRegistry::with_capabilities(
        names
            .iter()
            .map(|name| CapabilityDescriptor::new(name.clone(), "generated")),
    )
    .snapshot()
}

/// Whole-word lookup for ASCII keywords, substring lookup for CJK ones.
fn mentions(step: &str, keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return step.contains(keyword);
    }
    step.split(|c: char| !c.is_ascii_alphanumeric()).any(|w| w == keyword)
}

fn all_keywords() -> impl Iterator<Item = &'static str> {
    SYNTAX_KEYWORDS
        .iter()
        .chain(IMPORT_KEYWORDS)
        .chain(FILE_KEYWORDS)
        .copied()
}

proptest! {
    /// Property: the replan count never exceeds the ceiling, and once it
    /// is reached no further replan is requested.
    #[test]
    fn prop_replan_count_bounded(
        outcomes in prop::collection::vec(any::<bool>(), 0..60),
        max_replans in 0u32..5,
    ) {
        let tracker = tracker(2, 3, max_replans);
        let mut state = plan(3);

        for succeeded in outcomes {
            tracker.record_iteration(&mut state);
            tracker.update_from_result(&mut state, "read_file", succeeded, "out");

            let (replan, reason) = tracker.should_replan(&state);
            if replan {
                prop_assert!(!reason.is_empty());
                tracker
                    .record_replan(&mut state, &reason, GeneratedPlan::from_steps(vec!["retry".into()]))
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }
            prop_assert!(state.replan_count() <= max_replans);
            if state.replan_count() == max_replans {
                prop_assert!(!tracker.should_replan(&state).0);
            }
        }
    }

    /// Property: a success always clears the failure streak, whatever
    /// came before, and a second success keeps it cleared.
    #[test]
    fn prop_success_resets_failures(failures in 0usize..20) {
        let tracker = tracker(100, 100, 2);
        let mut state = plan(5);

        for _ in 0..failures {
            tracker.update_from_result(&mut state, "run_command", false, "exit 1");
        }
        prop_assert_eq!(state.consecutive_failure_count() as usize, failures);

        tracker.update_from_result(&mut state, "run_command", true, "ok");
        prop_assert_eq!(state.consecutive_failure_count(), 0);
        tracker.update_from_result(&mut state, "run_command", true, "ok");
        prop_assert_eq!(state.consecutive_failure_count(), 0);
    }

    /// Property: stagnation never fires once anything has been completed.
    #[test]
    fn prop_stagnation_requires_no_progress(iterations in 1u32..500, stagnation in 1u32..10) {
        let tracker = tracker(3, stagnation, 2);
        let mut state = plan(3);

        tracker.record_iteration(&mut state);
        tracker.update_from_result(&mut state, "write_file", true, "ok");
        for _ in 0..iterations {
            tracker.record_iteration(&mut state);
        }
        prop_assert!(tracker.replan_trigger(&state).is_none());
    }

    /// Property: inside a skill context, a name outside the allow-list is
    /// refused even when it is registered.
    #[test]
    fn prop_allow_list_enforced(
        name in "[a-z_]{1,12}",
        extra in prop::collection::vec("[a-z_]{1,12}", 0..5),
    ) {
        let allowed = ["read_file", "write_file"];
        let mut names: Vec<String> = allowed.iter().map(ToString::to_string).collect();
        names.push(name.clone());
        names.extend(extra);
        let set = registry_snapshot(&names);
        let skill = SkillContext::new("doc-writer", allowed);
        let policy = PolicyBundle::empty();

        let verdict = set.authorize(&name, Some(&skill), &policy);
        if allowed.contains(&name.as_str()) {
            prop_assert!(verdict.is_ok());
        } else {
            let is_not_allowed = matches!(verdict, Err(DomainError::CapabilityNotAllowed { .. }));
            prop_assert!(is_not_allowed);
        }
        prop_assert!(set
            .declared(Some(&skill), &policy)
            .iter()
            .all(|d| allowed.contains(&d.name.as_str())));
    }

    /// Property: a step is validated exactly when it mentions a milestone
    /// keyword as a whole word.
    #[test]
    fn prop_validation_gated_by_keywords(step in "[a-z .]{0,40}") {
        let validator = MilestoneValidator::new(
            Arc::new(MockCapabilityExecutor::new()),
            MilestoneConfig::default(),
        );
        let expected = all_keywords().any(|k| mentions(&step, k));
        prop_assert_eq!(validator.should_validate(&step), expected);
    }

    /// Property: inserting any keyword as its own word makes the step
    /// validated.
    #[test]
    fn prop_keyword_always_triggers_validation(
        prefix in "[a-z ]{0,20}",
        suffix in "[a-z ]{0,20}",
        index in 0usize..16,
    ) {
        let keywords: Vec<&str> = all_keywords().collect();
        let keyword = keywords[index % keywords.len()];
        let validator = MilestoneValidator::new(
            Arc::new(MockCapabilityExecutor::new()),
            MilestoneConfig::default(),
        );
        let input = format!("{prefix} {keyword} {suffix}");
        prop_assert!(validator.should_validate(&input));
    }

    /// Property: an ASCII keyword glued to other letters is not a mention.
    #[test]
    fn prop_embedded_keyword_does_not_validate(
        prefix in "[a-z]{1,6}",
        suffix in "[a-z]{1,6}",
        index in 0usize..16,
    ) {
        let ascii: Vec<&str> = all_keywords().filter(|k| k.is_ascii()).collect();
        let keyword = ascii[index % ascii.len()];
        let step = format!("{prefix}{keyword}{suffix}");
        let validator = MilestoneValidator::new(
            Arc::new(MockCapabilityExecutor::new()),
            MilestoneConfig::default(),
        );
        prop_assert!(!validator.should_validate(&step));
    }
}
