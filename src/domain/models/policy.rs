//! Policy domain model.
//!
//! A [`PolicyBundle`] is an immutable snapshot of the rule document. It is
//! rebuilt wholesale whenever the document's content hash changes and is
//! shared read-only between concurrent requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a rule is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Enforced mechanically by the controller.
    HardConstraint,
    /// Injected as advisory context only.
    SoftGuideline,
    /// Persona and tone rules for the reasoning actor.
    Identity,
}

impl RuleKind {
    /// Prefix used for generated rule ids (`hard-1`, `soft-2`, ...).
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::HardConstraint => "hard",
            Self::SoftGuideline => "soft",
            Self::Identity => "identity",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardConstraint => write!(f, "hard_constraint"),
            Self::SoftGuideline => write!(f, "soft_guideline"),
            Self::Identity => write!(f, "identity"),
        }
    }
}

/// Executable action attached to a hard constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "arg", rename_all = "snake_case")]
pub enum RuleAction {
    /// Refuse every invocation of the named capability.
    DenyCapability(String),
    /// Never load long-term memory into a shared context.
    NoSharedMemory,
    /// Lower the per-request iteration ceiling.
    MaxIterations(u32),
}

impl RuleAction {
    /// Parse an action tag body (`name` or `name:arg`).
    pub fn parse(name: &str, arg: Option<&str>) -> Result<Self, String> {
        let arg = arg.map(str::trim).filter(|a| !a.is_empty());
        match (name.trim(), arg) {
            ("deny_capability", Some(capability)) => Ok(Self::DenyCapability(capability.to_string())),
            ("deny_capability", None) => Err("deny_capability requires a capability name".to_string()),
            ("no_shared_memory", None) => Ok(Self::NoSharedMemory),
            ("no_shared_memory", Some(_)) => Err("no_shared_memory takes no argument".to_string()),
            ("max_iterations", Some(n)) => match n.parse::<u32>() {
                Ok(limit) if limit > 0 => Ok(Self::MaxIterations(limit)),
                _ => Err(format!("max_iterations requires a positive integer, got '{n}'")),
            },
            ("max_iterations", None) => Err("max_iterations requires a limit".to_string()),
            (other, _) => Err(format!("unknown action '{other}'")),
        }
    }
}

/// A single rule extracted from the policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub kind: RuleKind,
    /// Heading of the section the rule was found under.
    pub source_section: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,
}

/// Immutable, hash-stamped set of rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyBundle {
    rules: Vec<Rule>,
    content_hash: String,
    loaded_at: DateTime<Utc>,
}

impl PolicyBundle {
    pub fn new(rules: Vec<Rule>, content_hash: impl Into<String>) -> Self {
        Self {
            rules,
            content_hash: content_hash.into(),
            loaded_at: Utc::now(),
        }
    }

    /// A bundle with no rules, used before any document has been loaded.
    pub fn empty() -> Self {
        Self::new(Vec::new(), "")
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules_of(&self, kind: RuleKind) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.kind == kind)
    }

    pub fn hard_constraints(&self) -> impl Iterator<Item = &Rule> {
        self.rules_of(RuleKind::HardConstraint)
    }

    pub fn soft_guidelines(&self) -> impl Iterator<Item = &Rule> {
        self.rules_of(RuleKind::SoftGuideline)
    }

    pub fn identity_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules_of(RuleKind::Identity)
    }

    fn actions(&self) -> impl Iterator<Item = (&Rule, &RuleAction)> {
        self.hard_constraints()
            .filter_map(|r| r.action.as_ref().map(|a| (r, a)))
    }

    /// The hard constraint that denies `capability`, if any.
    pub fn denying_rule(&self, capability: &str) -> Option<&Rule> {
        self.actions()
            .find(|(_, action)| matches!(action, RuleAction::DenyCapability(name) if name == capability))
            .map(|(rule, _)| rule)
    }

    /// Whether shared contexts must be built without long-term memory.
    pub fn forbids_shared_memory(&self) -> bool {
        self.actions()
            .any(|(_, action)| matches!(action, RuleAction::NoSharedMemory))
    }

    /// The tightest iteration ceiling imposed by policy.
    pub fn iteration_cap(&self) -> Option<u32> {
        self.actions()
            .filter_map(|(_, action)| match action {
                RuleAction::MaxIterations(n) => Some(*n),
                _ => None,
            })
            .min()
    }
}

impl Default for PolicyBundle {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, kind: RuleKind, action: Option<RuleAction>) -> Rule {
        Rule {
            id: id.to_string(),
            kind,
            source_section: "Test".to_string(),
            text: format!("rule {id}"),
            action,
        }
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(
            RuleAction::parse("deny_capability", Some(" shell_exec ")),
            Ok(RuleAction::DenyCapability("shell_exec".into()))
        );
        assert_eq!(RuleAction::parse("no_shared_memory", None), Ok(RuleAction::NoSharedMemory));
        assert_eq!(RuleAction::parse("max_iterations", Some("5")), Ok(RuleAction::MaxIterations(5)));
        assert!(RuleAction::parse("max_iterations", Some("0")).is_err());
        assert!(RuleAction::parse("max_iterations", Some("many")).is_err());
        assert!(RuleAction::parse("deny_capability", None).is_err());
        assert!(RuleAction::parse("launch_rockets", None).is_err());
    }

    #[test]
    fn test_bundle_queries() {
        let bundle = PolicyBundle::new(
            vec![
                rule("hard-1", RuleKind::HardConstraint, Some(RuleAction::DenyCapability("shell".into()))),
                rule("hard-2", RuleKind::HardConstraint, Some(RuleAction::MaxIterations(6))),
                rule("hard-3", RuleKind::HardConstraint, Some(RuleAction::MaxIterations(4))),
                rule("soft-1", RuleKind::SoftGuideline, None),
                rule("identity-1", RuleKind::Identity, None),
            ],
            "abc",
        );

        assert_eq!(bundle.len(), 5);
        assert_eq!(bundle.hard_constraints().count(), 3);
        assert_eq!(bundle.soft_guidelines().count(), 1);
        assert_eq!(bundle.identity_rules().count(), 1);
        assert_eq!(bundle.denying_rule("shell").map(|r| r.id.as_str()), Some("hard-1"));
        assert!(bundle.denying_rule("read_file").is_none());
        assert_eq!(bundle.iteration_cap(), Some(4));
        assert!(!bundle.forbids_shared_memory());
    }

    #[test]
    fn test_empty_bundle() {
        let bundle = PolicyBundle::empty();
        assert!(bundle.is_empty());
        assert_eq!(bundle.content_hash(), "");
        assert!(bundle.iteration_cap().is_none());
    }
}
