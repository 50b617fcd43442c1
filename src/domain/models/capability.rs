//! Capability domain model: tools, skills and invocation results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// An invocable capability (a tool, or a skill bundling other tools).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    /// JSON schema describing the parameters.
    #[serde(default)]
    pub parameter_schema: Value,
    /// When set, this capability is a skill that may only invoke the listed
    /// sub-capabilities while it is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_sub_capabilities: Option<BTreeSet<String>>,
}

impl CapabilityDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema: Value::Object(serde_json::Map::new()),
            allowed_sub_capabilities: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.parameter_schema = schema;
        self
    }

    /// Restrict this capability to the given sub-capabilities.
    pub fn with_allowed<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_sub_capabilities = Some(allowed.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_skill(&self) -> bool {
        self.allowed_sub_capabilities.is_some()
    }
}

/// An active capability-restriction scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillContext {
    pub skill: String,
    pub allowed: BTreeSet<String>,
}

impl SkillContext {
    pub fn new<I, S>(skill: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skill: skill.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn permits(&self, capability: &str) -> bool {
        self.allowed.contains(capability)
    }
}

/// A capability invocation requested by the reasoning actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityCall {
    /// Correlates the call with its result in the transcript.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub params: Value,
}

impl CapabilityCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, params: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            params,
        }
    }

    /// String value of a top-level parameter.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// Result returned by the capability execution collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOutcome {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CapabilityOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error_message: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error_message: Some(error.into()),
        }
    }

    /// Text reported back to the reasoning actor.
    pub fn summary(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            let err = self.error_message.as_deref().unwrap_or("unknown error");
            if self.output.is_empty() {
                format!("error: {err}")
            } else {
                format!("error: {err}\n{}", self.output)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_skill_descriptor() {
        let tool = CapabilityDescriptor::new("read_file", "Read a file");
        assert!(!tool.is_skill());

        let skill = CapabilityDescriptor::new("doc-writer", "Write docs")
            .with_allowed(["read_file", "write_file"]);
        assert!(skill.is_skill());
        assert_eq!(skill.allowed_sub_capabilities.as_ref().map(BTreeSet::len), Some(2));
    }

    #[test]
    fn test_skill_context_permits() {
        let ctx = SkillContext::new("doc-writer", ["A", "B"]);
        assert!(ctx.permits("A"));
        assert!(ctx.permits("B"));
        assert!(!ctx.permits("C"));
        assert!(!ctx.permits("a"));
    }

    #[test]
    fn test_call_param_str() {
        let call = CapabilityCall::new("c1", "write_file", json!({"path": "a.txt", "n": 3}));
        assert_eq!(call.param_str("path"), Some("a.txt"));
        assert_eq!(call.param_str("n"), None);
        assert_eq!(call.param_str("missing"), None);
    }

    #[test]
    fn test_outcome_summary() {
        assert_eq!(CapabilityOutcome::success("ok").summary(), "ok");
        assert_eq!(CapabilityOutcome::failure("denied").summary(), "error: denied");
    }
}
