//! Working-context assembly for each reasoning turn.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::models::{
    ChatMessage, ExecutionRequest, MemoryConfig, MemorySnippet, PolicyBundle, RuleKind, SkillContext,
};
use crate::domain::ports::MemoryRetriever;

/// Builds the message list sent to the reasoning actor.
///
/// Policy guidance always comes first and cannot be displaced by memory or
/// history. The memory section is built only when the policy allows it for
/// the request's context.
pub struct ContextBuilder {
    memory: Arc<dyn MemoryRetriever>,
    top_k: usize,
}

impl ContextBuilder {
    pub fn new(memory: Arc<dyn MemoryRetriever>, config: &MemoryConfig) -> Self {
        Self {
            memory,
            top_k: config.top_k,
        }
    }

    /// Whether long-term memory may be loaded for this request.
    pub fn memory_permitted(policy: &PolicyBundle, request: &ExecutionRequest) -> bool {
        !(request.shared_context && policy.forbids_shared_memory())
    }

    /// Retrieve memory snippets for the request.
    ///
    /// Returns nothing, without calling the retriever, when the policy
    /// forbids memory in a shared context. Retrieval errors degrade to an
    /// empty section.
    pub async fn load_memory(&self, request: &ExecutionRequest, policy: &PolicyBundle) -> Vec<MemorySnippet> {
        if !Self::memory_permitted(policy, request) {
            debug!(request_id = %request.request_id, "memory suppressed for shared context");
            return Vec::new();
        }
        if self.top_k == 0 {
            return Vec::new();
        }
        match self.memory.retrieve(&request.text, self.top_k).await {
            Ok(mut snippets) => {
                snippets.truncate(self.top_k);
                snippets
            }
            Err(err) => {
                warn!(request_id = %request.request_id, error = %err, "memory retrieval failed");
                Vec::new()
            }
        }
    }

    /// Render the system message.
    pub fn system_prompt(
        policy: &PolicyBundle,
        skill: Option<&SkillContext>,
        memory: &[MemorySnippet],
        plan_summary: Option<&str>,
    ) -> String {
        let mut sections = Vec::new();

        let identity = rule_lines(policy, RuleKind::Identity);
        if !identity.is_empty() {
            sections.push(format!("# Identity\n{identity}"));
        }
        let hard = rule_lines(policy, RuleKind::HardConstraint);
        if !hard.is_empty() {
            sections.push(format!(
                "# Hard Constraints\nThese are enforced by the controller and cannot be waived.\n{hard}"
            ));
        }
        let soft = rule_lines(policy, RuleKind::SoftGuideline);
        if !soft.is_empty() {
            sections.push(format!("# Guidelines\n{soft}"));
        }
        if let Some(ctx) = skill {
            let allowed: Vec<&str> = ctx.allowed.iter().map(String::as_str).collect();
            sections.push(format!(
                "# Active Skill: {}\nOnly these capabilities may be used: {}",
                ctx.skill,
                allowed.join(", ")
            ));
        }
        if !memory.is_empty() {
            let lines: Vec<String> = memory.iter().map(|m| format!("- {}", m.content)).collect();
            sections.push(format!("# Relevant Memory\n{}", lines.join("\n")));
        }
        if let Some(summary) = plan_summary {
            sections.push(summary.to_string());
        }
        sections.push(
            "Use capabilities to act; do not claim an action is done unless a capability result shows it."
                .to_string(),
        );

        sections.join("\n\n")
    }

    /// Assemble the full message list for one turn.
    pub fn build(
        request: &ExecutionRequest,
        system_prompt: String,
        transcript: &[ChatMessage],
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.history.len() + transcript.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(request.history.iter().cloned());
        messages.push(ChatMessage::user(request.text.clone()));
        messages.extend(transcript.iter().cloned());
        messages
    }
}

fn rule_lines(policy: &PolicyBundle, kind: RuleKind) -> String {
    policy
        .rules_of(kind)
        .map(|rule| format!("- {}", rule.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainResult;
    use crate::domain::models::{Rule, RuleAction};
    use crate::domain::ports::NullMemoryRetriever;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingMemory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MemoryRetriever for CountingMemory {
        async fn retrieve(&self, query: &str, top_k: usize) -> DomainResult<Vec<MemorySnippet>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..top_k + 2)
                .map(|i| MemorySnippet {
                    content: format!("{query} #{i}"),
                    score: 1.0,
                })
                .collect())
        }
    }

    fn rule(id: &str, kind: RuleKind, text: &str, action: Option<RuleAction>) -> Rule {
        Rule {
            id: id.into(),
            kind,
            source_section: "s".into(),
            text: text.into(),
            action,
        }
    }

    fn policy() -> PolicyBundle {
        PolicyBundle::new(
            vec![
                rule("identity-1", RuleKind::Identity, "You are a careful assistant", None),
                rule(
                    "hard-1",
                    RuleKind::HardConstraint,
                    "No memory in group chats",
                    Some(RuleAction::NoSharedMemory),
                ),
                rule("soft-1", RuleKind::SoftGuideline, "Prefer short answers", None),
            ],
            "h",
        )
    }

    #[tokio::test]
    async fn test_shared_context_never_calls_retriever() {
        let memory = Arc::new(CountingMemory::default());
        let builder = ContextBuilder::new(memory.clone(), &MemoryConfig::default());

        let request = ExecutionRequest::new("hello").shared();
        assert!(builder.load_memory(&request, &policy()).await.is_empty());
        assert_eq!(memory.calls.load(Ordering::SeqCst), 0);

        let private = ExecutionRequest::new("hello");
        assert_eq!(builder.load_memory(&private, &policy()).await.len(), 5);
        assert_eq!(memory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shared_context_allowed_without_rule() {
        let memory = Arc::new(CountingMemory::default());
        let builder = ContextBuilder::new(memory.clone(), &MemoryConfig::default());
        let request = ExecutionRequest::new("hello").shared();
        assert!(!builder.load_memory(&request, &PolicyBundle::empty()).await.is_empty());
    }

    #[tokio::test]
    async fn test_null_retriever_leaves_memory_section_out() {
        let builder = ContextBuilder::new(Arc::new(NullMemoryRetriever::new()), &MemoryConfig::default());
        let memory = builder.load_memory(&ExecutionRequest::new("hello"), &policy()).await;
        assert!(memory.is_empty());
        let prompt = ContextBuilder::system_prompt(&policy(), None, &memory, None);
        assert!(!prompt.contains("# Relevant Memory"));
    }

    #[test]
    fn test_system_prompt_sections() {
        let skill = SkillContext::new("doc-writer", ["read_file"]);
        let memory = [MemorySnippet {
            content: "user prefers YAML".into(),
            score: 0.9,
        }];
        let prompt = ContextBuilder::system_prompt(&policy(), Some(&skill), &memory, Some("## Plan Progress"));

        let identity = prompt.find("# Identity").expect("identity");
        let hard = prompt.find("# Hard Constraints").expect("hard");
        let plan = prompt.find("## Plan Progress").expect("plan");
        assert!(identity < hard && hard < plan);
        assert!(prompt.contains("- Prefer short answers"));
        assert!(prompt.contains("Only these capabilities may be used: read_file"));
        assert!(prompt.contains("- user prefers YAML"));
    }

    #[test]
    fn test_build_orders_messages() {
        let request = ExecutionRequest::new("now").with_history(vec![ChatMessage::user("before")]);
        let transcript = [ChatMessage::assistant("thinking")];
        let messages = ContextBuilder::build(&request, "sys".into(), &transcript);
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["sys", "before", "now", "thinking"]);
    }
}
