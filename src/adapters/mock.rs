//! In-memory collaborators for tests, demos and the CLI.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CapabilityCall, CapabilityDescriptor, CapabilityOutcome, ChatMessage, ModelResponse,
};
use crate::domain::ports::{CapabilityExecutor, ModelClient};

#[derive(Debug, Clone)]
enum ScriptedReply {
    Respond(ModelResponse),
    Fail(String),
    Delayed(Duration, ModelResponse),
}

/// Model client that replays a queue of scripted replies.
///
/// Planner calls and reasoning turns share the queue, in call order. When
/// the queue is empty the fallback response is returned.
pub struct ScriptedModelClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    fallback: ModelResponse,
    requests: Arc<RwLock<Vec<Vec<ChatMessage>>>>,
    declared: Arc<RwLock<Vec<Vec<String>>>>,
}

impl ScriptedModelClient {
    pub fn new() -> Self {
        Self::with_fallback(ModelResponse::text("Done."))
    }

    pub fn with_fallback(fallback: ModelResponse) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback,
            requests: Arc::new(RwLock::new(Vec::new())),
            declared: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn push_response(&self, response: ModelResponse) {
        self.replies.lock().await.push_back(ScriptedReply::Respond(response));
    }

    pub async fn push_text(&self, text: impl Into<String>) {
        self.push_response(ModelResponse::text(text)).await;
    }

    pub async fn push_calls(&self, text: impl Into<String>, calls: Vec<CapabilityCall>) {
        self.push_response(ModelResponse::with_calls(text, calls)).await;
    }

    pub async fn push_error(&self, message: impl Into<String>) {
        self.replies.lock().await.push_back(ScriptedReply::Fail(message.into()));
    }

    /// Reply with `response` only after `delay` has elapsed.
    pub async fn push_delayed(&self, delay: Duration, response: ModelResponse) {
        self.replies
            .lock()
            .await
            .push_back(ScriptedReply::Delayed(delay, response));
    }

    /// Every message list the client was called with, in order.
    pub async fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.read().await.clone()
    }

    /// Capability names declared on each call, in order.
    pub async fn declared_capabilities(&self) -> Vec<Vec<String>> {
        self.declared.read().await.clone()
    }

    pub async fn remaining(&self) -> usize {
        self.replies.lock().await.len()
    }
}

impl Default for ScriptedModelClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        capabilities: &[CapabilityDescriptor],
    ) -> DomainResult<ModelResponse> {
        self.requests.write().await.push(messages.to_vec());
        self.declared
            .write()
            .await
            .push(capabilities.iter().map(|c| c.name.clone()).collect());

        let reply = self.replies.lock().await.pop_front();
        match reply {
            Some(ScriptedReply::Respond(response)) => Ok(response),
            Some(ScriptedReply::Fail(message)) => Err(DomainError::ModelCall(message)),
            Some(ScriptedReply::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Capability executor backed by an in-memory file set.
///
/// `file_exists` checks the set, `write_file` adds its `path` to it, and any
/// other capability succeeds unless an outcome was configured for it.
/// Queued outcomes are consumed first, then the per-capability default.
pub struct MockCapabilityExecutor {
    files: RwLock<HashSet<String>>,
    queued: RwLock<HashMap<String, VecDeque<CapabilityOutcome>>>,
    defaults: RwLock<HashMap<String, CapabilityOutcome>>,
    delays: RwLock<HashMap<String, Duration>>,
    invocations: RwLock<Vec<(String, Value)>>,
}

impl MockCapabilityExecutor {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashSet::new()),
            queued: RwLock::new(HashMap::new()),
            defaults: RwLock::new(HashMap::new()),
            delays: RwLock::new(HashMap::new()),
            invocations: RwLock::new(Vec::new()),
        }
    }

    pub async fn add_file(&self, path: impl Into<String>) {
        self.files.write().await.insert(path.into());
    }

    pub async fn has_file(&self, path: &str) -> bool {
        self.files.read().await.contains(path)
    }

    /// Outcome returned for `name` whenever nothing is queued.
    pub async fn set_outcome(&self, name: impl Into<String>, outcome: CapabilityOutcome) {
        self.defaults.write().await.insert(name.into(), outcome);
    }

    /// Outcome returned once for `name`, ahead of the default.
    pub async fn push_outcome(&self, name: impl Into<String>, outcome: CapabilityOutcome) {
        self.queued
            .write()
            .await
            .entry(name.into())
            .or_default()
            .push_back(outcome);
    }

    pub async fn set_delay(&self, name: impl Into<String>, delay: Duration) {
        self.delays.write().await.insert(name.into(), delay);
    }

    /// Every invocation, in order.
    pub async fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.read().await.clone()
    }

    pub async fn invocation_names(&self) -> Vec<String> {
        self.invocations
            .read()
            .await
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    async fn builtin(&self, name: &str, params: &Value) -> CapabilityOutcome {
        let path = params.get("path").and_then(Value::as_str);
        match (name, path) {
            ("file_exists", Some(path)) => {
                if self.has_file(path).await {
                    CapabilityOutcome::success(format!("{path} exists"))
                } else {
                    CapabilityOutcome::failure(format!("{path} does not exist"))
                }
            }
            ("file_exists", None) => CapabilityOutcome::failure("missing path parameter"),
            _ => CapabilityOutcome::success(format!("{name} ok")),
        }
    }
}

impl Default for MockCapabilityExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapabilityExecutor for MockCapabilityExecutor {
    async fn invoke(&self, name: &str, params: &Value) -> DomainResult<CapabilityOutcome> {
        self.invocations
            .write()
            .await
            .push((name.to_string(), params.clone()));

        let delay = self.delays.read().await.get(name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self
            .queued
            .write()
            .await
            .get_mut(name)
            .and_then(VecDeque::pop_front);
        let configured = match queued {
            Some(outcome) => Some(outcome),
            None => self.defaults.read().await.get(name).cloned(),
        };
        let outcome = match configured {
            Some(outcome) => outcome,
            None => self.builtin(name, params).await,
        };

        if name == "write_file" && outcome.success {
            if let Some(path) = params.get("path").and_then(Value::as_str) {
                self.add_file(path).await;
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_replies_then_fallback() {
        let client = ScriptedModelClient::new();
        client.push_text("first").await;
        client.push_error("down").await;

        let messages = [ChatMessage::user("hi")];
        assert_eq!(client.chat(&messages, &[]).await.expect("reply").text, "first");
        assert!(matches!(client.chat(&messages, &[]).await, Err(DomainError::ModelCall(_))));
        assert_eq!(client.chat(&messages, &[]).await.expect("fallback").text, "Done.");
        assert_eq!(client.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_write_then_exists() {
        let executor = MockCapabilityExecutor::new();
        let params = json!({"path": "a.txt"});
        assert!(!executor.invoke("file_exists", &params).await.expect("invoke").success);
        assert!(executor.invoke("write_file", &params).await.expect("invoke").success);
        assert!(executor.invoke("file_exists", &params).await.expect("invoke").success);
    }

    #[tokio::test]
    async fn test_queued_outcomes_precede_default() {
        let executor = MockCapabilityExecutor::new();
        executor.set_outcome("run_command", CapabilityOutcome::success("ok")).await;
        executor
            .push_outcome("run_command", CapabilityOutcome::failure("boom"))
            .await;

        let params = json!({});
        assert!(!executor.invoke("run_command", &params).await.expect("invoke").success);
        assert!(executor.invoke("run_command", &params).await.expect("invoke").success);
        assert_eq!(executor.invocation_names().await, ["run_command", "run_command"]);
    }
}
