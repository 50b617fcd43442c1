//! Shared fixtures for the controller integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use taskpilot::adapters::{MockCapabilityExecutor, ScriptedModelClient};
use taskpilot::domain::models::{
    CapabilityCall, CapabilityDescriptor, Config, ExecutionOutcome, ExecutionRequest, MemorySnippet,
    PolicyBundle, ProgressEvent,
};
use taskpilot::domain::ports::MemoryRetriever;
use taskpilot::services::policy_store::parse_policy;
use taskpilot::services::{CapabilityRegistry, EventEmitter, ExecutionLoop, PolicyStore};
use taskpilot::DomainResult;

pub const COMPLEX_REQUEST: &str = "先分析项目结构，然后创建配置文件，最后验证";

pub const BASE_POLICY: &str = "# Identity
- A careful engineering assistant

## Hard Constraints
- Stay inside the workspace

## Guidelines
- Prefer short answers
";

/// Memory retriever that counts calls and always returns one snippet.
#[derive(Default)]
pub struct CountingMemory {
    calls: AtomicUsize,
}

impl CountingMemory {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MemoryRetriever for CountingMemory {
    async fn retrieve(&self, _query: &str, _top_k: usize) -> DomainResult<Vec<MemorySnippet>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![MemorySnippet {
            content: "the user prefers YAML configs".to_string(),
            score: 0.9,
        }])
    }
}

pub fn policy(extra_hard: &[&str]) -> PolicyBundle {
    let mut content = BASE_POLICY.replace(
        "- Stay inside the workspace\n",
        &format!(
            "- Stay inside the workspace\n{}",
            extra_hard.iter().map(|r| format!("- {r}\n")).collect::<String>()
        ),
    );
    content.push('\n');
    parse_policy(&content, "POLICY.md").expect("test policy parses")
}

pub fn capabilities() -> Vec<CapabilityDescriptor> {
    vec![
        CapabilityDescriptor::new("read_file", "Read a file"),
        CapabilityDescriptor::new("write_file", "Write a file"),
        CapabilityDescriptor::new("list_dir", "List a directory"),
        CapabilityDescriptor::new("shell_exec", "Run a shell command"),
        CapabilityDescriptor::new("file_exists", "Check that a path exists"),
        CapabilityDescriptor::new("run_command", "Run a command and report its exit status"),
        CapabilityDescriptor::new("doc-writer", "Write documentation")
            .with_allowed(["read_file", "write_file"]),
    ]
}

pub fn call(id: &str, name: &str, params: Value) -> CapabilityCall {
    CapabilityCall::new(id, name, params)
}

pub fn read(id: &str, path: &str) -> CapabilityCall {
    call(id, "read_file", json!({ "path": path }))
}

pub struct Harness {
    pub model: Arc<ScriptedModelClient>,
    pub executor: Arc<MockCapabilityExecutor>,
    pub memory: Arc<CountingMemory>,
    pub controller: ExecutionLoop,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Config::default(), policy(&[]), ScriptedModelClient::new())
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, policy(&[]), ScriptedModelClient::new())
    }

    pub fn with_policy(bundle: PolicyBundle) -> Self {
        Self::build(Config::default(), bundle, ScriptedModelClient::new())
    }

    pub fn build(config: Config, bundle: PolicyBundle, model: ScriptedModelClient) -> Self {
        let model = Arc::new(model);
        let executor = Arc::new(MockCapabilityExecutor::new());
        let memory = Arc::new(CountingMemory::default());
        let controller = ExecutionLoop::new(
            &config,
            Arc::new(PolicyStore::from_bundle("POLICY.md", bundle)),
            Arc::new(CapabilityRegistry::with_capabilities(capabilities())),
            Arc::clone(&model) as _,
            Arc::clone(&executor) as _,
            Arc::clone(&memory) as _,
        );
        Self {
            model,
            executor,
            memory,
            controller,
        }
    }

    pub async fn run(&self, request: ExecutionRequest) -> (ExecutionOutcome, Vec<ProgressEvent>) {
        self.run_with(request, CancellationToken::new()).await
    }

    pub async fn run_with(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> (ExecutionOutcome, Vec<ProgressEvent>) {
        let (events, rx) = EventEmitter::channel();
        let outcome = self.controller.run(request, &events, cancel).await;
        drop(events);
        (outcome, drain(rx))
    }
}

pub fn drain(mut rx: UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Asserts the stream holds exactly one terminal event and that it is last.
pub fn assert_single_terminal(events: &[ProgressEvent]) {
    let terminal = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminal, 1, "expected exactly one terminal event, got {events:?}");
    assert!(events.last().is_some_and(ProgressEvent::is_terminal));
}

pub fn event_types(events: &[ProgressEvent]) -> Vec<&'static str> {
    events.iter().map(ProgressEvent::event_type).collect()
}

pub fn tool_results(events: &[ProgressEvent]) -> Vec<&ProgressEvent> {
    events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::ToolResult { .. }))
        .collect()
}
