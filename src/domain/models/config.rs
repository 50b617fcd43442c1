use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration structure for taskpilot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Execution loop limits and timeouts
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Task complexity classification
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Plan generation
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Policy document location and reload cadence
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Memory retrieval
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Milestone verification commands
    #[serde(default)]
    pub milestone: MilestoneConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Execution loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ControllerConfig {
    /// Iteration ceiling for requests without a plan
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Iteration ceiling while a plan is active
    #[serde(default = "default_max_iterations_with_plan")]
    pub max_iterations_with_plan: u32,

    /// Consecutive failures that trigger a replan
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Iterations without any completed step that trigger a replan
    #[serde(default = "default_stagnation_threshold")]
    pub stagnation_threshold: u32,

    /// Maximum replans per request
    #[serde(default = "default_max_replan_count")]
    pub max_replan_count: u32,

    /// Leading iterations in which prose-only answers to action requests are challenged
    #[serde(default = "default_tool_enforcement_iterations")]
    pub tool_enforcement_iterations: u32,

    /// Timeout for one reasoning-actor call, in seconds
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    /// Timeout for one capability invocation, in seconds
    #[serde(default = "default_capability_timeout_secs")]
    pub capability_timeout_secs: u64,
}

const fn default_max_iterations() -> u32 {
    8
}

const fn default_max_iterations_with_plan() -> u32 {
    10
}

const fn default_failure_threshold() -> u32 {
    2
}

const fn default_stagnation_threshold() -> u32 {
    3
}

const fn default_max_replan_count() -> u32 {
    2
}

const fn default_tool_enforcement_iterations() -> u32 {
    2
}

const fn default_model_timeout_secs() -> u64 {
    120
}

const fn default_capability_timeout_secs() -> u64 {
    60
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_iterations_with_plan: default_max_iterations_with_plan(),
            failure_threshold: default_failure_threshold(),
            stagnation_threshold: default_stagnation_threshold(),
            max_replan_count: default_max_replan_count(),
            tool_enforcement_iterations: default_tool_enforcement_iterations(),
            model_timeout_secs: default_model_timeout_secs(),
            capability_timeout_secs: default_capability_timeout_secs(),
        }
    }
}

/// Task analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnalyzerConfig {
    /// Score at or above which a request is complex
    #[serde(default = "default_complexity_threshold")]
    pub complexity_threshold: f64,
}

const fn default_complexity_threshold() -> f64 {
    0.6
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            complexity_threshold: default_complexity_threshold(),
        }
    }
}

/// Planner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlannerConfig {
    /// Steps requested from the model at minimum
    #[serde(default = "default_min_steps")]
    pub min_steps: usize,

    /// Plans are truncated to this many steps
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

const fn default_min_steps() -> usize {
    3
}

const fn default_max_steps() -> usize {
    7
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_steps: default_min_steps(),
            max_steps: default_max_steps(),
        }
    }
}

/// Policy document configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PolicyConfig {
    /// Path to the Markdown rule document
    #[serde(default = "default_policy_path")]
    pub path: PathBuf,

    /// Interval between change checks, in seconds
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,
}

fn default_policy_path() -> PathBuf {
    PathBuf::from(".taskpilot/POLICY.md")
}

const fn default_reload_interval_secs() -> u64 {
    5
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: default_policy_path(),
            reload_interval_secs: default_reload_interval_secs(),
        }
    }
}

/// Memory retrieval configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemoryConfig {
    /// Snippets retrieved per request
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

const fn default_top_k() -> usize {
    5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

/// Milestone verification configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MilestoneConfig {
    /// Capability used to test that a path exists
    #[serde(default = "default_file_exists_capability")]
    pub file_exists_capability: String,

    /// Capability used to run check commands
    #[serde(default = "default_command_capability")]
    pub command_capability: String,

    /// Syntax-check command per file extension; `{path}` is substituted
    #[serde(default = "default_syntax_commands")]
    pub syntax_commands: BTreeMap<String, String>,

    /// Import-test command; `{module}` is substituted
    #[serde(default = "default_import_command")]
    pub import_command: String,
}

fn default_file_exists_capability() -> String {
    "file_exists".to_string()
}

fn default_command_capability() -> String {
    "run_command".to_string()
}

fn default_syntax_commands() -> BTreeMap<String, String> {
    [
        ("py", "python3 -m py_compile {path}"),
        ("js", "node --check {path}"),
        ("mjs", "node --check {path}"),
        ("sh", "bash -n {path}"),
        ("rb", "ruby -c {path}"),
        ("json", "python3 -m json.tool {path}"),
    ]
    .into_iter()
    .map(|(ext, cmd)| (ext.to_string(), cmd.to_string()))
    .collect()
}

fn default_import_command() -> String {
    "python3 -c \"import {module}\"".to_string()
}

impl Default for MilestoneConfig {
    fn default() -> Self {
        Self {
            file_exists_capability: default_file_exists_capability(),
            command_capability: default_command_capability(),
            syntax_commands: default_syntax_commands(),
            import_command: default_import_command(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation policy for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
