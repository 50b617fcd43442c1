//! Deterministic verification of claimed plan milestones.
//!
//! Validation is opt-in by keyword: a step whose text mentions file
//! creation, syntax checking or import testing is checked through the
//! capability executor; every other step passes as `custom`.

use regex::Regex;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use crate::domain::models::{CapabilityCall, MilestoneConfig, MilestoneValidation, ValidationType};
use crate::domain::ports::CapabilityExecutor;
use crate::services::task_analyzer::{ascii_words, keyword_matches};

/// Keywords that mark a step as a syntax-check milestone.
pub const SYNTAX_KEYWORDS: &[&str] = &["语法检查", "语法", "编译", "syntax", "compile"];
/// Keywords that mark a step as an import-test milestone.
pub const IMPORT_KEYWORDS: &[&str] = &["导入", "import"];
/// Keywords that mark a step as a file-creation milestone.
pub const FILE_KEYWORDS: &[&str] = &["创建", "新建", "生成", "写入", "保存", "create", "write", "generate", "save"];

static PATH_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9_~][A-Za-z0-9_\-./~]*\.[A-Za-z][A-Za-z0-9]{0,7}").expect("path regex is valid")
});

static MODULE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bimport\b|导入|\bmodule\b|模块)\s*[`'\x22]?([A-Za-z_][A-Za-z0-9_.]*)")
        .expect("module regex is valid")
});

const PATH_PARAM_KEYS: &[&str] = &["path", "file", "file_path", "filename"];

/// Evidence available when validating a step.
#[derive(Debug, Clone, Default)]
pub struct MilestoneContext {
    /// Relative paths are resolved against this directory when set.
    pub workspace_root: Option<PathBuf>,
    /// Capability calls executed in the current iteration, in order.
    pub recent_calls: Vec<CapabilityCall>,
}

impl MilestoneContext {
    pub fn new(workspace_root: Option<PathBuf>, recent_calls: Vec<CapabilityCall>) -> Self {
        Self {
            workspace_root,
            recent_calls,
        }
    }

    fn param_paths(&self) -> Vec<String> {
        self.recent_calls
            .iter()
            .flat_map(|call| PATH_PARAM_KEYS.iter().filter_map(|k| call.param_str(k)))
            .map(ToString::to_string)
            .collect()
    }
}

/// Decide which check, if any, a step description calls for.
///
/// ASCII keywords match whole words, so "important" is not an import.
/// When several keyword groups match, the strongest check wins:
/// syntax check, then import test, then file existence.
pub fn classify(step: &str) -> Option<ValidationType> {
    let lower = step.to_lowercase();
    let words = ascii_words(&lower);
    let hit = |keywords: &[&str]| keywords.iter().any(|k| keyword_matches(&lower, &words, k));
    if hit(SYNTAX_KEYWORDS) {
        Some(ValidationType::SyntaxCheck)
    } else if hit(IMPORT_KEYWORDS) {
        Some(ValidationType::ImportTest)
    } else if hit(FILE_KEYWORDS) {
        Some(ValidationType::FileExists)
    } else {
        None
    }
}

/// File paths mentioned in free text, in order of appearance.
pub fn extract_paths(text: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for m in PATH_TOKEN.find_iter(text) {
        let candidate = m.as_str().trim_end_matches('.');
        if text[..m.start()].ends_with("//")
            || is_abbreviation(candidate)
            || paths.iter().any(|p| p == candidate)
        {
            continue;
        }
        paths.push(candidate.to_string());
    }
    paths
}

/// Dotted single letters such as `e.g` or `i.e` are prose, not files.
fn is_abbreviation(candidate: &str) -> bool {
    !candidate.contains('/') && candidate.split('.').all(|segment| segment.chars().count() <= 1)
}

pub struct MilestoneValidator {
    executor: Arc<dyn CapabilityExecutor>,
    config: MilestoneConfig,
}

impl MilestoneValidator {
    pub fn new(executor: Arc<dyn CapabilityExecutor>, config: MilestoneConfig) -> Self {
        Self { executor, config }
    }

    /// True iff the step mentions at least one milestone keyword.
    pub fn should_validate(&self, step: &str) -> bool {
        classify(step).is_some()
    }

    /// Check a completion claim for `step`.
    pub async fn validate(&self, step: &str, context: &MilestoneContext) -> MilestoneValidation {
        let validation = match classify(step) {
            Some(ValidationType::FileExists) => self.check_files_exist(step, context).await,
            Some(ValidationType::SyntaxCheck) => self.check_syntax(step, context).await,
            Some(ValidationType::ImportTest) => self.check_import(step, context).await,
            Some(ValidationType::Custom) | None => {
                MilestoneValidation::pass(ValidationType::Custom, "no verification required")
            }
        };
        debug!(
            step,
            validation_type = %validation.validation_type,
            passed = validation.passed,
            message = %validation.message,
            "milestone validated"
        );
        validation
    }

    /// Paths named by the step, else paths the iteration's calls touched.
    fn target_paths(&self, step: &str, context: &MilestoneContext) -> Vec<String> {
        let from_step = extract_paths(step);
        let paths = if from_step.is_empty() {
            context.param_paths()
        } else {
            from_step
        };
        paths
            .into_iter()
            .map(|p| match &context.workspace_root {
                Some(root) if !p.starts_with('/') && !p.starts_with('~') => {
                    root.join(&p).display().to_string()
                }
                _ => p,
            })
            .collect()
    }

    async fn check_files_exist(&self, step: &str, context: &MilestoneContext) -> MilestoneValidation {
        let kind = ValidationType::FileExists;
        let paths = self.target_paths(step, context);
        if paths.is_empty() {
            return MilestoneValidation::fail(kind, "no file path found to verify the claimed creation");
        }

        let mut missing = Vec::new();
        for path in &paths {
            match self
                .executor
                .invoke(&self.config.file_exists_capability, &json!({ "path": path }))
                .await
            {
                Ok(outcome) if outcome.success => {}
                Ok(_) => missing.push(path.clone()),
                Err(err) => {
                    warn!(path = %path, error = %err, "file existence check could not run");
                    return MilestoneValidation::fail(kind, format!("could not check {path}: {err}"));
                }
            }
        }

        if missing.is_empty() {
            MilestoneValidation::pass(kind, format!("verified: {}", paths.join(", ")))
        } else {
            MilestoneValidation::fail(kind, format!("file not found: {}", missing.join(", ")))
        }
    }

    async fn check_syntax(&self, step: &str, context: &MilestoneContext) -> MilestoneValidation {
        let kind = ValidationType::SyntaxCheck;
        let paths = self.target_paths(step, context);
        if paths.is_empty() {
            return MilestoneValidation::fail(kind, "no file found to syntax-check");
        }

        let mut checked = Vec::new();
        for path in &paths {
            let Some(template) = extension(path).and_then(|ext| self.config.syntax_commands.get(&ext)) else {
                debug!(path = %path, "no syntax checker configured for extension");
                continue;
            };
            let command = template.replace("{path}", path);
            if let Err(message) = self.run_check(&command).await {
                return MilestoneValidation::fail(kind, format!("syntax check failed for {path}: {message}"));
            }
            checked.push(path.clone());
        }

        if checked.is_empty() {
            MilestoneValidation::pass(kind, "no syntax checker configured for these files")
        } else {
            MilestoneValidation::pass(kind, format!("syntax ok: {}", checked.join(", ")))
        }
    }

    async fn check_import(&self, step: &str, context: &MilestoneContext) -> MilestoneValidation {
        let kind = ValidationType::ImportTest;
        let module = MODULE_NAME
            .captures(step)
            .map(|caps| caps[1].to_string())
            .or_else(|| {
                self.target_paths(step, context)
                    .iter()
                    .find(|p| extension(p).as_deref() == Some("py"))
                    .and_then(|p| {
                        std::path::Path::new(p)
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                    })
            });
        let Some(module) = module else {
            return MilestoneValidation::fail(kind, "no module name found to import");
        };

        let command = self.config.import_command.replace("{module}", &module);
        match self.run_check(&command).await {
            Ok(()) => MilestoneValidation::pass(kind, format!("imported {module}")),
            Err(message) => MilestoneValidation::fail(kind, format!("import of {module} failed: {message}")),
        }
    }

    async fn run_check(&self, command: &str) -> Result<(), String> {
        match self
            .executor
            .invoke(&self.config.command_capability, &json!({ "command": command }))
            .await
        {
            Ok(outcome) if outcome.success => Ok(()),
            Ok(outcome) => Err(outcome.summary()),
            Err(err) => Err(err.to_string()),
        }
    }
}

fn extension(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockCapabilityExecutor;
    use crate::domain::models::CapabilityOutcome;

    fn validator(executor: Arc<MockCapabilityExecutor>) -> MilestoneValidator {
        MilestoneValidator::new(executor, MilestoneConfig::default())
    }

    #[test]
    fn test_classify_bilingual() {
        assert_eq!(classify("创建配置文件"), Some(ValidationType::FileExists));
        assert_eq!(classify("Create config.yaml"), Some(ValidationType::FileExists));
        assert_eq!(classify("对 main.py 做语法检查"), Some(ValidationType::SyntaxCheck));
        assert_eq!(classify("Run a SYNTAX check"), Some(ValidationType::SyntaxCheck));
        assert_eq!(classify("导入 utils 模块"), Some(ValidationType::ImportTest));
        assert_eq!(classify("分析项目结构"), None);
        assert_eq!(classify("Explore the repository"), None);
    }

    #[test]
    fn test_classify_priority() {
        assert_eq!(classify("create main.py and check its syntax"), Some(ValidationType::SyntaxCheck));
        assert_eq!(classify("write app.py then import app"), Some(ValidationType::ImportTest));
    }

    #[test]
    fn test_extract_paths() {
        assert_eq!(extract_paths("创建配置文件config.yaml并写入"), ["config.yaml"]);
        assert_eq!(
            extract_paths("write src/main.rs and docs/README.md."),
            ["src/main.rs", "docs/README.md"]
        );
        assert!(extract_paths("see https://example.com/x.html").is_empty());
        assert!(extract_paths("no paths here").is_empty());
        assert!(extract_paths("create the config, e.g. settings, i.e. defaults").is_empty());
        assert_eq!(extract_paths("write a.py, e.g. a stub"), ["a.py"]);
    }

    #[test]
    fn test_classify_matches_whole_words() {
        assert_eq!(classify("Write important notes to notes.md"), Some(ValidationType::FileExists));
        assert_eq!(classify("Ask the compiler team about notes.md"), None);
        assert_eq!(classify("Rewrite the summary"), None);
        assert_eq!(classify("对main.py做语法检查"), Some(ValidationType::SyntaxCheck));
    }

    #[tokio::test]
    async fn test_important_is_not_an_import() {
        let executor = Arc::new(MockCapabilityExecutor::new());
        executor.add_file("notes.md").await;

        let result = validator(executor.clone())
            .validate("Write important notes to notes.md", &MilestoneContext::default())
            .await;
        assert!(result.passed, "{}", result.message);
        assert_eq!(result.validation_type, ValidationType::FileExists);

        let calls = executor.invocations().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "file_exists");
        assert_eq!(calls[0].1["path"], "notes.md");
    }

    #[tokio::test]
    async fn test_abbreviation_is_not_a_target() {
        let executor = Arc::new(MockCapabilityExecutor::new());
        executor.add_file("settings.toml").await;

        let context = MilestoneContext::new(
            None,
            vec![CapabilityCall::new("c1", "write_file", json!({"path": "settings.toml"}))],
        );
        let result = validator(executor)
            .validate("create the config, e.g. settings", &context)
            .await;
        assert!(result.passed, "{}", result.message);
    }

    #[tokio::test]
    async fn test_file_exists_passes_for_existing_file() {
        let executor = Arc::new(MockCapabilityExecutor::new());
        executor.add_file("config.yaml").await;

        let result = validator(executor.clone())
            .validate("Create config.yaml", &MilestoneContext::default())
            .await;
        assert!(result.passed, "{}", result.message);
        assert_eq!(result.validation_type, ValidationType::FileExists);
        assert_eq!(executor.invocations().await[0].0, "file_exists");
    }

    #[tokio::test]
    async fn test_file_exists_fails_for_missing_file() {
        let executor = Arc::new(MockCapabilityExecutor::new());
        let result = validator(executor)
            .validate("Create config.yaml", &MilestoneContext::default())
            .await;
        assert!(!result.passed);
        assert!(result.message.contains("config.yaml"));
    }

    #[tokio::test]
    async fn test_file_exists_uses_call_params_when_step_names_no_file() {
        let executor = Arc::new(MockCapabilityExecutor::new());
        executor.add_file("settings/app.toml").await;

        let context = MilestoneContext::new(
            None,
            vec![CapabilityCall::new("c1", "write_file", json!({"path": "settings/app.toml"}))],
        );
        let result = validator(executor).validate("创建配置文件", &context).await;
        assert!(result.passed, "{}", result.message);
    }

    #[tokio::test]
    async fn test_file_exists_without_target_fails() {
        let executor = Arc::new(MockCapabilityExecutor::new());
        let result = validator(executor).validate("创建配置文件", &MilestoneContext::default()).await;
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn test_workspace_root_is_applied() {
        let executor = Arc::new(MockCapabilityExecutor::new());
        executor.add_file("/work/out.txt").await;

        let context = MilestoneContext::new(Some(PathBuf::from("/work")), Vec::new());
        let result = validator(executor).validate("save out.txt", &context).await;
        assert!(result.passed, "{}", result.message);
    }

    #[tokio::test]
    async fn test_syntax_check_runs_configured_command() {
        let executor = Arc::new(MockCapabilityExecutor::new());
        executor
            .set_outcome("run_command", CapabilityOutcome::failure("SyntaxError: invalid syntax"))
            .await;

        let result = validator(executor.clone())
            .validate("对 main.py 做语法检查", &MilestoneContext::default())
            .await;
        assert!(!result.passed);
        assert!(result.message.contains("SyntaxError"));

        let calls = executor.invocations().await;
        assert_eq!(calls[0].0, "run_command");
        assert_eq!(calls[0].1["command"], "python3 -m py_compile main.py");
    }

    #[tokio::test]
    async fn test_syntax_check_without_checker_passes() {
        let executor = Arc::new(MockCapabilityExecutor::new());
        let result = validator(executor.clone())
            .validate("compile notes.txt", &MilestoneContext::default())
            .await;
        assert!(result.passed);
        assert!(executor.invocations().await.is_empty());
    }

    #[tokio::test]
    async fn test_import_test() {
        let executor = Arc::new(MockCapabilityExecutor::new());
        let result = validator(executor.clone())
            .validate("import utils.helpers to confirm it loads", &MilestoneContext::default())
            .await;
        assert!(result.passed);
        assert_eq!(
            executor.invocations().await[0].1["command"],
            "python3 -c \"import utils.helpers\""
        );
    }

    #[tokio::test]
    async fn test_custom_step_passes_without_io() {
        let executor = Arc::new(MockCapabilityExecutor::new());
        let result = validator(executor.clone())
            .validate("分析项目结构", &MilestoneContext::default())
            .await;
        assert!(result.passed);
        assert_eq!(result.validation_type, ValidationType::Custom);
        assert!(executor.invocations().await.is_empty());
    }
}
