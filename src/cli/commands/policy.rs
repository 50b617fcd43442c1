//! `taskpilot policy` - inspect policy documents.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::domain::models::{Config, PolicyBundle, RuleAction};
use crate::services::PolicyStore;

#[derive(Args, Debug)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommands,
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommands {
    /// Parse a policy document and list its rules
    Validate {
        /// Policy document (defaults to the configured policy path)
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
pub struct RuleOutput {
    pub id: String,
    pub kind: String,
    pub section: String,
    pub action: Option<String>,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PolicyValidateOutput {
    pub path: String,
    pub content_hash: String,
    pub hard_constraints: usize,
    pub soft_guidelines: usize,
    pub identity_rules: usize,
    pub rules: Vec<RuleOutput>,
}

impl PolicyValidateOutput {
    fn from_bundle(path: String, bundle: &PolicyBundle) -> Self {
        Self {
            path,
            content_hash: bundle.content_hash().to_string(),
            hard_constraints: bundle.hard_constraints().count(),
            soft_guidelines: bundle.soft_guidelines().count(),
            identity_rules: bundle.identity_rules().count(),
            rules: bundle
                .rules()
                .iter()
                .map(|rule| RuleOutput {
                    id: rule.id.clone(),
                    kind: rule.kind.to_string(),
                    section: rule.source_section.clone(),
                    action: rule.action.as_ref().map(describe_action),
                    text: rule.text.clone(),
                })
                .collect(),
        }
    }
}

fn describe_action(action: &RuleAction) -> String {
    match action {
        RuleAction::DenyCapability(name) => format!("deny_capability:{name}"),
        RuleAction::NoSharedMemory => "no_shared_memory".to_string(),
        RuleAction::MaxIterations(n) => format!("max_iterations:{n}"),
    }
}

impl CommandOutput for PolicyValidateOutput {
    fn to_human(&self) -> String {
        let hash: String = self.content_hash.chars().take(12).collect();
        let mut table = list_table(&["id", "kind", "action", "rule"]);
        for rule in &self.rules {
            table.add_row(vec![
                rule.id.clone(),
                rule.kind.clone(),
                rule.action.clone().unwrap_or_else(|| "-".to_string()),
                truncate(&rule.text, 60),
            ]);
        }
        format!(
            "Policy {} is valid (hash {hash})\n{} hard constraint(s), {} guideline(s), {} identity rule(s)\n\n{table}",
            self.path, self.hard_constraints, self.soft_guidelines, self.identity_rules
        )
    }
}

pub async fn execute(args: PolicyArgs, config: &Config, json_mode: bool) -> Result<()> {
    match args.command {
        PolicyCommands::Validate { path } => {
            let path = path.unwrap_or_else(|| config.policy.path.clone());
            let bundle = PolicyStore::load(&path)
                .await
                .with_context(|| format!("Policy validation failed for {}", path.display()))?;
            output(
                &PolicyValidateOutput::from_bundle(path.display().to_string(), &bundle),
                json_mode,
            );
        }
    }
    Ok(())
}
