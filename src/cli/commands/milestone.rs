//! `taskpilot milestone` - see how plan steps would be verified.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::domain::models::ValidationType;
use crate::services::milestone_validator::{classify, extract_paths};

#[derive(Args, Debug)]
pub struct MilestoneArgs {
    #[command(subcommand)]
    pub command: MilestoneCommands,
}

#[derive(Subcommand, Debug)]
pub enum MilestoneCommands {
    /// Classify plan steps by the check that would verify them
    Classify {
        /// One or more step descriptions
        #[arg(required = true)]
        steps: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct StepClassification {
    pub step: String,
    pub validate: bool,
    pub validation_type: Option<ValidationType>,
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyOutput {
    pub steps: Vec<StepClassification>,
}

impl CommandOutput for ClassifyOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["step", "check", "targets"]);
        for step in &self.steps {
            table.add_row(vec![
                truncate(&step.step, 50),
                step.validation_type
                    .map_or_else(|| "none".to_string(), |t| t.to_string()),
                if step.paths.is_empty() {
                    "-".to_string()
                } else {
                    step.paths.join(", ")
                },
            ]);
        }
        table.to_string()
    }
}

pub fn classify_steps(steps: Vec<String>) -> ClassifyOutput {
    ClassifyOutput {
        steps: steps
            .into_iter()
            .map(|step| {
                let validation_type = classify(&step);
                StepClassification {
                    validate: validation_type.is_some(),
                    validation_type,
                    paths: extract_paths(&step),
                    step,
                }
            })
            .collect(),
    }
}

pub fn execute(args: MilestoneArgs, json_mode: bool) -> Result<()> {
    match args.command {
        MilestoneCommands::Classify { steps } => output(&classify_steps(steps), json_mode),
    }
    Ok(())
}
