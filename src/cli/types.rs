//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::analyze::AnalyzeArgs;
use super::commands::milestone::MilestoneArgs;
use super::commands::policy::PolicyArgs;

#[derive(Parser, Debug)]
#[command(name = "taskpilot")]
#[command(about = "Taskpilot - agent task-execution controller", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .taskpilot/config.yaml merged with env overrides)
    #[arg(short, long, global = true, env = "TASKPILOT_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a request as simple or complex
    Analyze(AnalyzeArgs),

    /// Policy document commands
    Policy(PolicyArgs),

    /// Milestone step commands
    Milestone(MilestoneArgs),
}
