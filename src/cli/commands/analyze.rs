//! `taskpilot analyze` - classify request complexity.

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::models::{Config, TaskAnalysis};
use crate::services::TaskAnalyzer;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Request text to classify
    pub text: String,

    /// Override the configured complexity threshold
    #[arg(short, long)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeOutput {
    pub text: String,
    pub threshold: f64,
    #[serde(flatten)]
    pub analysis: TaskAnalysis,
}

impl CommandOutput for AnalyzeOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Complexity:  {}", self.analysis.complexity),
            format!("Confidence:  {:.2}", self.analysis.confidence),
            format!("Needs plan:  {}", if self.analysis.needs_plan { "yes" } else { "no" }),
            format!("Threshold:   {:.2}", self.threshold),
        ];

        if !self.analysis.matched_indicators.is_empty() {
            let mut table = list_table(&["category", "match"]);
            for indicator in &self.analysis.matched_indicators {
                let (category, hit) = indicator.split_once(':').unwrap_or((indicator.as_str(), ""));
                table.add_row(vec![category, hit]);
            }
            lines.push(String::new());
            lines.push(table.to_string());
        }

        lines.join("\n")
    }
}

pub fn execute(args: AnalyzeArgs, config: &Config, json_mode: bool) -> Result<()> {
    let mut analyzer_config = config.analyzer.clone();
    if let Some(threshold) = args.threshold {
        if !(threshold > 0.0 && threshold <= 1.0) {
            bail!("threshold must be in (0, 1], got {threshold}");
        }
        analyzer_config.complexity_threshold = threshold;
    }

    let analyzer = TaskAnalyzer::new(&analyzer_config);
    let analysis = analyzer.analyze(&args.text);
    output(
        &AnalyzeOutput {
            text: args.text,
            threshold: analyzer.threshold(),
            analysis,
        },
        json_mode,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_json_is_flat() {
        let out = AnalyzeOutput {
            text: "先分析项目结构，然后创建配置文件，最后验证".into(),
            threshold: 0.6,
            analysis: TaskAnalyzer::default().analyze("先分析项目结构，然后创建配置文件，最后验证"),
        };
        let json = out.to_json();
        assert_eq!(json["complexity"], "complex");
        assert_eq!(json["needs_plan"], true);
        assert!(out.to_human().contains("Needs plan:  yes"));
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let args = AnalyzeArgs {
            text: "hi".into(),
            threshold: Some(1.5),
        };
        assert!(execute(args, &Config::default(), true).is_err());
    }
}
