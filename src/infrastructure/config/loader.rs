use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project-local configuration directory.
pub const CONFIG_DIR: &str = ".taskpilot";
/// Prefix for environment overrides, e.g. `TASKPILOT_CONTROLLER__MAX_ITERATIONS`.
pub const ENV_PREFIX: &str = "TASKPILOT_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    #[error("Invalid max_iterations_with_plan: {with_plan}. Must be at least max_iterations ({base})")]
    InvalidIterationsWithPlan { with_plan: u32, base: u32 },

    #[error(
        "Invalid thresholds: failure_threshold ({failure}) must be less than stagnation_threshold ({stagnation})"
    )]
    InvalidThresholdOrder { failure: u32, stagnation: u32 },

    #[error("Invalid failure_threshold: {0}. Must be at least 1")]
    InvalidFailureThreshold(u32),

    #[error("Invalid max_replan_count: {0}. Must be at least 1")]
    InvalidMaxReplanCount(u32),

    #[error("Invalid {0}: timeouts must be at least 1 second")]
    InvalidTimeout(&'static str),

    #[error("Invalid complexity_threshold: {0}. Must be in (0, 1]")]
    InvalidComplexityThreshold(f64),

    #[error("Invalid plan step range: min_steps ({min}) must be between 1 and max_steps ({max})")]
    InvalidStepRange { min: usize, max: usize },

    #[error("Policy path cannot be empty")]
    EmptyPolicyPath,

    #[error("Invalid reload_interval_secs: {0}. Must be at least 1")]
    InvalidReloadInterval(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .taskpilot/config.yaml (project config)
    /// 3. .taskpilot/local.yaml (local overrides, optional)
    /// 4. Environment variables (TASKPILOT_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(Path::new("."))
    }

    /// Load configuration rooted at `project_dir`.
    pub fn load_from_dir(project_dir: &Path) -> Result<Config> {
        let config_dir = project_dir.join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_dir.join("config.yaml")))
            .merge(Yaml::file(config_dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let controller = &config.controller;

        if controller.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(controller.max_iterations));
        }
        if controller.max_iterations_with_plan < controller.max_iterations {
            return Err(ConfigError::InvalidIterationsWithPlan {
                with_plan: controller.max_iterations_with_plan,
                base: controller.max_iterations,
            });
        }
        if controller.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(controller.failure_threshold));
        }
        // Hard failure must trigger a replan sooner than slow progress.
        if controller.failure_threshold >= controller.stagnation_threshold {
            return Err(ConfigError::InvalidThresholdOrder {
                failure: controller.failure_threshold,
                stagnation: controller.stagnation_threshold,
            });
        }
        if controller.max_replan_count == 0 {
            return Err(ConfigError::InvalidMaxReplanCount(controller.max_replan_count));
        }
        if controller.model_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("model_timeout_secs"));
        }
        if controller.capability_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("capability_timeout_secs"));
        }

        let threshold = config.analyzer.complexity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::InvalidComplexityThreshold(threshold));
        }

        if config.planner.min_steps == 0 || config.planner.min_steps > config.planner.max_steps {
            return Err(ConfigError::InvalidStepRange {
                min: config.planner.min_steps,
                max: config.planner.max_steps,
            });
        }

        if config.policy.path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPolicyPath);
        }
        if config.policy.reload_interval_secs == 0 {
            return Err(ConfigError::InvalidReloadInterval(config.policy.reload_interval_secs));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}
