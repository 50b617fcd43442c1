//! Taskpilot CLI entry point.

use clap::Parser;

use taskpilot::cli::{commands, handle_error, load_config, Cli, Commands};
use taskpilot::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LogConfig::try_from(&config.logging).and_then(|log| LoggerImpl::init(&log)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Analyze(args) => commands::analyze::execute(args, &config, cli.json),
        Commands::Policy(args) => commands::policy::execute(args, &config, cli.json).await,
        Commands::Milestone(args) => commands::milestone::execute(args, cli.json),
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
