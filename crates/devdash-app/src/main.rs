use anyhow::{Context, Result};
use colored::Colorize;
use std::env;

use clap::Parser;

use devdash_terminal::{SessionJournal, SessionRegistry, TmuxMultiplexer};

// Local modules
mod cli;
mod commands;
mod config;

use cli::Cli;
use commands::App;
use config::DashboardConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    if let Err(e) = devdash_logging::init_logging(cli.verbose) {
        eprintln!("{} {:#}", "Logging disabled:".yellow(), e);
    }

    let config_path = config::config_path(cli.config.as_deref())?;
    let config = DashboardConfig::load_or_create(&config_path)?;
    log::debug!("Loaded config from {}", config_path.display());

    let tmux_binary = cli.tmux.clone().unwrap_or_else(|| config.tmux_binary.clone());
    let mux = TmuxMultiplexer::detect(tmux_binary)
        .await
        .context("Terminal sessions need tmux")?;

    let mut registry = SessionRegistry::new(std::sync::Arc::new(mux)).with_timings(config.timings);
    if config.journal {
        match devdash_logging::get_logs_dir().and_then(|dir| SessionJournal::open(&dir)) {
            Ok(journal) => registry = registry.with_journal(journal),
            Err(e) => log::warn!("Session journal disabled: {:#}", e),
        }
    }

    let app = App {
        config,
        registry,
        work_dir: env::current_dir()?,
    };

    match cli.command.execute(&app).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            log::error!("{:#}", e);
            Err(e)
        }
    }
}
