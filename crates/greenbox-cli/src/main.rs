//! Command-line interface for Greenbox grow boxes.
//!
//! Every command opens the local state database, builds an engine against
//! the configured gateway, runs, and exits. State that must outlive a
//! command (the selected box, cached telemetry, the inbox, preferences)
//! lives in the database.
//!
//! # Examples
//!
//! ```bash
//! greenbox login 4321
//! greenbox status
//! greenbox history --period 7d --sensor temperature
//! greenbox watch --interval 60
//! greenbox --json notifications --category alerts
//! ```

mod cli;
mod commands;
mod config;
mod format;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use greenbox_core::{Engine, HttpGateway};
use greenbox_store::SqliteStore;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::*;
use config::{Config, resolve_database, resolve_gateway};
use format::FormatOptions;

/// Build the engine for this invocation.
fn build_engine(cli: &Cli, config: &Config) -> Result<Engine> {
    let sync_config = config.sync_config()?;
    let url = resolve_gateway(cli.gateway.clone(), config);
    let gateway = HttpGateway::with_timeout(&url, sync_config.request_timeout)
        .with_context(|| format!("Invalid gateway URL: {}", url))?;

    let path = resolve_database(cli.database.clone(), config);
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open state database: {}", path.display()))?;

    tracing::debug!("Gateway {}, database {}", url, path.display());
    Ok(Engine::new(Arc::new(gateway), Arc::new(store), sync_config)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays parseable
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let opts = FormatOptions::new(cli.no_color || config.no_color, cli.format(), cli.quiet);

    if let Commands::Config { action } = cli.command {
        return cmd_config(action, &config, &opts);
    }

    let engine = build_engine(&cli, &config)?;
    match cli.command {
        Commands::Login { code } => cmd_login(&engine, &code, &opts).await,
        Commands::Select { id, name, ranges } => {
            cmd_select(&engine, &id, name, &ranges, &opts).await
        }
        Commands::Status => cmd_status(&engine, &opts).await,
        Commands::Sync => cmd_sync(&engine, &opts).await,
        Commands::Watch { interval, count } => cmd_watch(&engine, interval, count, &opts).await,
        Commands::History { period, sensor } => cmd_history(&engine, period, sensor, &opts).await,
        Commands::Notifications { category } => cmd_notifications(&engine, category, &opts).await,
        Commands::Read { id } => cmd_read(&engine, &id, &opts).await,
        Commands::ReadAll => cmd_read_all(&engine, &opts).await,
        Commands::Dismiss { id } => cmd_dismiss(&engine, &id, &opts).await,
        Commands::Prefs { action } => cmd_prefs(&engine, action, &opts).await,
        Commands::Logout => cmd_logout(&engine, &opts).await,
        Commands::Config { .. } => Ok(()),
    }
}
