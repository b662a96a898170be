//! tracklog CLI - keep your Spotify listening history in a local SQLite store
//!
//! `tracklog sync` pulls new liked songs and recent plays; the read-only
//! commands list and rank what has been stored.

mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::Parser;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::load_context;
use crate::commands::config::run_config;
use crate::commands::list::run_list;
use crate::commands::popularity::run_popularity;
use crate::commands::sync::run_sync;
use crate::commands::years::run_years;
use crate::config_profiles::default_config_path;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "tracklog=info"
        .parse::<Directive>()
        .map_err(|error| CliError::Config(error.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = default_config_path().map_err(CliError::Config)?;
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Config { command } => run_config(command, profile, cli.db_path, &config_path)?,
        Commands::Sync { category, json } => {
            let context = load_context(&config_path, profile, cli.db_path)?;
            run_sync(category, json, &context).await?;
        }
        Commands::List {
            category,
            limit,
            offset,
            json,
        } => {
            let context = load_context(&config_path, profile, cli.db_path)?;
            run_list(category, limit, offset, json, &context.db_path)?;
        }
        Commands::Years { json } => {
            let context = load_context(&config_path, profile, cli.db_path)?;
            run_years(json, &context.db_path)?;
        }
        Commands::Popularity {
            year,
            order,
            limit,
            json,
        } => {
            let context = load_context(&config_path, profile, cli.db_path)?;
            run_popularity(year, order.into(), limit, json, &context.db_path)?;
        }
    }

    Ok(())
}
