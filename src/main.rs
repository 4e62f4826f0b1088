mod api;
mod cli;
mod config;
mod db;
mod ingest;

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::{Config, CursorFilter};
use crate::db::Database;
use crate::ingest::IngestOptions;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            archive_dir,
            db,
            cursor_filter,
        } => handle_ingest(archive_dir, db, cursor_filter),
        Commands::Status => handle_status(),
        Commands::Serve => handle_serve().await,
        Commands::Config { command } => handle_config_command(command),
    }
}

fn handle_ingest(
    archive_dir: Option<PathBuf>,
    db: Option<PathBuf>,
    cursor_filter: Option<String>,
) -> Result<()> {
    let mut config = Config::resolve()?;
    if let Some(path) = archive_dir {
        config.archive_dir = path;
    }
    if let Some(path) = db {
        config.db_path = path;
    }
    if let Some(raw) = cursor_filter.as_deref() {
        config.cursor_filter = CursorFilter::parse(raw)?;
    }

    println!("Connecting to database: {}", config.db_path.display());
    let mut database = Database::open(&config.db_path)?;

    let options = IngestOptions {
        cursor_filter: config.cursor_filter,
        progress_interval: config.progress_interval,
    };
    let summary = ingest::run_ingest(&mut database, &config.archive_dir, &options)
        .with_context(|| {
            format!(
                "Ingestion failed, nothing committed: {}",
                config.archive_dir.display()
            )
        })?;

    match summary.cursor {
        Some(cursor) => println!(
            "Beginning count: {} (cursor {cursor})",
            summary.starting_count
        ),
        None => println!("No previous data found, started from scratch."),
    }
    println!(
        "Files processed: {} (skipped {})",
        summary.files_processed, summary.files_skipped
    );
    println!("Locations written: {}", summary.points_inserted);
    if summary.points_filtered > 0 {
        println!(
            "Locations at or before cursor dropped: {}",
            summary.points_filtered
        );
    }
    println!("Final locations: {}", summary.final_count);

    Ok(())
}

fn handle_status() -> Result<()> {
    let config = Config::resolve()?;
    let database = Database::open(&config.db_path)?;

    println!("trackload status");
    status_lines(&config, &database)?
        .iter()
        .for_each(|line| println!("- {line}"));

    Ok(())
}

fn status_lines(config: &Config, database: &Database) -> Result<Vec<String>> {
    let range = database.timestamp_range()?;
    let format_timestamp = |timestamp: Option<NaiveDateTime>| {
        timestamp
            .map(|timestamp| timestamp.to_string())
            .unwrap_or_else(|| "none".to_string())
    };

    Ok(vec![
        format!("db_path: {}", config.db_path.display()),
        format!("archive_dir: {}", config.archive_dir.display()),
        format!("cursor_filter: {}", config.cursor_filter.as_str()),
        format!("locations: {}", database.location_count()?),
        format!("cursor: {}", format_timestamp(database.cursor()?)),
        format!("first_timestamp: {}", format_timestamp(range.first_timestamp)),
        format!("last_timestamp: {}", format_timestamp(range.last_timestamp)),
    ])
}

async fn handle_serve() -> Result<()> {
    let config = Arc::new(Config::resolve()?);

    tokio::select! {
        api_result = api::run_server(config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn load_or_default_config() -> Result<Config> {
    let config_path = Config::config_path()?;
    if config_path.exists() {
        Config::load()
    } else {
        Ok(Config::default())
    }
}
