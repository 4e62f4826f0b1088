use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "trackload",
    about = "Incremental TCX trackpoint ingestion into a geospatial store"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load trackpoints from archive files newer than the stored cursor.
    Ingest {
        #[arg(long)]
        archive_dir: Option<PathBuf>,
        #[arg(long)]
        db: Option<PathBuf>,
        /// `file_name` (default) or `point`.
        #[arg(long)]
        cursor_filter: Option<String>,
    },
    Status,
    /// Serve stored locations over HTTP.
    Serve,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
