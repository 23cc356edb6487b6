//! Command line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "geomanager-ingester")]
#[command(about = "Ingest GeoTIFF and NetCDF files into GeoManager raster layers")]
pub struct Args {
    /// YAML file overlaid on the environment configuration
    #[arg(short, long, env = "GEOMANAGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "GEOMANAGER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Ingest a file reported by the auto-ingest directory watcher
    Ingest {
        /// Watcher event type: created, moved, ...
        event: String,

        /// Path the event refers to
        src: PathBuf,

        /// Destination path of a moved event
        #[arg(long)]
        dst: Option<PathBuf>,

        /// Replace existing files with the same time
        #[arg(long)]
        overwrite: bool,

        /// Skip clipping to the configured country boundary
        #[arg(long)]
        no_clip: bool,
    },

    /// Ingest every raster in a layer's auto-ingest directory
    ProcessDirectory {
        layer_id: Uuid,

        #[arg(long)]
        overwrite: bool,

        #[arg(long)]
        no_clip: bool,
    },

    /// Create the catalog tables and exit
    Migrate,
}

/// Tracing level for a `--log-level` value. Unknown values mean info.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
