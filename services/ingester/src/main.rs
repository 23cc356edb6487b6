//! GeoManager raster ingester.
//!
//! Ingests files dropped into auto-ingest directories, either one watcher
//! event at a time or by scanning a layer's whole directory.

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use ingestion::{IngestConfig, IngestReport, Ingester, WatchEvent};
use raster_io::GdalToolkit;
use storage::{PgCatalog, StaticBoundarySettings};

use cli::{parse_level, Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&args.log_level))
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = IngestConfig::from_env()?;
    if let Some(path) = &args.config {
        config = config.with_yaml_file(path)?;
    }
    let config = Arc::new(config);
    info!(
        auto_ingest_dir = %config.auto_ingest_dir.display(),
        media_root = %config.media_root.display(),
        countries = config.boundary.countries.len(),
        "Loaded configuration"
    );

    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set")?;
    let catalog = Arc::new(PgCatalog::connect(database_url).await?);
    catalog.migrate().await?;

    let toolkit = Arc::new(GdalToolkit::new(config.time_dimensions()));
    let ingester = Ingester::new(config.clone(), catalog.clone(), toolkit).with_boundaries(
        Arc::new(StaticBoundarySettings(config.boundary.clone())),
        catalog.clone(),
    );

    match args.command {
        Command::Migrate => {
            info!("Catalog schema is up to date");
        }
        Command::Ingest {
            event,
            src,
            dst,
            overwrite,
            no_clip,
        } => {
            let event: WatchEvent = event.parse()?;
            let clip = config.clip_to_boundary && !no_clip;
            let target = dst.clone().unwrap_or_else(|| src.clone());
            let report = ingester
                .handle_event(&event, &src, dst.as_deref(), overwrite, clip)
                .await
                .with_context(|| format!("failed to ingest {}", target.display()))?;

            match report {
                Some(report) => log_report(&report),
                None => info!(event = ?event, src = %src.display(), "Nothing to ingest"),
            }
        }
        Command::ProcessDirectory {
            layer_id,
            overwrite,
            no_clip,
        } => {
            let clip = config.clip_to_boundary && !no_clip;
            let scan = ingester.process_directory(layer_id, overwrite, clip).await?;

            for report in &scan.reports {
                log_report(report);
            }
            for (file, error) in &scan.failures {
                warn!(file = %file.display(), error = %error, "File not ingested");
            }
            info!(
                layer_id = %layer_id,
                ingested = scan.reports.len(),
                failed = scan.failures.len(),
                "Directory processed"
            );
        }
    }

    Ok(())
}

fn log_report(report: &IngestReport) {
    info!(
        layer_id = %report.layer_id,
        source = %report.source.display(),
        created = report.created(),
        replaced = report.replaced(),
        skipped = report.skipped(),
        "Ingested file"
    );
}
