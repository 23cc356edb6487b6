//! Raster ingestion library.
//!
//! Turns raw GeoTIFF and NetCDF files into Cloud Optimized GeoTIFFs, one
//! per timestamp, published into a layer's managed storage and recorded in
//! the raster catalog.
//!
//! # Entry points
//!
//! - [`Ingester::ingest`]: one file into a known layer
//! - [`Ingester::handle_event`] and [`Ingester::process_directory`]:
//!   auto-ingest directories
//! - [`Ingester::stage_upload`] and [`Ingester::publish_upload`]: the
//!   interactive two-step upload

pub mod boundary;
pub mod config;
pub mod directory;
pub mod error;
mod ingester;
pub mod metadata;
mod upload;

// Re-exports
pub use boundary::{decide_clip, resolve_boundary_geometry, ClipDecision};
pub use config::IngestConfig;
pub use directory::{ensure_layer_directory, DirectoryScan, WatchEvent};
pub use error::{IngestionError, Result};
pub use ingester::{IngestOutcome, IngestReport, Ingester};
pub use metadata::{detect_file_type, timestamp_from_filename};
pub use upload::{PublishSelection, StagedUpload, TimestampSelection};
