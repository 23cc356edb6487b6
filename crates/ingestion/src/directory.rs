//! Auto-ingest directories: watch events and directory scans.
//!
//! Each layer owns `{auto_ingest_dir}/{layer id or custom name}/`. Files
//! dropped there are ingested into that layer.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use geomanager_common::RasterFileLayer;

use crate::error::{IngestionError, Result};
use crate::ingester::{IngestReport, Ingester};
use crate::metadata::{detect_file_type, layer_directory_name};

/// File system event reported by the directory watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created,
    /// The destination path is ingested.
    Moved,
    Other(String),
}

impl FromStr for WatchEvent {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "created" => Self::Created,
            "moved" => Self::Moved,
            other => Self::Other(other.to_string()),
        })
    }
}

/// Result of scanning one layer directory.
#[derive(Debug, Default)]
pub struct DirectoryScan {
    pub reports: Vec<IngestReport>,
    pub failures: Vec<(PathBuf, String)>,
}

impl Ingester {
    /// Layer owning the directory `path` sits in.
    pub async fn resolve_directory_layer(&self, path: &Path) -> Result<RasterFileLayer> {
        let name = layer_directory_name(path).ok_or_else(|| {
            IngestionError::InvalidLayerDirectory(path.display().to_string())
        })?;

        match self.catalog.find_layer_by_directory(&name).await? {
            Some(layer) => Ok(layer),
            None if Uuid::parse_str(&name).is_ok() => Err(IngestionError::LayerNotFound(name)),
            None => Err(IngestionError::InvalidLayerDirectory(name)),
        }
    }

    /// Ingest a file dropped into a layer directory.
    pub async fn ingest_from_directory(
        &self,
        path: &Path,
        overwrite: bool,
        clip_to_boundary: bool,
    ) -> Result<IngestReport> {
        let layer = self.resolve_directory_layer(path).await?;
        self.ingest(&layer, path, overwrite, clip_to_boundary).await
    }

    /// Handle one watcher event. Returns `None` for ignored events.
    pub async fn handle_event(
        &self,
        event: &WatchEvent,
        src: &Path,
        dst: Option<&Path>,
        overwrite: bool,
        clip_to_boundary: bool,
    ) -> Result<Option<IngestReport>> {
        let path = match event {
            WatchEvent::Created => src,
            WatchEvent::Moved => match dst {
                Some(dst) => dst,
                None => {
                    warn!(src = %src.display(), "Moved event without destination, ignoring");
                    return Ok(None);
                }
            },
            WatchEvent::Other(kind) => {
                info!(event = %kind, path = %src.display(), "Ignoring watch event");
                return Ok(None);
            }
        };

        self.ingest_from_directory(path, overwrite, clip_to_boundary)
            .await
            .map(Some)
    }

    /// Ingest every raster in a layer's auto-ingest directory.
    ///
    /// Failures are logged and collected; the scan continues.
    pub async fn process_directory(
        &self,
        layer_id: Uuid,
        overwrite: bool,
        clip_to_boundary: bool,
    ) -> Result<DirectoryScan> {
        let layer = self
            .catalog
            .get_layer(layer_id)
            .await?
            .ok_or_else(|| IngestionError::LayerNotFound(layer_id.to_string()))?;

        let dir = self.config.auto_ingest_dir.join(layer.directory_name());
        let mut scan = DirectoryScan::default();
        if !dir.is_dir() {
            warn!(layer_id = %layer.id, dir = %dir.display(), "Layer directory does not exist");
            return Ok(scan);
        }

        let files = raster_files_in(&dir);
        info!(layer_id = %layer.id, dir = %dir.display(), count = files.len(), "Scanning layer directory");

        for file in files {
            match self.ingest(&layer, &file, overwrite, clip_to_boundary).await {
                Ok(report) => scan.reports.push(report),
                Err(e) => {
                    error!(file = %file.display(), error = %e, "Failed to ingest file");
                    scan.failures.push((file, e.to_string()));
                }
            }
        }

        Ok(scan)
    }
}

/// Accepted raster files directly inside `dir`, sorted by name.
fn raster_files_in(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| detect_file_type(path).is_some())
        .collect()
}

/// Create the auto-ingest directory of `layer` under `root`.
pub fn ensure_layer_directory(root: &Path, layer: &RasterFileLayer) -> std::io::Result<PathBuf> {
    let dir = root.join(layer.directory_name());
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
