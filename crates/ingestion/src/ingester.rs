//! The ingestion orchestrator.
//!
//! Turns a raw GeoTIFF or NetCDF file into published COGs, one per
//! timestamp, and records them in the catalog:
//!
//! 1. validate the file and stage it as a [`RasterUpload`]
//! 2. optionally clip it to the configured country boundary
//! 3. convert each timestamp to a COG and publish it under a unique name
//! 4. create the catalog record, or replace the existing one atomically
//!
//! The upload is removed on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use geomanager_common::{
    published_file_name, tile_timestamp, LayerRasterFile, NewLayerRasterFile, RasterDriver,
    RasterFileLayer, RasterMetadata, RasterUpload,
};
use raster_io::{RasterResult, RasterToolkit};
use storage::{
    BoundarySettingsProvider, CountryBoundaryRepository, InMemoryCountryBoundaries, MediaStore,
    RasterCatalog, Replacement, StaticBoundarySettings, StorageError,
};

use crate::boundary::{decide_clip, ClipDecision};
use crate::config::IngestConfig;
use crate::error::{IngestionError, Result};
use crate::metadata::{timestamp_from_filename, validate_raw_file};

/// Replace attempts before a conflicting concurrent write is reported.
const REPLACE_ATTEMPTS: usize = 3;

/// Result of publishing one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Created(LayerRasterFile),
    Replaced {
        previous: Uuid,
        file: LayerRasterFile,
    },
    /// A file for this time exists and overwrite was off.
    Skipped { time: DateTime<Utc> },
}

impl IngestOutcome {
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Self::Created(file) | Self::Replaced { file, .. } => file.time,
            Self::Skipped { time } => *time,
        }
    }
}

/// Outcomes of one ingestion run, in timestamp order.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub layer_id: Uuid,
    pub source: PathBuf,
    pub outcomes: Vec<IngestOutcome>,
}

impl IngestReport {
    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, IngestOutcome::Created(_)))
    }

    pub fn replaced(&self) -> usize {
        self.count(|o| matches!(o, IngestOutcome::Replaced { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, IngestOutcome::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&IngestOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// One timestamp to publish from a staged upload.
#[derive(Debug, Clone)]
pub(crate) struct PublishTarget<'a> {
    pub time: DateTime<Utc>,
    pub band_index: Option<usize>,
    pub data_variable: Option<&'a str>,
}

/// Core ingester for raster files.
pub struct Ingester {
    pub(crate) config: Arc<IngestConfig>,
    pub(crate) catalog: Arc<dyn RasterCatalog>,
    pub(crate) media: MediaStore,
    pub(crate) toolkit: Arc<dyn RasterToolkit>,
    boundary_settings: Arc<dyn BoundarySettingsProvider>,
    countries: Arc<dyn CountryBoundaryRepository>,
}

impl Ingester {
    /// Create an ingester using the boundary from `config` and no stored
    /// country polygons.
    pub fn new(
        config: Arc<IngestConfig>,
        catalog: Arc<dyn RasterCatalog>,
        toolkit: Arc<dyn RasterToolkit>,
    ) -> Self {
        Self {
            media: MediaStore::new(config.media_root.clone()),
            boundary_settings: Arc::new(StaticBoundarySettings(config.boundary.clone())),
            countries: Arc::new(InMemoryCountryBoundaries::new()),
            config,
            catalog,
            toolkit,
        }
    }

    pub fn with_boundaries(
        mut self,
        settings: Arc<dyn BoundarySettingsProvider>,
        countries: Arc<dyn CountryBoundaryRepository>,
    ) -> Self {
        self.boundary_settings = settings;
        self.countries = countries;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<dyn RasterCatalog> {
        &self.catalog
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Ingest a raw file into `layer`.
    pub async fn ingest(
        &self,
        layer: &RasterFileLayer,
        raw_file: &Path,
        overwrite: bool,
        clip_to_boundary: bool,
    ) -> Result<IngestReport> {
        let driver = validate_raw_file(raw_file)?;
        let geotiff_time = match driver {
            RasterDriver::GTiff => Some(timestamp_from_filename(raw_file)?),
            RasterDriver::NetCdf => None,
        };
        info!(layer_id = %layer.id, file = %raw_file.display(), overwrite, "Ingesting raster");

        let (guard, upload, metadata) = self.stage(layer.dataset_id, raw_file, clip_to_boundary).await?;
        let result = self
            .publish_all(layer, &upload, &metadata, geotiff_time, overwrite)
            .await;
        guard.release().await;

        let outcomes = result?;
        let report = IngestReport {
            layer_id: layer.id,
            source: raw_file.to_path_buf(),
            outcomes,
        };
        info!(
            layer_id = %layer.id,
            created = report.created(),
            replaced = report.replaced(),
            skipped = report.skipped(),
            "Ingestion complete"
        );
        Ok(report)
    }

    async fn publish_all(
        &self,
        layer: &RasterFileLayer,
        upload: &RasterUpload,
        metadata: &RasterMetadata,
        geotiff_time: Option<DateTime<Utc>>,
        overwrite: bool,
    ) -> Result<Vec<IngestOutcome>> {
        match metadata.driver {
            RasterDriver::NetCdf => {
                let variable = layer
                    .auto_ingest_nc_data_variable
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| IngestionError::MissingDataVariable {
                        layer: layer.title.clone(),
                    })?;
                check_data_variable(metadata, variable, &upload.file_path)?;

                let timestamps = metadata.parsed_timestamps()?;
                if timestamps.is_empty() {
                    return Err(IngestionError::MissingTimestamps(upload.file_path.clone()));
                }

                let mut outcomes = Vec::with_capacity(timestamps.len());
                for (band_index, time) in timestamps.into_iter().enumerate() {
                    let target = PublishTarget {
                        time,
                        band_index: Some(band_index),
                        data_variable: Some(variable),
                    };
                    outcomes.push(self.publish_time(layer, upload, metadata, target, overwrite).await?);
                }
                Ok(outcomes)
            }
            RasterDriver::GTiff => {
                let time = match geotiff_time {
                    Some(time) => time,
                    None => timestamp_from_filename(&upload.file_path)?,
                };
                let target = PublishTarget {
                    time,
                    band_index: None,
                    data_variable: None,
                };
                Ok(vec![self.publish_time(layer, upload, metadata, target, overwrite).await?])
            }
        }
    }

    /// Stage a raw file as an upload: copy, inspect and optionally clip.
    ///
    /// On error the upload is already cleaned up.
    pub(crate) async fn stage(
        &self,
        dataset_id: Uuid,
        raw_file: &Path,
        clip_to_boundary: bool,
    ) -> Result<(UploadGuard, RasterUpload, RasterMetadata)> {
        let mut upload = RasterUpload::new(dataset_id, PathBuf::new());
        upload.file_path = self.media.store_upload(upload.id, raw_file).await?;
        let guard = UploadGuard::new(self.catalog.clone(), self.media.clone(), &upload);

        match self.prepare(&mut upload, clip_to_boundary).await {
            Ok(metadata) => Ok((guard, upload, metadata)),
            Err(e) => {
                guard.release().await;
                Err(e)
            }
        }
    }

    async fn prepare(&self, upload: &mut RasterUpload, clip_to_boundary: bool) -> Result<RasterMetadata> {
        self.catalog.create_upload(upload).await?;

        let mut metadata = self.read_info(&upload.file_path).await?;
        self.catalog.update_upload_metadata(upload.id, &metadata).await?;

        if clip_to_boundary {
            if let Some(clipped) = self.clip_upload(&upload.file_path, &metadata).await? {
                metadata = clipped;
                self.catalog.update_upload_metadata(upload.id, &metadata).await?;
            }
        }

        upload.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    /// Clip the upload in place. Returns refreshed metadata when clipped.
    async fn clip_upload(&self, path: &Path, metadata: &RasterMetadata) -> Result<Option<RasterMetadata>> {
        let settings = self.boundary_settings.boundary_settings().await?;

        match decide_clip(Some(&metadata.bounds), &settings, self.countries.as_ref()).await? {
            ClipDecision::Skip(reason) => {
                debug!(file = %path.display(), reason, "Boundary clip skipped");
                Ok(None)
            }
            ClipDecision::Contained => {
                debug!(file = %path.display(), "Raster within boundary");
                Ok(None)
            }
            ClipDecision::Disjoint => Err(IngestionError::BoundaryDisjoint(path.to_path_buf())),
            ClipDecision::Clip(geometry) => {
                let tmp = self.media.temp_path(metadata.driver.extension()).await?;
                let toolkit = self.toolkit.clone();
                let (src, out, driver) = (path.to_path_buf(), tmp.clone(), metadata.driver);

                let clipped = blocking(move || toolkit.clip(&src, driver, &geometry, &out)).await;
                if let Err(e) = clipped {
                    self.media.delete(&tmp).await;
                    return Err(e);
                }

                self.media.publish(&tmp, path).await?;
                info!(file = %path.display(), "Clipped upload to boundary");
                Ok(Some(self.read_info(path).await?))
            }
        }
    }

    /// Convert and publish one timestamp, then create or replace its record.
    ///
    /// Without overwrite, a record committed by a concurrent run after the
    /// initial lookup still ends as `Skipped`. With overwrite the last
    /// committed replace wins.
    pub(crate) async fn publish_time(
        &self,
        layer: &RasterFileLayer,
        upload: &RasterUpload,
        metadata: &RasterMetadata,
        target: PublishTarget<'_>,
        overwrite: bool,
    ) -> Result<IngestOutcome> {
        if !overwrite && self.catalog.find_raster_file(layer.id, target.time).await?.is_some() {
            return Ok(skipped(layer, target.time));
        }

        let cog = self.media.temp_path("tif").await?;
        let converted = self
            .convert(metadata, &upload.file_path, &cog, target.band_index, target.data_variable)
            .await;
        let cog_metadata = match converted {
            Ok(()) => self.read_info(&cog).await,
            Err(e) => Err(e),
        };
        let cog_metadata = match cog_metadata {
            Ok(m) => m,
            Err(e) => {
                self.media.delete(&cog).await;
                return Err(e);
            }
        };

        let name = published_file_name(&target.time, target.data_variable);
        let relative = self.media.publish_path(layer, &name).await?;
        if let Err(e) = self.media.publish(&cog, &relative).await {
            self.media.delete(&cog).await;
            self.media.delete(&relative).await;
            return Err(e.into());
        }

        let new_file = NewLayerRasterFile {
            layer_id: layer.id,
            time: target.time,
            file_path: relative.clone(),
            metadata: Some(cog_metadata),
        };

        let stored = if overwrite {
            self.replace_raster_file(new_file).await
        } else {
            self.catalog
                .create_raster_file(new_file)
                .await
                .map(|file| Replacement { previous: None, file })
        };

        let outcome = match stored {
            Ok(Replacement { previous: None, file }) => {
                counter!("geomanager_raster_files_created_total").increment(1);
                IngestOutcome::Created(file)
            }
            Ok(Replacement {
                previous: Some(old),
                file,
            }) => {
                self.media.delete(&old.file_path).await;
                counter!("geomanager_raster_files_replaced_total").increment(1);
                IngestOutcome::Replaced { previous: old.id, file }
            }
            Err(StorageError::Conflict(_)) if !overwrite => {
                self.media.delete(&relative).await;
                return Ok(skipped(layer, target.time));
            }
            Err(e) => {
                self.media.delete(&relative).await;
                return Err(e.into());
            }
        };

        info!(
            layer_id = %layer.id,
            time = %tile_timestamp(&target.time),
            path = %relative.display(),
            "Published raster file"
        );
        Ok(outcome)
    }

    /// Replace the record at `file.time`, retrying when a concurrent run
    /// commits the same time between our delete and insert.
    async fn replace_raster_file(&self, file: NewLayerRasterFile) -> storage::Result<Replacement> {
        let mut attempt = 1;
        loop {
            match self.catalog.replace_raster_file(file.clone()).await {
                Err(StorageError::Conflict(message)) if attempt < REPLACE_ATTEMPTS => {
                    debug!(attempt, %message, "Concurrent write during replace, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    pub(crate) async fn read_info(&self, path: &Path) -> Result<RasterMetadata> {
        let toolkit = self.toolkit.clone();
        let path = path.to_path_buf();
        blocking(move || toolkit.read_info(&path)).await
    }

    async fn convert(
        &self,
        metadata: &RasterMetadata,
        src: &Path,
        out: &Path,
        band_index: Option<usize>,
        data_variable: Option<&str>,
    ) -> Result<()> {
        let toolkit = self.toolkit.clone();
        let metadata = metadata.clone();
        let (src, out) = (src.to_path_buf(), out.to_path_buf());
        let data_variable = data_variable.map(String::from);

        blocking(move || toolkit.convert_to_cog(&metadata, &src, &out, band_index, data_variable.as_deref())).await
    }
}

fn skipped(layer: &RasterFileLayer, time: DateTime<Utc>) -> IngestOutcome {
    warn!(
        layer_id = %layer.id,
        time = %tile_timestamp(&time),
        "Raster file exists and overwrite is off, skipping"
    );
    counter!("geomanager_raster_files_skipped_total").increment(1);
    IngestOutcome::Skipped { time }
}

pub(crate) fn check_data_variable(metadata: &RasterMetadata, variable: &str, path: &Path) -> Result<()> {
    if metadata.has_data_variable(variable) {
        Ok(())
    } else {
        Err(IngestionError::DataVariableNotFound {
            variable: variable.to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// Run a raster operation on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> RasterResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IngestionError::Task(e.to_string()))?
        .map_err(Into::into)
}

/// Deletes an upload record and its file.
///
/// Call [`release`](UploadGuard::release) on normal exit paths. A guard
/// dropped without release (task cancelled, panic) schedules the cleanup
/// on the current runtime.
pub(crate) struct UploadGuard {
    catalog: Arc<dyn RasterCatalog>,
    media: MediaStore,
    upload_id: Uuid,
    file_path: PathBuf,
    armed: bool,
}

impl UploadGuard {
    pub(crate) fn new(catalog: Arc<dyn RasterCatalog>, media: MediaStore, upload: &RasterUpload) -> Self {
        Self {
            catalog,
            media,
            upload_id: upload.id,
            file_path: upload.file_path.clone(),
            armed: true,
        }
    }

    /// Delete the upload now.
    pub(crate) async fn release(mut self) {
        self.armed = false;
        cleanup_upload(self.catalog.clone(), self.media.clone(), self.upload_id, self.file_path.clone()).await;
    }

    /// Keep the upload for a later publish step.
    pub(crate) fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let task = cleanup_upload(
            self.catalog.clone(),
            self.media.clone(),
            self.upload_id,
            std::mem::take(&mut self.file_path),
        );
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => warn!(upload_id = %self.upload_id, "No runtime to clean up upload"),
        }
    }
}

async fn cleanup_upload(catalog: Arc<dyn RasterCatalog>, media: MediaStore, upload_id: Uuid, path: PathBuf) {
    if let Err(e) = catalog.delete_upload(upload_id).await {
        warn!(upload_id = %upload_id, error = %e, "Failed to delete upload record");
    }
    media.delete_upload(&path).await;
    debug!(upload_id = %upload_id, "Upload cleaned up");
}
