//! Raster catalog: layers, published raster files, styles, geostores and
//! pending uploads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use geomanager_common::{
    Geostore, LayerRasterFile, NewLayerRasterFile, RasterFileLayer, RasterMetadata, RasterStyle,
    RasterUpload,
};

use crate::error::Result;

/// Inclusive time window for listing raster files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, time: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| *time >= s) && self.end.map_or(true, |e| *time <= e)
    }
}

/// Records swapped by [`RasterCatalog::replace_raster_file`].
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    /// The deleted record, `None` when the time was free.
    pub previous: Option<LayerRasterFile>,
    pub file: LayerRasterFile,
}

/// Persistence operations the pipeline needs.
///
/// `(layer_id, time)` is unique across raster files. Records are never
/// updated in place: [`replace_raster_file`](RasterCatalog::replace_raster_file)
/// deletes and inserts atomically.
#[async_trait]
pub trait RasterCatalog: Send + Sync {
    async fn get_layer(&self, id: Uuid) -> Result<Option<RasterFileLayer>>;

    /// Layer owning an auto-ingest directory.
    ///
    /// Matches the layer id when `name` parses as a UUID, otherwise the
    /// custom directory name of a layer with auto-ingest enabled.
    async fn find_layer_by_directory(&self, name: &str) -> Result<Option<RasterFileLayer>>;

    async fn find_raster_file(
        &self,
        layer_id: Uuid,
        time: DateTime<Utc>,
    ) -> Result<Option<LayerRasterFile>>;

    async fn get_raster_file(&self, id: Uuid) -> Result<Option<LayerRasterFile>>;

    /// Files of a layer ordered by time.
    async fn list_raster_files(&self, layer_id: Uuid, range: TimeRange) -> Result<Vec<LayerRasterFile>>;

    /// Insert a new record. Fails with `Conflict` when the time is taken.
    async fn create_raster_file(&self, file: NewLayerRasterFile) -> Result<LayerRasterFile>;

    /// Delete the record at `(file.layer_id, file.time)`, if any, and insert
    /// `file` in one transaction.
    ///
    /// On failure nothing changes. The caller removes the previous backing
    /// file after this returns. A concurrent writer committing the same time
    /// first surfaces as `Conflict`.
    async fn replace_raster_file(&self, file: NewLayerRasterFile) -> Result<Replacement>;

    async fn get_style(&self, id: i64) -> Result<Option<RasterStyle>>;

    async fn get_geostore(&self, id: Uuid) -> Result<Option<Geostore>>;

    async fn create_upload(&self, upload: &RasterUpload) -> Result<()>;

    async fn update_upload_metadata(&self, id: Uuid, metadata: &RasterMetadata) -> Result<()>;

    async fn get_upload(&self, id: Uuid) -> Result<Option<RasterUpload>>;

    async fn delete_upload(&self, id: Uuid) -> Result<()>;
}

/// Shared matching rule for [`RasterCatalog::find_layer_by_directory`].
pub fn layer_matches_directory(layer: &RasterFileLayer, name: &str) -> bool {
    match Uuid::parse_str(name) {
        Ok(id) => layer.id == id,
        Err(_) => {
            layer.auto_ingest_from_directory
                && layer
                    .auto_ingest_custom_directory_name
                    .as_deref()
                    .map(str::trim)
                    == Some(name)
        }
    }
}
