//! In-memory catalog for tests and dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use geomanager_common::{
    Geostore, LayerRasterFile, NewLayerRasterFile, RasterFileLayer, RasterMetadata, RasterStyle,
    RasterUpload,
};

use crate::catalog::{layer_matches_directory, RasterCatalog, Replacement, TimeRange};
use crate::error::{Result, StorageError};

#[derive(Debug, Default, Clone)]
struct State {
    layers: HashMap<Uuid, RasterFileLayer>,
    files: HashMap<Uuid, LayerRasterFile>,
    styles: HashMap<i64, RasterStyle>,
    geostores: HashMap<Uuid, Geostore>,
    uploads: HashMap<Uuid, RasterUpload>,
}

impl State {
    fn time_taken(&self, layer_id: Uuid, time: DateTime<Utc>) -> bool {
        self.files
            .values()
            .any(|f| f.layer_id == layer_id && f.time == time)
    }
}

/// Catalog held entirely in memory.
///
/// Each write runs under one lock, so a replace is a single critical
/// section. [`fail_next_replace`](MemoryCatalog::fail_next_replace) aborts
/// the next replace after its delete has been staged.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: RwLock<State>,
    fail_next_replace: AtomicBool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_layer(&self, layer: RasterFileLayer) {
        self.state.write().await.layers.insert(layer.id, layer);
    }

    pub async fn insert_style(&self, style: RasterStyle) {
        self.state.write().await.styles.insert(style.id, style);
    }

    pub async fn insert_geostore(&self, geostore: Geostore) {
        self.state.write().await.geostores.insert(geostore.id, geostore);
    }

    /// Make the next `replace_raster_file` abort before committing.
    pub fn fail_next_replace(&self) {
        self.fail_next_replace.store(true, Ordering::SeqCst);
    }

    pub async fn raster_file_count(&self) -> usize {
        self.state.read().await.files.len()
    }

    pub async fn upload_count(&self) -> usize {
        self.state.read().await.uploads.len()
    }
}

#[async_trait]
impl RasterCatalog for MemoryCatalog {
    async fn get_layer(&self, id: Uuid) -> Result<Option<RasterFileLayer>> {
        Ok(self.state.read().await.layers.get(&id).cloned())
    }

    async fn find_layer_by_directory(&self, name: &str) -> Result<Option<RasterFileLayer>> {
        let state = self.state.read().await;
        Ok(state
            .layers
            .values()
            .find(|layer| layer_matches_directory(layer, name))
            .cloned())
    }

    async fn find_raster_file(
        &self,
        layer_id: Uuid,
        time: DateTime<Utc>,
    ) -> Result<Option<LayerRasterFile>> {
        let state = self.state.read().await;
        Ok(state
            .files
            .values()
            .find(|f| f.layer_id == layer_id && f.time == time)
            .cloned())
    }

    async fn get_raster_file(&self, id: Uuid) -> Result<Option<LayerRasterFile>> {
        Ok(self.state.read().await.files.get(&id).cloned())
    }

    async fn list_raster_files(&self, layer_id: Uuid, range: TimeRange) -> Result<Vec<LayerRasterFile>> {
        let state = self.state.read().await;
        let mut files: Vec<LayerRasterFile> = state
            .files
            .values()
            .filter(|f| f.layer_id == layer_id && range.contains(&f.time))
            .cloned()
            .collect();
        files.sort_by_key(|f| f.time);
        Ok(files)
    }

    async fn create_raster_file(&self, file: NewLayerRasterFile) -> Result<LayerRasterFile> {
        let mut state = self.state.write().await;
        if state.time_taken(file.layer_id, file.time) {
            return Err(StorageError::Conflict(format!(
                "raster file for layer {} at {} already exists",
                file.layer_id, file.time
            )));
        }

        let record = file.into_record(Uuid::new_v4());
        state.files.insert(record.id, record.clone());
        Ok(record)
    }

    async fn replace_raster_file(&self, file: NewLayerRasterFile) -> Result<Replacement> {
        let mut state = self.state.write().await;

        // Work on a copy; it only replaces the live state on commit.
        let mut staged = state.clone();
        let previous_id = staged
            .files
            .values()
            .find(|f| f.layer_id == file.layer_id && f.time == file.time)
            .map(|f| f.id);
        let previous = previous_id.and_then(|id| staged.files.remove(&id));

        if self.fail_next_replace.swap(false, Ordering::SeqCst) {
            return Err(StorageError::TransactionAborted(format!(
                "replace of raster file for layer {} at {}",
                file.layer_id, file.time
            )));
        }

        let record = file.into_record(Uuid::new_v4());
        staged.files.insert(record.id, record.clone());
        *state = staged;

        debug!(old = ?previous.as_ref().map(|f| f.id), new = %record.id, "Replaced raster file");
        Ok(Replacement {
            previous,
            file: record,
        })
    }

    async fn get_style(&self, id: i64) -> Result<Option<RasterStyle>> {
        Ok(self.state.read().await.styles.get(&id).cloned())
    }

    async fn get_geostore(&self, id: Uuid) -> Result<Option<Geostore>> {
        Ok(self.state.read().await.geostores.get(&id).cloned())
    }

    async fn create_upload(&self, upload: &RasterUpload) -> Result<()> {
        self.state
            .write()
            .await
            .uploads
            .insert(upload.id, upload.clone());
        Ok(())
    }

    async fn update_upload_metadata(&self, id: Uuid, metadata: &RasterMetadata) -> Result<()> {
        let mut state = self.state.write().await;
        let upload = state
            .uploads
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("upload {}", id)))?;
        upload.metadata = Some(metadata.clone());
        Ok(())
    }

    async fn get_upload(&self, id: Uuid) -> Result<Option<RasterUpload>> {
        Ok(self.state.read().await.uploads.get(&id).cloned())
    }

    async fn delete_upload(&self, id: Uuid) -> Result<()> {
        self.state.write().await.uploads.remove(&id);
        Ok(())
    }
}
