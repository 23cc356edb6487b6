//! Resolve request parameters into a raster file, a local path and a style.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use geomanager_common::{tile_timestamp, Geostore, LayerRasterFile, RasterFileLayer, RasterStyle};
use renderer::{Legend, StyleEngine};
use storage::{GeostoreClipCache, MediaStore, RasterCatalog};

use crate::error::{Result, TileError};
use crate::params::{StyleParam, TileOptions, TileQueryParams};

/// Everything a renderer needs for one tile or thumbnail.
#[derive(Debug, Clone)]
pub struct ResolvedTile {
    pub layer: RasterFileLayer,
    pub file: LayerRasterFile,
    /// Local path to read, clipped when a geostore was requested.
    pub path: PathBuf,
    /// Band configuration, `None` to render unstyled.
    pub style: Option<Value>,
    pub options: TileOptions,
}

/// Looks up raster files and styles for serve-time requests.
#[derive(Clone)]
pub struct TileSource {
    catalog: Arc<dyn RasterCatalog>,
    media: MediaStore,
    clip_cache: Arc<GeostoreClipCache>,
}

impl TileSource {
    pub fn new(catalog: Arc<dyn RasterCatalog>, media: MediaStore, clip_cache: Arc<GeostoreClipCache>) -> Self {
        Self {
            catalog,
            media,
            clip_cache,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn RasterCatalog> {
        &self.catalog
    }

    pub fn clip_cache(&self) -> &GeostoreClipCache {
        &self.clip_cache
    }

    /// Resolve a tile request for `layer_id`. `time` is required.
    pub async fn resolve_tile(&self, layer_id: Uuid, params: &TileQueryParams) -> Result<ResolvedTile> {
        let time = params.time()?;
        let options = params.options()?;
        let file = self.raster_file_at(layer_id, time).await?;
        let layer = self.layer(file.layer_id).await?;

        let path = self.local_path(&file, options.geostore_id).await?;
        let style = self.resolve_style(&layer, &options.style).await?;

        debug!(
            layer_id = %layer.id,
            time = %tile_timestamp(&file.time),
            path = %path.display(),
            styled = style.is_some(),
            "Resolved tile source"
        );
        Ok(ResolvedTile {
            layer,
            file,
            path,
            style,
            options,
        })
    }

    /// Resolve a thumbnail of one raster file. Thumbnails are never clipped.
    pub async fn resolve_thumbnail(&self, file_id: Uuid, params: &TileQueryParams) -> Result<ResolvedTile> {
        let mut options = params.options()?;
        options.geostore_id = None;

        let file = self.raster_file(file_id).await?;
        let layer = self.layer(file.layer_id).await?;
        let style = self.resolve_style(&layer, &options.style).await?;

        Ok(ResolvedTile {
            path: self.media.resolve(&file.file_path),
            layer,
            file,
            style,
            options,
        })
    }

    pub async fn layer(&self, layer_id: Uuid) -> Result<RasterFileLayer> {
        self.catalog
            .get_layer(layer_id)
            .await?
            .ok_or(TileError::LayerNotFound(layer_id))
    }

    /// The raster file of `layer_id` at exactly `time`.
    pub async fn raster_file_at(&self, layer_id: Uuid, time: DateTime<Utc>) -> Result<LayerRasterFile> {
        self.catalog
            .find_raster_file(layer_id, time)
            .await?
            .ok_or_else(|| TileError::RasterFileNotFound {
                layer_id,
                time: tile_timestamp(&time),
            })
    }

    pub async fn raster_file(&self, file_id: Uuid) -> Result<LayerRasterFile> {
        self.catalog
            .get_raster_file(file_id)
            .await?
            .ok_or(TileError::RasterFileIdNotFound(file_id))
    }

    pub async fn geostore(&self, geostore_id: Uuid) -> Result<Geostore> {
        self.catalog
            .get_geostore(geostore_id)
            .await?
            .ok_or(TileError::GeostoreNotFound(geostore_id))
    }

    /// Local path of `file`, clipped through the cache when a geostore is given.
    pub async fn local_path(&self, file: &LayerRasterFile, geostore_id: Option<Uuid>) -> Result<PathBuf> {
        let source = self.media.resolve(&file.file_path);
        match geostore_id {
            None => Ok(source),
            Some(id) => {
                let geostore = self.geostore(id).await?;
                Ok(self.clip_cache.resolve_local_path(file, &source, &geostore).await?)
            }
        }
    }

    /// Style document for a request on `layer`.
    pub async fn resolve_style(&self, layer: &RasterFileLayer, param: &StyleParam) -> Result<Option<Value>> {
        match param {
            StyleParam::Layer => Ok(self
                .layer_style(layer)
                .await?
                .map(|style| StyleEngine::new(&style).style_json())),
            StyleParam::Inline(value) => Ok(Some(value.clone())),
            StyleParam::Unstyled => Ok(None),
        }
    }

    /// The layer's configured style. A dangling style id counts as none.
    pub async fn layer_style(&self, layer: &RasterFileLayer) -> Result<Option<RasterStyle>> {
        let Some(style_id) = layer.style_id else {
            return Ok(None);
        };
        let style = self.catalog.get_style(style_id).await?;
        if style.is_none() {
            warn!(layer_id = %layer.id, style_id, "Layer references a missing style");
        }
        Ok(style)
    }

    /// Legend of the layer's style, if it has one.
    pub async fn layer_legend(&self, layer_id: Uuid) -> Result<Option<Legend>> {
        let layer = self.layer(layer_id).await?;
        Ok(self
            .layer_style(&layer)
            .await?
            .map(|style| StyleEngine::new(&style).legend()))
    }
}
