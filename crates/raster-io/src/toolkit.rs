//! Raster operations behind traits so callers can swap in fakes.
//!
//! All methods block on GDAL or NetCDF I/O. Async callers should run them
//! with `tokio::task::spawn_blocking`.

use std::path::Path;

use geo_types::MultiPolygon;

use geomanager_common::{RasterDriver, RasterMetadata};

use crate::error::RasterResult;
use crate::nc::DEFAULT_TIME_DIMENSIONS;

/// Clip a raster to a geometry.
pub trait RasterClip: Send + Sync {
    fn clip(
        &self,
        src: &Path,
        driver: RasterDriver,
        geometry: &MultiPolygon<f64>,
        out: &Path,
    ) -> RasterResult<()>;
}

/// Everything the ingestion and tile paths need from a raster library.
pub trait RasterToolkit: RasterClip {
    fn read_info(&self, path: &Path) -> RasterResult<RasterMetadata>;

    fn convert_to_cog(
        &self,
        metadata: &RasterMetadata,
        src: &Path,
        out: &Path,
        band_index: Option<usize>,
        data_variable: Option<&str>,
    ) -> RasterResult<()>;

    fn pixel_value(&self, path: &Path, x: f64, y: f64) -> RasterResult<Option<f64>>;

    fn valid_values(&self, path: &Path) -> RasterResult<Vec<f64>>;
}

/// GDAL/NetCDF backed toolkit.
#[derive(Debug, Clone)]
pub struct GdalToolkit {
    time_dimensions: Vec<String>,
}

impl GdalToolkit {
    pub fn new(time_dimensions: Vec<String>) -> Self {
        Self { time_dimensions }
    }

    pub fn time_dimensions(&self) -> &[String] {
        &self.time_dimensions
    }
}

impl Default for GdalToolkit {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_DIMENSIONS.iter().map(|s| s.to_string()).collect())
    }
}

impl RasterClip for GdalToolkit {
    fn clip(
        &self,
        src: &Path,
        driver: RasterDriver,
        geometry: &MultiPolygon<f64>,
        out: &Path,
    ) -> RasterResult<()> {
        crate::clip::clip_raster(src, driver, geometry, out)
    }
}

impl RasterToolkit for GdalToolkit {
    fn read_info(&self, path: &Path) -> RasterResult<RasterMetadata> {
        crate::info::read_info(path, &self.time_dimensions)
    }

    fn convert_to_cog(
        &self,
        metadata: &RasterMetadata,
        src: &Path,
        out: &Path,
        band_index: Option<usize>,
        data_variable: Option<&str>,
    ) -> RasterResult<()> {
        crate::cog::to_cog(metadata, src, out, band_index, data_variable)
    }

    fn pixel_value(&self, path: &Path, x: f64, y: f64) -> RasterResult<Option<f64>> {
        crate::query::pixel_value(path, x, y)
    }

    fn valid_values(&self, path: &Path) -> RasterResult<Vec<f64>> {
        crate::query::valid_values(path)
    }
}
