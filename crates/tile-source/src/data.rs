//! Pixel, geostore and time series queries plus tile metadata.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use geomanager_common::{tile_timestamp, LayerRasterFile, RasterFileLayer};
use raster_io::{BandStatistics, RasterResult, RasterToolkit};
use storage::TimeRange;

use crate::error::{Result, TileError};
use crate::params::TileQueryParams;
use crate::resolver::TileSource;

/// A value at one time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: DateTime<Utc>,
    pub value: Option<f64>,
}

/// Statistics of one raster file within a geostore.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeostoreData {
    pub date: DateTime<Utc>,
    /// `None` when the geostore covers no valid pixels.
    pub statistics: Option<BandStatistics>,
}

/// Time dimension description of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMetadata {
    pub layer_id: Uuid,
    pub name: String,
    pub time_parameter: String,
    /// Available times, `%Y-%m-%dT%H:%M:%S.000Z`, ascending.
    pub timestamps: Vec<String>,
    /// Same times rendered with the layer's date format.
    pub display_dates: Vec<String>,
    pub time_config: Value,
}

/// Value queries over a layer's published rasters.
#[derive(Clone)]
pub struct RasterQuery {
    source: TileSource,
    toolkit: Arc<dyn RasterToolkit>,
}

impl RasterQuery {
    pub fn new(source: TileSource, toolkit: Arc<dyn RasterToolkit>) -> Self {
        Self { source, toolkit }
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    /// Band 1 value at `x`/`y` in the file at `time`.
    pub async fn pixel(&self, layer_id: Uuid, params: &TileQueryParams) -> Result<DatedValue> {
        let time = params.time()?;
        let (x, y) = params.coords()?;
        let file = self.source.raster_file_at(layer_id, time).await?;
        self.pixel_of(&file, x, y).await
    }

    /// Band 1 value at `x`/`y` for every file in the requested range.
    pub async fn pixel_timeseries(&self, layer_id: Uuid, params: &TileQueryParams) -> Result<Vec<DatedValue>> {
        let range = params.time_range()?;
        let (x, y) = params.coords()?;

        let mut series = Vec::new();
        for file in self.files_in(layer_id, range).await? {
            series.push(self.pixel_of(&file, x, y).await?);
        }
        Ok(series)
    }

    /// Statistics of valid values inside a geostore for the file at `time`.
    pub async fn geostore_statistics(&self, layer_id: Uuid, params: &TileQueryParams) -> Result<GeostoreData> {
        let geostore_id = params.required_geostore_id()?;
        let time = params.time()?;
        self.source.geostore(geostore_id).await?;

        let file = self.source.raster_file_at(layer_id, time).await?;
        self.statistics_of(&file, geostore_id).await
    }

    /// One statistic per file in the requested range, chosen by `value_type`.
    pub async fn geostore_timeseries(&self, layer_id: Uuid, params: &TileQueryParams) -> Result<Vec<DatedValue>> {
        let range = params.time_range()?;
        let geostore_id = params.required_geostore_id()?;
        let statistic = params.statistic();
        self.source.geostore(geostore_id).await?;

        let mut series = Vec::new();
        for file in self.files_in(layer_id, range).await? {
            let data = self.statistics_of(&file, geostore_id).await?;
            series.push(DatedValue {
                date: data.date,
                value: data.statistics.map(|s| s.get(statistic)),
            });
        }
        Ok(series)
    }

    /// Available times of a layer for the map viewer.
    pub async fn tile_metadata(&self, layer_id: Uuid) -> Result<TileMetadata> {
        let layer = self.source.layer(layer_id).await?;
        let files = self.files_in(layer_id, TimeRange::default()).await?;
        Ok(tile_metadata(&layer, &files))
    }

    async fn files_in(&self, layer_id: Uuid, range: TimeRange) -> Result<Vec<LayerRasterFile>> {
        Ok(self.source.catalog().list_raster_files(layer_id, range).await?)
    }

    async fn pixel_of(&self, file: &LayerRasterFile, x: f64, y: f64) -> Result<DatedValue> {
        counter!("geomanager_pixel_queries_total").increment(1);
        let path = self.source.local_path(file, None).await?;
        let toolkit = Arc::clone(&self.toolkit);
        let value = blocking(move || toolkit.pixel_value(&path, x, y)).await?;
        Ok(DatedValue {
            date: file.time,
            value,
        })
    }

    async fn statistics_of(&self, file: &LayerRasterFile, geostore_id: Uuid) -> Result<GeostoreData> {
        counter!("geomanager_geostore_queries_total").increment(1);
        let path = self.source.local_path(file, Some(geostore_id)).await?;
        let toolkit = Arc::clone(&self.toolkit);
        let values = blocking(move || toolkit.valid_values(&path)).await?;
        Ok(GeostoreData {
            date: file.time,
            statistics: BandStatistics::from_values(&values),
        })
    }
}

/// Build tile metadata from a layer and its files, in time order.
pub fn tile_metadata(layer: &RasterFileLayer, files: &[LayerRasterFile]) -> TileMetadata {
    let mut times: Vec<DateTime<Utc>> = files.iter().map(|f| f.time).collect();
    times.sort();

    TileMetadata {
        layer_id: layer.id,
        name: layer.title.clone(),
        time_parameter: "time".to_string(),
        timestamps: times.iter().map(tile_timestamp).collect(),
        display_dates: times.iter().map(|t| layer.date_format.render(t)).collect(),
        time_config: layer.date_format.time_dimension_config(),
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> RasterResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TileError::Task(e.to_string()))?
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use chrono::TimeZone;
    use geomanager_common::DateFormat;

    fn file_at(layer: &RasterFileLayer, month: u32) -> LayerRasterFile {
        geomanager_common::NewLayerRasterFile {
            layer_id: layer.id,
            time: Utc.with_ymd_and_hms(2023, month, 1, 0, 0, 0).unwrap(),
            file_path: PathBuf::from(format!("raster_files/{}.tif", month)),
            metadata: None,
        }
        .into_record(Uuid::new_v4())
    }

    #[test]
    fn test_tile_metadata_sorted_and_formatted() {
        let mut layer = RasterFileLayer::new(Uuid::new_v4(), Uuid::new_v4(), "Rainfall");
        layer.date_format = DateFormat::Month;
        let files = vec![file_at(&layer, 3), file_at(&layer, 1)];

        let metadata = tile_metadata(&layer, &files);
        assert_eq!(metadata.name, "Rainfall");
        assert_eq!(
            metadata.timestamps,
            vec!["2023-01-01T00:00:00.000Z", "2023-03-01T00:00:00.000Z"]
        );
        assert_eq!(metadata.display_dates, vec!["2023-01", "2023-03"]);
        assert_eq!(metadata.time_config["dateFormat"]["currentTime"], "yyyy-MM");
    }

    #[test]
    fn test_pentadal_time_config() {
        let mut layer = RasterFileLayer::new(Uuid::new_v4(), Uuid::new_v4(), "CHIRPS");
        layer.date_format = DateFormat::Pentadal;

        let metadata = tile_metadata(&layer, &[]);
        assert!(metadata.timestamps.is_empty());
        assert_eq!(metadata.time_config["dateFormat"]["asPeriod"], "pentadal");
        assert_eq!(metadata.time_config["dateFormat"]["currentTime"], "MMM yyyy");
    }
}
