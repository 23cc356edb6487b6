//! Raster layers, their published files and transient uploads.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::time::isoformat;
use crate::RasterMetadata;

/// Type name used in storage paths (`raster_files/RasterFileLayer-<id>/`).
pub const RASTER_FILE_LAYER_TYPE: &str = "RasterFileLayer";

/// Type name of published raster file records, used in clip cache keys.
pub const LAYER_RASTER_FILE_TYPE: &str = "LayerRasterFile";

/// Display format for the layer's time selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateFormat {
    #[default]
    #[serde(rename = "yyyy-MM-dd HH:mm")]
    HourMinute,
    #[serde(rename = "yyyy-MM-dd")]
    Day,
    #[serde(rename = "yyyy-MM")]
    Month,
    #[serde(rename = "MMMM yyyy")]
    MonthName,
    #[serde(rename = "pentadal")]
    Pentadal,
}

impl DateFormat {
    /// Parse the stored choice value. Unknown values fall back to the default.
    pub fn from_choice(s: &str) -> Self {
        match s {
            "yyyy-MM-dd" => Self::Day,
            "yyyy-MM" => Self::Month,
            "MMMM yyyy" => Self::MonthName,
            "pentadal" => Self::Pentadal,
            _ => Self::HourMinute,
        }
    }

    /// The stored choice value.
    pub fn as_choice(&self) -> &'static str {
        match self {
            Self::HourMinute => "yyyy-MM-dd HH:mm",
            Self::Day => "yyyy-MM-dd",
            Self::Month => "yyyy-MM",
            Self::MonthName => "MMMM yyyy",
            Self::Pentadal => "pentadal",
        }
    }

    /// Render a timestamp the way the time selector shows it.
    pub fn render(&self, dt: &DateTime<Utc>) -> String {
        match self {
            Self::HourMinute => dt.format("%Y-%m-%d %H:%M").to_string(),
            Self::Day => dt.format("%Y-%m-%d").to_string(),
            Self::Month => dt.format("%Y-%m").to_string(),
            Self::MonthName => dt.format("%B %Y").to_string(),
            Self::Pentadal => {
                let pentad = ((dt.day() - 1) / 5 + 1).min(6);
                format!("{} - P{}", dt.format("%b %Y"), pentad)
            }
        }
    }

    /// Time dimension block consumed by the map viewer.
    pub fn time_dimension_config(&self) -> serde_json::Value {
        let date_format = match self {
            Self::Pentadal => serde_json::json!({"currentTime": "MMM yyyy", "asPeriod": "pentadal"}),
            other => serde_json::json!({"currentTime": other.as_choice()}),
        };

        serde_json::json!({
            "key": "time",
            "required": true,
            "sentence": "{selector}",
            "type": "datetime",
            "availableDates": [],
            "dateFormat": date_format,
        })
    }
}

/// A logical raster series, e.g. "Monthly Rainfall".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterFileLayer {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub title: String,
    pub style_id: Option<i64>,
    pub auto_ingest_from_directory: bool,
    /// Data variable extracted from auto-ingested NetCDF files.
    pub auto_ingest_nc_data_variable: Option<String>,
    /// Operator-chosen directory name used instead of the layer id.
    pub auto_ingest_custom_directory_name: Option<String>,
    #[serde(default)]
    pub date_format: DateFormat,
}

impl RasterFileLayer {
    /// Minimal layer with auto-ingest disabled.
    pub fn new(id: Uuid, dataset_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id,
            dataset_id,
            title: title.into(),
            style_id: None,
            auto_ingest_from_directory: false,
            auto_ingest_nc_data_variable: None,
            auto_ingest_custom_directory_name: None,
            date_format: DateFormat::default(),
        }
    }

    /// Name of the layer's directory inside the auto-ingest root.
    pub fn directory_name(&self) -> String {
        match self.auto_ingest_custom_directory_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self.id.to_string(),
        }
    }

    /// Managed storage folder for the layer's published files.
    pub fn storage_folder(&self) -> String {
        format!("raster_files/{}-{}", RASTER_FILE_LAYER_TYPE, self.id)
    }
}

/// One published COG for one (layer, time) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRasterFile {
    pub id: Uuid,
    pub layer_id: Uuid,
    pub time: DateTime<Utc>,
    /// Path of the COG inside managed storage.
    pub file_path: PathBuf,
    pub metadata: Option<RasterMetadata>,
    pub created_at: DateTime<Utc>,
}

impl LayerRasterFile {
    /// File name of the backing COG.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Values needed to insert a new published raster file.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLayerRasterFile {
    pub layer_id: Uuid,
    pub time: DateTime<Utc>,
    pub file_path: PathBuf,
    pub metadata: Option<RasterMetadata>,
}

impl NewLayerRasterFile {
    pub fn into_record(self, id: Uuid) -> LayerRasterFile {
        LayerRasterFile {
            id,
            layer_id: self.layer_id,
            time: self.time,
            file_path: self.file_path,
            metadata: self.metadata,
            created_at: Utc::now(),
        }
    }
}

/// File name for a published COG: `{time}.tif`, prefixed with the data
/// variable for files extracted from NetCDF.
pub fn published_file_name(time: &DateTime<Utc>, data_variable: Option<&str>) -> String {
    let base = format!("{}.tif", isoformat(time));
    match data_variable {
        Some(var) if !var.is_empty() => format!("{}_{}", var, base),
        _ => base,
    }
}

/// A raw file waiting to be ingested. Deleted once ingestion ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterUpload {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub file_path: PathBuf,
    pub metadata: Option<RasterMetadata>,
    pub created_at: DateTime<Utc>,
}

impl RasterUpload {
    pub fn new(dataset_id: Uuid, file_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            dataset_id,
            file_path,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    /// Original file name of the upload.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_directory_name_prefers_custom_name() {
        let mut layer = RasterFileLayer::new(Uuid::new_v4(), Uuid::new_v4(), "Rainfall");
        assert_eq!(layer.directory_name(), layer.id.to_string());

        layer.auto_ingest_custom_directory_name = Some("chirps_daily".to_string());
        assert_eq!(layer.directory_name(), "chirps_daily");

        layer.auto_ingest_custom_directory_name = Some("  ".to_string());
        assert_eq!(layer.directory_name(), layer.id.to_string());
    }

    #[test]
    fn test_published_file_name() {
        let t = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(published_file_name(&t, None), "2023-01-01T00:00:00+00:00.tif");
        assert_eq!(
            published_file_name(&t, Some("precip")),
            "precip_2023-01-01T00:00:00+00:00.tif"
        );
    }

    #[test]
    fn test_date_format_render() {
        let t = Utc.with_ymd_and_hms(2023, 1, 12, 6, 30, 0).unwrap();
        assert_eq!(DateFormat::HourMinute.render(&t), "2023-01-12 06:30");
        assert_eq!(DateFormat::MonthName.render(&t), "January 2023");
        assert_eq!(DateFormat::Pentadal.render(&t), "Jan 2023 - P3");

        let end = Utc.with_ymd_and_hms(2023, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(DateFormat::Pentadal.render(&end), "Jan 2023 - P6");
    }

    #[test]
    fn test_time_dimension_config() {
        let config = DateFormat::Pentadal.time_dimension_config();
        assert_eq!(config["dateFormat"]["asPeriod"], "pentadal");

        let config = DateFormat::from_choice("unknown").time_dimension_config();
        assert_eq!(config["dateFormat"]["currentTime"], "yyyy-MM-dd HH:mm");
    }
}
