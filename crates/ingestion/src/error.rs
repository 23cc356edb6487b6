//! Error types for the ingestion crate.

use std::path::PathBuf;

use thiserror::Error;

use geomanager_common::{GeoError, RasterDriver};
use raster_io::RasterError;
use storage::StorageError;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported file extension for {0}. Expected .tif or .nc")]
    InvalidExtension(PathBuf),

    #[error("Directory '{0}' is not a layer id or a custom layer directory")]
    InvalidLayerDirectory(String),

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Layer {layer} has no NetCDF data variable configured")]
    MissingDataVariable { layer: String },

    #[error("Data variable '{variable}' not found in {path}")]
    DataVariableNotFound { variable: String, path: PathBuf },

    #[error("No timestamps found in {0}")]
    MissingTimestamps(PathBuf),

    #[error("Could not extract a timestamp from file name {0}")]
    MissingTimestampInFilename(String),

    #[error("Raster {0} lies outside the configured boundary")]
    BoundaryDisjoint(PathBuf),

    #[error("File with date {time} already exists for layer {layer}")]
    TimeExists {
        time: String,
        layer: String,
        field: &'static str,
    },

    #[error("A {selection} selection cannot publish a {driver} upload")]
    SelectionMismatch {
        selection: &'static str,
        driver: RasterDriver,
    },

    #[error("Upload {upload} belongs to another dataset than layer {layer}")]
    UploadLayerMismatch { upload: String, layer: String },

    #[error("Upload not found: {0}")]
    UploadNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Geo(#[from] GeoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl IngestionError {
    /// Upload form field an error belongs to, for interactive uploads.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::FileNotFound(_)
            | Self::InvalidExtension(_)
            | Self::BoundaryDisjoint(_)
            | Self::SelectionMismatch { .. } => Some("file"),
            Self::MissingDataVariable { .. } | Self::DataVariableNotFound { .. } => {
                Some("data_variable")
            }
            Self::MissingTimestamps(_) => Some("nc_dates"),
            Self::MissingTimestampInFilename(_) => Some("time"),
            Self::TimeExists { field, .. } => Some(*field),
            Self::InvalidLayerDirectory(_)
            | Self::LayerNotFound(_)
            | Self::UploadLayerMismatch { .. } => Some("layer"),
            _ => None,
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_exists_message_and_field() {
        let err = IngestionError::TimeExists {
            time: "2023-01-01T00:00:00.000Z".to_string(),
            layer: "Rainfall".to_string(),
            field: "nc_dates",
        };
        assert_eq!(
            err.to_string(),
            "File with date 2023-01-01T00:00:00.000Z already exists for layer Rainfall"
        );
        assert_eq!(err.field(), Some("nc_dates"));
    }

    #[test]
    fn test_pipeline_errors_have_no_field() {
        let err = IngestionError::Task("join".to_string());
        assert_eq!(err.field(), None);
    }
}
