//! File-name level metadata: format detection, timestamps and the
//! auto-ingest layer directory.

use std::path::Path;

use chrono::{DateTime, Utc};

use geomanager_common::{extract_iso_date_from_filename, RasterDriver};

use crate::error::{IngestionError, Result};

/// Detect the raster format from a file extension.
///
/// Only `.tif` and `.nc` are accepted.
pub fn detect_file_type(path: &Path) -> Option<RasterDriver> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "tif" => Some(RasterDriver::GTiff),
        "nc" => Some(RasterDriver::NetCdf),
        _ => None,
    }
}

/// Check that a raw file exists and has an accepted extension.
pub fn validate_raw_file(path: &Path) -> Result<RasterDriver> {
    if !path.is_file() {
        return Err(IngestionError::FileNotFound(path.to_path_buf()));
    }
    detect_file_type(path).ok_or_else(|| IngestionError::InvalidExtension(path.to_path_buf()))
}

/// Timestamp a GeoTIFF file name ends with, e.g.
/// `rainfall_2023-01-01T00:00:00.000Z.tif`.
pub fn timestamp_from_filename(path: &Path) -> Result<DateTime<Utc>> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    extract_iso_date_from_filename(&stem).ok_or(IngestionError::MissingTimestampInFilename(stem))
}

/// Name of the directory a watched file sits in.
pub fn layer_directory_name(path: &Path) -> Option<String> {
    path.parent()?
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}
