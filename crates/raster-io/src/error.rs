//! Error types for raster inspection and conversion.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing rasters.
#[derive(Error, Debug)]
pub enum RasterError {
    #[error("Failed to open raster {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("Unsupported raster format '{driver}' for {path}")]
    UnsupportedRasterFormat { path: PathBuf, driver: String },

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("NetCDF error: {0}")]
    NetCdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Variable not found: {0}")]
    MissingVariable(String),

    #[error("Invalid time units '{0}'")]
    InvalidTimeUnits(String),

    #[error("Unsupported calendar '{0}'")]
    UnsupportedCalendar(String),

    #[error("Band index {index} out of range ({count} bands)")]
    BandOutOfRange { index: usize, count: usize },

    #[error("Raster {0} has no bands")]
    NoBands(PathBuf),

    #[error("Rotated or sheared rasters are not supported")]
    RotatedRaster,

    #[error("Clip geometry is empty")]
    EmptyGeometry,

    #[error("Clip geometry does not overlap the raster")]
    OutsideRaster,
}

impl From<netcdf::Error> for RasterError {
    fn from(err: netcdf::Error) -> Self {
        RasterError::NetCdf(err.to_string())
    }
}

/// Result type for raster operations.
pub type RasterResult<T> = Result<T, RasterError>;
