//! Inspected raster metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::parse_iso_datetime;
use crate::{BoundingBox, GeoResult};

/// Raster format family accepted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RasterDriver {
    #[serde(rename = "GTiff")]
    GTiff,
    #[serde(rename = "netCDF")]
    NetCdf,
}

impl RasterDriver {
    /// Map a GDAL driver short name to a supported driver.
    pub fn from_short_name(name: &str) -> Option<Self> {
        match name {
            "GTiff" | "COG" => Some(Self::GTiff),
            "netCDF" => Some(Self::NetCdf),
            _ => None,
        }
    }

    /// GDAL short name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GTiff => "GTiff",
            Self::NetCdf => "netCDF",
        }
    }

    /// File extension (with dot) used when writing this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::GTiff => ".tif",
            Self::NetCdf => ".nc",
        }
    }
}

impl fmt::Display for RasterDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the pipeline needs to know about a raster file without
/// keeping it open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    /// CRS as "AUTH:CODE" when known, otherwise WKT. `None` when absent.
    pub crs: Option<String>,
    pub bounds: BoundingBox,
    pub width: usize,
    pub height: usize,
    pub bands_count: usize,
    pub driver: RasterDriver,
    /// Per-band nodata, NaN stored as `None`.
    pub nodatavals: Vec<Option<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_variables: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<String>,
    /// ISO-8601 timestamps, one per time index (NetCDF only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timestamps: Vec<String>,
}

impl RasterMetadata {
    pub fn is_netcdf(&self) -> bool {
        self.driver == RasterDriver::NetCdf
    }

    pub fn has_data_variable(&self, name: &str) -> bool {
        self.data_variables.iter().any(|v| v == name)
    }

    /// Timestamps parsed as UTC datetimes.
    pub fn parsed_timestamps(&self) -> GeoResult<Vec<DateTime<Utc>>> {
        self.timestamps.iter().map(|t| parse_iso_datetime(t)).collect()
    }

    /// Nodata of the first band, if any.
    pub fn first_nodata(&self) -> Option<f64> {
        self.nodatavals.first().copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RasterMetadata {
        RasterMetadata {
            crs: None,
            bounds: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            width: 10,
            height: 10,
            bands_count: 3,
            driver: RasterDriver::NetCdf,
            nodatavals: vec![None, Some(-9999.0), None],
            data_variables: vec!["precip".to_string()],
            dimensions: vec!["time".to_string(), "lat".to_string(), "lon".to_string()],
            timestamps: vec![
                "2023-01-01T00:00:00".to_string(),
                "2023-01-02T00:00:00".to_string(),
            ],
        }
    }

    #[test]
    fn test_driver_serializes_with_gdal_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["driver"], "netCDF");
        assert_eq!(json["nodatavals"][0], serde_json::Value::Null);

        let gtiff = serde_json::to_string(&RasterDriver::GTiff).unwrap();
        assert_eq!(gtiff, "\"GTiff\"");
    }

    #[test]
    fn test_from_short_name() {
        assert_eq!(RasterDriver::from_short_name("GTiff"), Some(RasterDriver::GTiff));
        assert_eq!(RasterDriver::from_short_name("netCDF"), Some(RasterDriver::NetCdf));
        assert_eq!(RasterDriver::from_short_name("HDF5"), None);
    }

    #[test]
    fn test_parsed_timestamps() {
        let times = sample().parsed_timestamps().unwrap();
        assert_eq!(times.len(), 2);
        assert_eq!(times[1].to_rfc3339(), "2023-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_first_nodata_and_variables() {
        let meta = sample();
        assert_eq!(meta.first_nodata(), None);
        assert!(meta.has_data_variable("precip"));
        assert!(!meta.has_data_variable("tmax"));
    }
}
