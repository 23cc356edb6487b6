//! Raster inspection.

use std::path::Path;

use gdal::spatial_ref::SpatialRef;
use gdal::Dataset;
use tracing::debug;

use geomanager_common::time::naive_isoformat;
use geomanager_common::{RasterDriver, RasterMetadata};

use crate::error::{RasterError, RasterResult};
use crate::mask::PixelGrid;
use crate::nc::{inspect_netcdf, subdataset_path};

/// GDAL's geotransform for rasters without georeferencing.
const DEFAULT_GEOTRANSFORM: [f64; 6] = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Open a raster with GDAL, mapping failures to [`RasterError::Open`].
pub(crate) fn open_dataset(path: &str) -> RasterResult<Dataset> {
    Dataset::open(path).map_err(|e| RasterError::Open {
        path: path.into(),
        message: e.to_string(),
    })
}

/// Describe a GeoTIFF or NetCDF file.
///
/// Any other GDAL driver fails with [`RasterError::UnsupportedRasterFormat`].
/// For NetCDF, `time_dimensions` names the dimensions read as the time axis.
pub fn read_info(path: &Path, time_dimensions: &[String]) -> RasterResult<RasterMetadata> {
    let dataset = open_dataset(&path.to_string_lossy())?;
    let short_name = dataset.driver().short_name();
    let driver = RasterDriver::from_short_name(&short_name).ok_or_else(|| {
        RasterError::UnsupportedRasterFormat {
            path: path.to_path_buf(),
            driver: short_name.clone(),
        }
    })?;

    let metadata = match driver {
        RasterDriver::GTiff => describe(&dataset, driver)?,
        RasterDriver::NetCdf => {
            let summary = inspect_netcdf(path, time_dimensions)?;

            // Multi-variable files expose no bands at the root; georeference
            // from the first data variable instead.
            let mut metadata = match summary.data_variables.first() {
                Some(var) if dataset.raster_count() == 0 => {
                    let sub = open_dataset(&subdataset_path(path, var))?;
                    describe(&sub, driver)?
                }
                _ => describe(&dataset, driver)?,
            };

            metadata.data_variables = summary.data_variables;
            metadata.dimensions = summary.dimensions;
            metadata.timestamps = summary.timestamps.iter().map(naive_isoformat).collect();
            metadata
        }
    };

    debug!(
        path = %path.display(),
        driver = %metadata.driver,
        width = metadata.width,
        height = metadata.height,
        bands = metadata.bands_count,
        "Read raster info"
    );

    Ok(metadata)
}

fn describe(dataset: &Dataset, driver: RasterDriver) -> RasterResult<RasterMetadata> {
    let (width, height) = dataset.raster_size();
    let geotransform = dataset.geo_transform().unwrap_or(DEFAULT_GEOTRANSFORM);
    let bounds = PixelGrid::from_geotransform(&geotransform, width, height)?.bounds();

    let bands_count = dataset.raster_count();
    let nodatavals = (1..=bands_count)
        .map(|i| {
            dataset
                .rasterband(i)
                .map(|band| band.no_data_value().filter(|v| !v.is_nan()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RasterMetadata {
        crs: crs_string(dataset),
        bounds,
        width,
        height,
        bands_count,
        driver,
        nodatavals,
        data_variables: Vec::new(),
        dimensions: Vec::new(),
        timestamps: Vec::new(),
    })
}

/// `AUTHORITY:CODE` when the CRS has one, WKT otherwise.
pub(crate) fn crs_string(dataset: &Dataset) -> Option<String> {
    let srs = dataset.spatial_ref().ok()?;
    match (srs.auth_name(), srs.auth_code()) {
        (Ok(name), Ok(code)) => Some(format!("{}:{}", name, code)),
        _ => srs.to_wkt().ok().filter(|wkt| !wkt.is_empty()),
    }
}

/// Dataset CRS, or WGS 84 when the dataset has none.
pub(crate) fn spatial_ref_or_wgs84(dataset: &Dataset) -> RasterResult<SpatialRef> {
    match dataset.spatial_ref() {
        Ok(srs) if srs.to_wkt().map(|w| !w.is_empty()).unwrap_or(false) => Ok(srs),
        _ => Ok(SpatialRef::from_epsg(4326)?),
    }
}
