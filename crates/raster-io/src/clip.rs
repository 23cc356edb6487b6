//! Clipping rasters to a boundary geometry.

use std::path::Path;

use gdal::raster::Buffer;
use gdal::DriverManager;
use geo_types::MultiPolygon;
use tracing::debug;

use geomanager_common::{BoundingBox, RasterDriver};

use crate::error::{RasterError, RasterResult};
use crate::info::{open_dataset, spatial_ref_or_wgs84};
use crate::mask::{rasterize_mask, PixelGrid};
use crate::nc::clip_netcdf;

/// Nodata written outside the geometry when the source declares none.
pub const DEFAULT_CLIP_NODATA: f64 = 0.0;

/// Clip `src` to `geometry`, writing a file of the same format to `out`.
pub fn clip_raster(
    src: &Path,
    driver: RasterDriver,
    geometry: &MultiPolygon<f64>,
    out: &Path,
) -> RasterResult<()> {
    match driver {
        RasterDriver::GTiff => clip_geotiff(src, geometry, out),
        RasterDriver::NetCdf => clip_netcdf(src, geometry, out),
    }
}

/// Clip a GeoTIFF.
///
/// The output covers the geometry's bounding box window. Pixels whose center
/// falls outside the geometry are set to the band's nodata value. The CRS is
/// kept (WGS 84 when the source has none) and values are written as f64.
pub fn clip_geotiff(src: &Path, geometry: &MultiPolygon<f64>, out: &Path) -> RasterResult<()> {
    let dataset = open_dataset(&src.to_string_lossy())?;
    let (width, height) = dataset.raster_size();
    let grid = PixelGrid::from_geotransform(&dataset.geo_transform()?, width, height)?;

    let bbox = BoundingBox::of_multipolygon(geometry).ok_or(RasterError::EmptyGeometry)?;
    let window = grid.window_for(&bbox).ok_or(RasterError::OutsideRaster)?;
    let window_grid = grid.window_grid(&window);
    let inside = rasterize_mask(geometry, &window_grid)?;

    let band_count = dataset.raster_count();
    if band_count == 0 {
        return Err(RasterError::NoBands(src.to_path_buf()));
    }

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut clipped =
        driver.create_with_band_type::<f64, _>(out, window.width, window.height, band_count)?;
    clipped.set_geo_transform(&window_grid.geotransform())?;
    clipped.set_spatial_ref(&spatial_ref_or_wgs84(&dataset)?)?;

    let size = (window.width, window.height);
    for index in 1..=band_count {
        let band = dataset.rasterband(index)?;
        let nodata = band
            .no_data_value()
            .filter(|v| !v.is_nan())
            .unwrap_or(DEFAULT_CLIP_NODATA);

        let buffer = band.read_as::<f64>(
            (window.col_off as isize, window.row_off as isize),
            size,
            size,
            None,
        )?;
        let data: Vec<f64> = buffer
            .data()
            .iter()
            .zip(&inside)
            .map(|(value, keep)| if *keep { *value } else { nodata })
            .collect();

        let mut out_band = clipped.rasterband(index)?;
        out_band.set_no_data_value(Some(nodata))?;
        out_band.write((0, 0), size, &mut Buffer::new(size, data))?;
    }

    debug!(
        src = %src.display(),
        out = %out.display(),
        width = window.width,
        height = window.height,
        "Clipped GeoTIFF"
    );

    Ok(())
}
