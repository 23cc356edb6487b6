//! Cloud Optimized GeoTIFF conversion.

use std::path::{Path, PathBuf};

use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, RasterCreationOptions};
use gdal::{Dataset, DriverManager, Metadata};
use tracing::debug;

use geomanager_common::{RasterDriver, RasterMetadata};

use crate::error::{RasterError, RasterResult};
use crate::info::{open_dataset, spatial_ref_or_wgs84};
use crate::nc::subdataset_path;

/// Nodata assigned to NetCDF bands that declare none (or declare NaN).
pub const NETCDF_DEFAULT_NODATA: f64 = -9999.0;

/// A raster ready to be converted, tagged by source format.
#[derive(Debug, Clone, PartialEq)]
pub enum RasterSource {
    GeoTiff {
        path: PathBuf,
        has_crs: bool,
    },
    NetCdf {
        path: PathBuf,
        data_variable: Option<String>,
        has_time_axis: bool,
    },
}

impl RasterSource {
    pub fn from_metadata(path: &Path, metadata: &RasterMetadata, data_variable: Option<&str>) -> Self {
        match metadata.driver {
            RasterDriver::GTiff => RasterSource::GeoTiff {
                path: path.to_path_buf(),
                has_crs: metadata.crs.is_some(),
            },
            RasterDriver::NetCdf => RasterSource::NetCdf {
                path: path.to_path_buf(),
                data_variable: data_variable.map(str::to_string),
                has_time_axis: !metadata.timestamps.is_empty(),
            },
        }
    }

    /// Write a DEFLATE-compressed COG to `out`.
    ///
    /// `band_index` is 0-based. For NetCDF it selects a position on the time
    /// axis and is ignored when the file has none.
    pub fn convert_to_cog(&self, out: &Path, band_index: Option<usize>) -> RasterResult<()> {
        let cog = DriverManager::get_driver_by_name("COG")?;
        let options = cog_options()?;

        match self {
            RasterSource::GeoTiff { path, has_crs } => {
                let dataset = open_dataset(&path.to_string_lossy())?;
                if band_index.is_none() && *has_crs {
                    dataset.create_copy(&cog, out, &options)?;
                } else {
                    let bands = select_bands(&dataset, band_index)?;
                    let staged = stage(&dataset, &bands, NodataPolicy::Keep)?;
                    staged.create_copy(&cog, out, &options)?;
                }
            }
            RasterSource::NetCdf {
                path,
                data_variable,
                has_time_axis,
            } => {
                let source = match data_variable {
                    Some(var) => subdataset_path(path, var),
                    None => path.to_string_lossy().into_owned(),
                };
                let dataset = open_dataset(&source)?;
                let index = if *has_time_axis { band_index } else { None };
                let bands = select_bands(&dataset, index)?;
                let staged = stage(&dataset, &bands, NodataPolicy::Finite)?;
                staged.create_copy(&cog, out, &options)?;
            }
        }

        debug!(source = ?self, out = %out.display(), band_index = ?band_index, "Wrote COG");
        Ok(())
    }
}

/// Convert the raster described by `metadata` to a COG.
pub fn to_cog(
    metadata: &RasterMetadata,
    src: &Path,
    out: &Path,
    band_index: Option<usize>,
    data_variable: Option<&str>,
) -> RasterResult<()> {
    RasterSource::from_metadata(src, metadata, data_variable).convert_to_cog(out, band_index)
}

fn cog_options() -> RasterResult<RasterCreationOptions> {
    let mut options = CslStringList::new();
    options.set_name_value("COMPRESS", "DEFLATE")?;
    Ok(options)
}

fn select_bands(dataset: &Dataset, band_index: Option<usize>) -> RasterResult<Vec<usize>> {
    let count = dataset.raster_count();
    match band_index {
        Some(index) if index < count => Ok(vec![index + 1]),
        Some(index) => Err(RasterError::BandOutOfRange { index, count }),
        None if count == 0 => Err(RasterError::NoBands(dataset.description()?.into())),
        None => Ok((1..=count).collect()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodataPolicy {
    /// Keep whatever the source band declares.
    Keep,
    /// Guarantee a finite nodata value and rewrite NaN pixels to it.
    Finite,
}

/// Copy selected bands into an in-memory f64 dataset with a CRS.
fn stage(source: &Dataset, bands: &[usize], policy: NodataPolicy) -> RasterResult<Dataset> {
    let (width, height) = source.raster_size();
    let size = (width, height);

    let mem = DriverManager::get_driver_by_name("MEM")?;
    let mut staged = mem.create_with_band_type::<f64, _>("", width, height, bands.len())?;
    if let Ok(geotransform) = source.geo_transform() {
        staged.set_geo_transform(&geotransform)?;
    }
    staged.set_spatial_ref(&spatial_ref_or_wgs84(source)?)?;

    for (position, index) in bands.iter().enumerate() {
        let band = source.rasterband(*index)?;
        let mut data = band.read_as::<f64>((0, 0), size, size, None)?.data().to_vec();

        let nodata = match policy {
            NodataPolicy::Keep => band.no_data_value(),
            NodataPolicy::Finite => {
                let nodata = band
                    .no_data_value()
                    .filter(|v| !v.is_nan())
                    .unwrap_or(NETCDF_DEFAULT_NODATA);
                for value in data.iter_mut().filter(|v| v.is_nan()) {
                    *value = nodata;
                }
                Some(nodata)
            }
        };

        let metadata = clean_band_metadata(band.metadata_domain("").unwrap_or_default());

        let mut out_band = staged.rasterband(position + 1)?;
        if let Some(nodata) = nodata {
            out_band.set_no_data_value(Some(nodata))?;
        }
        for (key, value) in metadata {
            out_band.set_metadata_item(&key, &value, "")?;
        }
        out_band.write((0, 0), size, &mut Buffer::new(size, data))?;
    }

    Ok(staged)
}

/// Band metadata worth carrying into a COG.
///
/// Drops NetCDF bookkeeping keys and collapses array values such as
/// `{mm,mm}` to their first element.
pub fn clean_band_metadata(entries: Vec<String>) -> Vec<(String, String)> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            if key == "grid_mapping" || key.starts_with("NETCDF_") || key == "_FillValue" {
                return None;
            }
            let value = match value.strip_prefix('{').and_then(|v| v.strip_suffix('}')) {
                Some(inner) => inner.split(',').next().unwrap_or_default().trim(),
                None => value,
            };
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
