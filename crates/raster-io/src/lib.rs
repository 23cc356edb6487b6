//! Raster I/O for GeoTIFF and NetCDF files.
//!
//! Provides inspection ([`read_info`]), boundary clipping ([`clip_raster`]),
//! Cloud Optimized GeoTIFF conversion ([`RasterSource`]) and value queries.
//! GDAL handles georeferencing and GeoTIFF/COG I/O; the netcdf library reads
//! NetCDF variables, dimensions and time axes directly.

pub mod clip;
pub mod cog;
pub mod error;
pub mod info;
pub mod mask;
pub mod nc;
pub mod query;
pub mod toolkit;

pub use clip::{clip_geotiff, clip_raster};
pub use cog::{clean_band_metadata, to_cog, RasterSource, NETCDF_DEFAULT_NODATA};
pub use error::{RasterError, RasterResult};
pub use info::read_info;
pub use mask::{rasterize_mask, PixelGrid, Window};
pub use nc::{clip_netcdf, decode_cf_times, inspect_netcdf, silence_hdf5_errors, NetCdfSummary, DEFAULT_TIME_DIMENSIONS};
pub use query::{pixel_value, valid_values, BandStatistics, Statistic};
pub use toolkit::{GdalToolkit, RasterClip, RasterToolkit};
