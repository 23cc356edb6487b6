//! Common types and utilities shared across the GeoManager raster pipeline.

pub mod bbox;
pub mod error;
pub mod geostore;
pub mod layer;
pub mod raster;
pub mod style;
pub mod time;

pub use bbox::{BoundaryRelation, BoundingBox};
pub use error::{GeoError, GeoResult};
pub use geostore::{multipolygon_from_geojson, Geostore};
pub use layer::{
    published_file_name, DateFormat, LayerRasterFile, NewLayerRasterFile, RasterFileLayer,
    RasterUpload, LAYER_RASTER_FILE_TYPE, RASTER_FILE_LAYER_TYPE,
};
pub use raster::{RasterDriver, RasterMetadata};
pub use style::{parse_hex_color, ColorValue, LegendType, RasterStyle, RenderingEngine};
pub use time::{
    extract_iso_date_from_filename, isoformat, naive_isoformat, parse_iso_datetime,
    tile_timestamp,
};
