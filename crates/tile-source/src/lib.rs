//! Serve-time raster access.
//!
//! Resolves tile, thumbnail and data query parameters into a published
//! raster file, a local path (clipped to a geostore through the clip
//! cache when requested) and a style document for the renderer.

pub mod data;
pub mod error;
pub mod params;
pub mod resolver;

pub use data::{tile_metadata, DatedValue, GeostoreData, RasterQuery, TileMetadata};
pub use error::{Result, TileError};
pub use params::{ImageEncoding, StyleParam, TileOptions, TileQueryParams, LAYER_STYLE};
pub use resolver::{ResolvedTile, TileSource};
