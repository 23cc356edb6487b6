//! Storage abstractions for the raster pipeline.
//!
//! Provides:
//! - A raster catalog trait with PostgreSQL and in-memory implementations
//! - Managed media storage for uploads and published COGs
//! - An on-disk cache of rasters clipped to geostores
//! - Country boundary settings and polygon lookup

pub mod boundary;
pub mod catalog;
pub mod clip_cache;
pub mod error;
pub mod media;
pub mod memory;
pub mod postgres;

pub use boundary::{
    BoundarySettings, BoundarySettingsProvider, CountryBoundaryRepository, CountrySetting,
    InMemoryCountryBoundaries, StaticBoundarySettings,
};
pub use catalog::{RasterCatalog, Replacement, TimeRange};
pub use clip_cache::{CacheStats as ClipCacheStats, GeostoreClipCache};
pub use error::{Result, StorageError};
pub use media::MediaStore;
pub use memory::MemoryCatalog;
pub use postgres::PgCatalog;
