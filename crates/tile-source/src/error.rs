//! Tile source error types.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TileError {
    #[error("{0} param required")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{param}': {message}")]
    InvalidParameter { param: &'static str, message: String },

    #[error("Layer not found: {0}")]
    LayerNotFound(Uuid),

    #[error("File not found matching 'layer': {layer_id} and 'time': {time}")]
    RasterFileNotFound { layer_id: Uuid, time: String },

    #[error("File not found matching 'id': {0}")]
    RasterFileIdNotFound(Uuid),

    #[error("Geostore with id {0} does not exist")]
    GeostoreNotFound(Uuid),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Raster error: {0}")]
    Raster(#[from] raster_io::RasterError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl TileError {
    /// Whether the error names a missing resource rather than a bad request.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TileError::LayerNotFound(_)
                | TileError::RasterFileNotFound { .. }
                | TileError::RasterFileIdNotFound(_)
                | TileError::GeostoreNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TileError>;
