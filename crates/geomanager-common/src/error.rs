//! Error types shared by the GeoManager crates.

use thiserror::Error;

/// Result type alias using GeoError.
pub type GeoResult<T> = Result<T, GeoError>;

/// Errors raised while building or validating shared domain types.
#[derive(Debug, Error)]
pub enum GeoError {
    // === Parsing Errors ===
    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Invalid bounds: {0}")]
    InvalidBbox(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid color '{0}'. Expected '#rrggbb'")]
    InvalidColor(String),

    // === Style Errors ===
    #[error("Invalid style '{name}': {message}")]
    InvalidStyle { name: String, message: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
