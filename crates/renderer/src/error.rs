//! Renderer error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid style: {0}")]
    Style(#[from] geomanager_common::GeoError),

    #[error("Buffer holds {actual} values, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, RenderError>;
