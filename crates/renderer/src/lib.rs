//! Style engine for raster layers.
//!
//! Turns a [`RasterStyle`](geomanager_common::RasterStyle) into:
//! - a renderer palette (stepped ramp or 256-entry custom lookup table)
//! - a legend with human-readable bucket labels
//! - colorized RGBA buffers and PNG thumbnails

pub mod colorize;
pub mod error;
pub mod format;
pub mod legend;
pub mod style;

pub use colorize::{colorize, render_png};
pub use error::{RenderError, Result};
pub use legend::{Legend, LegendItem};
pub use style::{resample, StyleEngine, CUSTOM_PALETTE_SIZE};
