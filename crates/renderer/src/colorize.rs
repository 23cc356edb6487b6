//! Colorized rendering of a single raster band.

use std::io::Cursor;

use image::{ImageOutputFormat, RgbaImage};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{RenderError, Result};
use crate::style::StyleEngine;

/// Map band values to RGBA pixels.
///
/// NaN and `nodata` pixels are fully transparent.
pub fn colorize(
    values: &[f64],
    width: usize,
    height: usize,
    engine: &StyleEngine<'_>,
    nodata: Option<f64>,
) -> Result<Vec<u8>> {
    let expected = width * height;
    if values.len() != expected {
        return Err(RenderError::BufferSize {
            expected,
            actual: values.len(),
        });
    }

    let mut pixels = vec![0u8; expected * 4];
    if width == 0 {
        return Ok(pixels);
    }

    pixels
        .par_chunks_mut(width * 4)
        .zip(values.par_chunks(width))
        .for_each(|(row, row_values)| {
            for (pixel, value) in row.chunks_exact_mut(4).zip(row_values) {
                if nodata.map_or(false, |nd| *value == nd) {
                    continue;
                }
                if let Some((r, g, b)) = engine.color_for_value(*value) {
                    pixel.copy_from_slice(&[r, g, b, 255]);
                }
            }
        });

    Ok(pixels)
}

/// Render a band as a PNG thumbnail.
pub fn render_png(
    values: &[f64],
    width: usize,
    height: usize,
    engine: &StyleEngine<'_>,
    nodata: Option<f64>,
) -> Result<Vec<u8>> {
    let pixels = colorize(values, width, height, engine, nodata)?;
    let image = RgbaImage::from_raw(width as u32, height as u32, pixels).ok_or(
        RenderError::BufferSize {
            expected: width * height * 4,
            actual: 0,
        },
    )?;

    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;

    debug!(width, height, bytes = bytes.len(), style = %engine.style().name, "Rendered PNG");
    Ok(bytes)
}
