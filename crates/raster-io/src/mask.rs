//! Pixel grids and polygon rasterization.
//!
//! Clipping keeps a pixel when its center falls inside the clip geometry.

use gdal::raster::{rasterize, RasterizeOptions};
use gdal::vector::ToGdal;
use gdal::DriverManager;
use geo_types::MultiPolygon;

use geomanager_common::BoundingBox;

use crate::error::{RasterError, RasterResult};

/// Axis-aligned pixel grid described by a GDAL geotransform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelGrid {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up rasters.
    pub pixel_height: f64,
    pub width: usize,
    pub height: usize,
}

/// A rectangular block of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelGrid {
    /// Build a grid from `[x0, dx, rx, y0, ry, dy]`.
    pub fn from_geotransform(gt: &[f64; 6], width: usize, height: usize) -> RasterResult<Self> {
        if gt[2] != 0.0 || gt[4] != 0.0 {
            return Err(RasterError::RotatedRaster);
        }
        Ok(Self {
            origin_x: gt[0],
            origin_y: gt[3],
            pixel_width: gt[1],
            pixel_height: gt[5],
            width,
            height,
        })
    }

    pub fn geotransform(&self) -> [f64; 6] {
        [self.origin_x, self.pixel_width, 0.0, self.origin_y, 0.0, self.pixel_height]
    }

    /// Geographic extent covered by the grid.
    pub fn bounds(&self) -> BoundingBox {
        let x2 = self.origin_x + self.pixel_width * self.width as f64;
        let y2 = self.origin_y + self.pixel_height * self.height as f64;
        BoundingBox::from_corners(self.origin_x, self.origin_y, x2, y2)
    }

    /// World coordinates of a pixel center.
    pub fn center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Pixel containing a world coordinate, if it is on the grid.
    pub fn pixel_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = ((x - self.origin_x) / self.pixel_width).floor();
        let row = ((y - self.origin_y) / self.pixel_height).floor();
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some((col as usize, row as usize))
    }

    /// Smallest window covering `bbox`, clamped to the grid.
    pub fn window_for(&self, bbox: &BoundingBox) -> Option<Window> {
        let (col_start, col_end) = span(
            (bbox.min_x - self.origin_x) / self.pixel_width,
            (bbox.max_x - self.origin_x) / self.pixel_width,
            self.width,
        )?;
        let (row_start, row_end) = span(
            (bbox.max_y - self.origin_y) / self.pixel_height,
            (bbox.min_y - self.origin_y) / self.pixel_height,
            self.height,
        )?;
        Some(Window {
            col_off: col_start,
            row_off: row_start,
            width: col_end - col_start,
            height: row_end - row_start,
        })
    }

    /// Sub-grid for a window.
    pub fn window_grid(&self, window: &Window) -> PixelGrid {
        PixelGrid {
            origin_x: self.origin_x + window.col_off as f64 * self.pixel_width,
            origin_y: self.origin_y + window.row_off as f64 * self.pixel_height,
            width: window.width,
            height: window.height,
            ..*self
        }
    }
}

fn span(a: f64, b: f64, limit: usize) -> Option<(usize, usize)> {
    let start = a.min(b).floor().max(0.0);
    let end = a.max(b).ceil().min(limit as f64);
    if !(start < end) {
        return None;
    }
    Some((start as usize, end as usize))
}

/// Burn `geometry` onto `grid`: `true` where a pixel center is inside.
///
/// Uses GDAL's rasterizer on an in-memory band, so holes stay empty and
/// only pixels whose center falls inside a polygon are set.
pub fn rasterize_mask(geometry: &MultiPolygon<f64>, grid: &PixelGrid) -> RasterResult<Vec<bool>> {
    if grid.width == 0 || grid.height == 0 {
        return Ok(Vec::new());
    }

    let driver = DriverManager::get_driver_by_name("MEM")?;
    let mut mask = driver.create_with_band_type::<u8, _>("", grid.width, grid.height, 1)?;
    mask.set_geo_transform(&grid.geotransform())?;

    let shapes = [geometry.to_gdal()?];
    rasterize(&mut mask, &[1], &shapes, &[1.0], Some(RasterizeOptions::default()))?;

    let size = (grid.width, grid.height);
    let burned = mask.rasterband(1)?.read_as::<u8>((0, 0), size, size, None)?;
    Ok(burned.data().iter().map(|v| *v != 0).collect())
}
