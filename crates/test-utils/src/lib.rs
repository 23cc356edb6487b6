//! Shared test utilities for the geomanager workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Grid data generators
//! - GeoTIFF and NetCDF fixture writers
//! - Common test fixtures (boundaries, layers, styles)
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, write_geotiff, GeoTiffSpec};
//! ```

pub mod fixtures;
pub mod generators;
pub mod rasters;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use rasters::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for approximate equality of bounding boxes.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_bbox_approx_eq;
///
/// assert_bbox_approx_eq!(metadata.bounds, BoundingBox::new(0.0, 0.0, 10.0, 10.0), 1e-9);
/// ```
#[macro_export]
macro_rules! assert_bbox_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left = $left;
        let right = $right;
        $crate::assert_approx_eq!(left.min_x, right.min_x, $epsilon);
        $crate::assert_approx_eq!(left.min_y, right.min_y, $epsilon);
        $crate::assert_approx_eq!(left.max_x, right.max_x, $epsilon);
        $crate::assert_approx_eq!(left.max_y, right.max_y, $epsilon);
    }};
}
