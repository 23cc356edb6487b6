//! Tests for the style engine.
//!
//! Tests palette computation, custom breakpoint lookups, style JSON and
//! colorized rendering.

use geomanager_common::{ColorValue, RasterStyle};
use renderer::{colorize, render_png, StyleEngine, CUSTOM_PALETTE_SIZE};

fn rainfall_style() -> RasterStyle {
    RasterStyle::stepped(
        1,
        "rainfall",
        0,
        100,
        &["#ffffff", "#c6dbef", "#6baed6", "#2171b5", "#08306b"],
    )
}

fn threshold_style() -> RasterStyle {
    RasterStyle::custom(
        2,
        "thresholds",
        0,
        100,
        vec![
            ColorValue::new(50.0, "#00ff00"),
            ColorValue::new(10.0, "#0000ff"),
        ],
        "#ff0000",
    )
}

// ============================================================================
// Stepped palette tests
// ============================================================================

#[test]
fn test_stepped_palette_matches_steps() {
    let style = rainfall_style();
    let palette = StyleEngine::new(&style).palette();
    assert_eq!(palette.len(), 5);
    assert_eq!(palette[0], "#ffffff");
    assert_eq!(palette[4], "#08306b");
}

#[test]
fn test_stepped_palette_resampled_to_steps() {
    let mut style = RasterStyle::stepped(1, "ramp", 0, 10, &["#000000", "#ffffff"]);
    style.steps = Some(5);
    let palette = StyleEngine::new(&style).palette();
    assert_eq!(
        palette,
        vec!["#000000", "#404040", "#808080", "#bfbfbf", "#ffffff"]
    );
}

#[test]
fn test_stepped_color_for_value_buckets() {
    let style = rainfall_style();
    let engine = StyleEngine::new(&style);
    assert_eq!(engine.color_for_value(0.0), Some((0xff, 0xff, 0xff)));
    assert_eq!(engine.color_for_value(-50.0), Some((0xff, 0xff, 0xff)));
    assert_eq!(engine.color_for_value(45.0), Some((0x6b, 0xae, 0xd6)));
    assert_eq!(engine.color_for_value(100.0), Some((0x08, 0x30, 0x6b)));
    assert_eq!(engine.color_for_value(f64::NAN), None);
}

// ============================================================================
// Custom breakpoint tests
// ============================================================================

#[test]
fn test_custom_palette_has_256_entries() {
    let style = threshold_style();
    let palette = StyleEngine::new(&style).palette();
    assert_eq!(palette.len(), CUSTOM_PALETTE_SIZE);
}

#[test]
fn test_custom_palette_partitions_index_space() {
    let style = threshold_style();
    let engine = StyleEngine::new(&style);

    // scale = 2.54: threshold 10 -> 25.4, threshold 50 -> 127
    assert_eq!(engine.color_for_index(0.0), "#0000ff");
    assert_eq!(engine.color_for_index(25.0), "#0000ff");
    assert_eq!(engine.color_for_index(26.0), "#00ff00");
    assert_eq!(engine.color_for_index(127.0), "#00ff00");
    assert_eq!(engine.color_for_index(128.0), "#ff0000");
    assert_eq!(engine.color_for_index(255.0), "#ff0000");

    let palette = engine.palette();
    assert_eq!(palette.iter().filter(|c| *c == "#0000ff").count(), 26);
    assert_eq!(palette.iter().filter(|c| *c == "#00ff00").count(), 102);
    assert_eq!(palette.iter().filter(|c| *c == "#ff0000").count(), 128);
}

#[test]
fn test_custom_color_for_value() {
    let style = threshold_style();
    let engine = StyleEngine::new(&style);
    assert_eq!(engine.color_for_value(-5.0), Some((0, 0, 255)));
    assert_eq!(engine.color_for_value(10.0), Some((0, 0, 255)));
    assert_eq!(engine.color_for_value(10.5), Some((0, 255, 0)));
    assert_eq!(engine.color_for_value(75.0), Some((255, 0, 0)));
    assert_eq!(engine.color_for_value(150.0), Some((255, 0, 0)));
}

#[test]
fn test_custom_style_without_breakpoints_is_all_rest() {
    let style = RasterStyle::custom(3, "empty", 0, 10, vec![], "#123456");
    let palette = StyleEngine::new(&style).palette();
    assert!(palette.iter().all(|c| c == "#123456"));
}

#[test]
fn test_equal_min_max_does_not_divide_by_zero() {
    let style = RasterStyle::custom(
        4,
        "flat",
        5,
        5,
        vec![ColorValue::new(5.0, "#00ff00")],
        "#ff0000",
    );
    let engine = StyleEngine::new(&style);
    assert!(engine.scale().is_finite());
    assert_eq!(engine.color_for_value(5.0), Some((0, 255, 0)));
    assert_eq!(engine.palette().len(), CUSTOM_PALETTE_SIZE);
}

#[test]
fn test_validated_rejects_reversed_range() {
    let mut style = rainfall_style();
    style.min = 200;
    assert!(StyleEngine::validated(&style).is_err());
}

// ============================================================================
// Style JSON tests
// ============================================================================

#[test]
fn test_style_json_shape() {
    let style = rainfall_style();
    let json = StyleEngine::new(&style).style_json();
    let band = &json["bands"][0];
    assert_eq!(band["band"], 1);
    assert_eq!(band["min"], 0);
    assert_eq!(band["max"], 100);
    assert_eq!(band["scheme"], "discrete");
    assert_eq!(band["palette"].as_array().unwrap().len(), 5);
}

#[test]
fn test_magics_contour_params() {
    let style = threshold_style();
    let params = StyleEngine::new(&style).magics_contour_params().unwrap();
    assert_eq!(params["contour_level_list"], serde_json::json!([10.0, 50.0]));
    assert_eq!(
        params["contour_shade_colour_list"],
        serde_json::json!(["#0000ff", "#00ff00", "#ff0000"])
    );
    assert_eq!(params["contour_shade_max_level"], 100);

    assert!(StyleEngine::new(&rainfall_style()).magics_contour_params().is_none());
}

// ============================================================================
// Rendering tests
// ============================================================================

#[test]
fn test_colorize_transparent_nodata() {
    let style = threshold_style();
    let engine = StyleEngine::new(&style);
    let pixels = colorize(&[5.0, -9999.0, f64::NAN, 60.0], 2, 2, &engine, Some(-9999.0)).unwrap();

    assert_eq!(&pixels[0..4], &[0, 0, 255, 255]);
    assert_eq!(&pixels[4..8], &[0, 0, 0, 0]);
    assert_eq!(&pixels[8..12], &[0, 0, 0, 0]);
    assert_eq!(&pixels[12..16], &[255, 0, 0, 255]);
}

#[test]
fn test_colorize_rejects_wrong_buffer_size() {
    let style = rainfall_style();
    let engine = StyleEngine::new(&style);
    assert!(colorize(&[1.0, 2.0, 3.0], 2, 2, &engine, None).is_err());
}

#[test]
fn test_render_png_signature() {
    let style = rainfall_style();
    let engine = StyleEngine::new(&style);
    let values = test_utils::create_rainfall_grid(16, 8, 42);
    let png = render_png(&values, 16, 8, &engine, None).unwrap();
    assert_eq!(&png[0..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
}
