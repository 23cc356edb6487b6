//! Raster style definitions.
//!
//! A style either spreads a comma-separated palette evenly across
//! `[min, max]` or, with `use_custom_colors`, assigns colors to explicit
//! thresholds plus a catch-all color for everything above them. The color
//! math lives in the `renderer` crate; this module only holds the data and
//! its validation rules.

use serde::{Deserialize, Serialize};

use crate::{GeoError, GeoResult};

/// Minimum and maximum number of palette steps.
pub const MIN_STEPS: u32 = 3;
pub const MAX_STEPS: u32 = 20;

/// Default catch-all color.
pub const DEFAULT_REST_COLOR: &str = "#ff0000";

/// Legend layout requested by the style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegendType {
    Basic,
    Choropleth,
    #[default]
    ChoroplethVertical,
    Gradient,
    GradientVertical,
}

/// Engine that renders tiles for the style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderingEngine {
    #[default]
    LargeImage,
    Magics,
}

/// One threshold/color breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorValue {
    /// Values less than or equal to this get `color`.
    pub threshold: f64,
    pub color: String,
    #[serde(default = "default_true")]
    pub show_on_legend: bool,
    #[serde(default)]
    pub label: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ColorValue {
    pub fn new(threshold: f64, color: impl Into<String>) -> Self {
        Self {
            threshold,
            color: color.into(),
            show_on_legend: true,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A raster color style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterStyle {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub min: i64,
    pub max: i64,
    #[serde(default)]
    pub steps: Option<u32>,
    #[serde(default)]
    pub use_custom_colors: bool,
    /// Comma separated colors.
    #[serde(default)]
    pub palette: Option<String>,
    #[serde(default)]
    pub interpolate: bool,
    #[serde(default)]
    pub legend_type: LegendType,
    #[serde(default = "default_rest_color")]
    pub custom_color_for_rest: String,
    #[serde(default)]
    pub rendering_engine: RenderingEngine,
    #[serde(default)]
    pub color_values: Vec<ColorValue>,
}

fn default_rest_color() -> String {
    DEFAULT_REST_COLOR.to_string()
}

impl RasterStyle {
    /// Stepped palette style.
    pub fn stepped(id: i64, name: impl Into<String>, min: i64, max: i64, palette: &[&str]) -> Self {
        Self {
            id,
            name: name.into(),
            unit: None,
            min,
            max,
            steps: Some(palette.len() as u32),
            use_custom_colors: false,
            palette: Some(palette.join(",")),
            interpolate: false,
            legend_type: LegendType::default(),
            custom_color_for_rest: default_rest_color(),
            rendering_engine: RenderingEngine::default(),
            color_values: Vec::new(),
        }
    }

    /// Custom breakpoint style.
    pub fn custom(
        id: i64,
        name: impl Into<String>,
        min: i64,
        max: i64,
        color_values: Vec<ColorValue>,
        rest_color: impl Into<String>,
    ) -> Self {
        Self {
            use_custom_colors: true,
            palette: None,
            steps: None,
            custom_color_for_rest: rest_color.into(),
            color_values,
            ..Self::stepped(id, name, min, max, &[])
        }
    }

    /// Palette colors as written, trimmed and without empty entries.
    pub fn palette_colors(&self) -> Vec<String> {
        self.palette
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Breakpoints in ascending threshold order.
    pub fn sorted_color_values(&self) -> Vec<ColorValue> {
        let mut values = self.color_values.clone();
        values.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
        values
    }

    /// Check the invariants the color math relies on.
    pub fn validate(&self) -> GeoResult<()> {
        let invalid = |message: String| GeoError::InvalidStyle {
            name: self.name.clone(),
            message,
        };

        if self.min > self.max {
            return Err(invalid(format!(
                "minimum value {} is greater than maximum value {}",
                self.min, self.max
            )));
        }

        if let Some(steps) = self.steps {
            if !(MIN_STEPS..=MAX_STEPS).contains(&steps) {
                return Err(invalid(format!(
                    "steps must be between {} and {}, got {}",
                    MIN_STEPS, MAX_STEPS, steps
                )));
            }
        }

        parse_hex_color(&self.custom_color_for_rest)?;

        if self.use_custom_colors {
            for value in &self.color_values {
                if !value.threshold.is_finite() {
                    return Err(invalid("thresholds must be finite numbers".to_string()));
                }
                parse_hex_color(&value.color)?;
            }
        } else {
            let colors = self.palette_colors();
            if colors.len() < 2 {
                return Err(invalid("palette needs at least two colors".to_string()));
            }
            for color in &colors {
                parse_hex_color(color)?;
            }
        }

        Ok(())
    }
}

/// Parse `#rrggbb` (or `rrggbb`) into RGB.
pub fn parse_hex_color(hex: &str) -> GeoResult<(u8, u8, u8)> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(GeoError::InvalidColor(hex.to_string()));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| GeoError::InvalidColor(hex.to_string()))
    };

    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}
