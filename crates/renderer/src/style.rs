//! Style engine: maps pixel values to colors.
//!
//! Stepped styles spread their palette evenly over `[min, max]`. Custom
//! styles partition the range at their breakpoint thresholds, scaled into a
//! 256-level index space the tile renderer uses as a lookup table:
//!
//! ```text
//! index(v) = scale * clamp(v + offset, 0, clip)
//! scale = 254 / (max - min)   offset = -min   clip = max + offset
//! ```

use geomanager_common::{parse_hex_color, ColorValue, RasterStyle};
use serde_json::{json, Value};

use crate::error::Result;

/// Number of entries in a custom palette lookup table.
pub const CUSTOM_PALETTE_SIZE: usize = 256;

/// Amount added to `max` when it equals `min`.
const DEGENERATE_RANGE_NUDGE: f64 = 0.1;

/// Color computations for one style.
#[derive(Debug, Clone)]
pub struct StyleEngine<'a> {
    style: &'a RasterStyle,
    breakpoints: Vec<ColorValue>,
    /// Parsed stepped palette, empty for custom styles.
    stepped_rgb: Vec<(u8, u8, u8)>,
}

impl<'a> StyleEngine<'a> {
    pub fn new(style: &'a RasterStyle) -> Self {
        let mut engine = Self {
            style,
            breakpoints: style.sorted_color_values(),
            stepped_rgb: Vec::new(),
        };
        if !style.use_custom_colors {
            engine.stepped_rgb = engine
                .palette()
                .iter()
                .filter_map(|c| parse_hex_color(c).ok())
                .collect();
        }
        engine
    }

    /// Validate the style before building an engine for it.
    pub fn validated(style: &'a RasterStyle) -> Result<Self> {
        style.validate()?;
        Ok(Self::new(style))
    }

    pub fn style(&self) -> &RasterStyle {
        self.style
    }

    /// Breakpoints in ascending threshold order.
    pub fn breakpoints(&self) -> &[ColorValue] {
        &self.breakpoints
    }

    pub fn min_value(&self) -> f64 {
        self.style.min as f64
    }

    /// `max`, nudged when the range is empty.
    pub fn max_value(&self) -> f64 {
        let max = self.style.max as f64;
        if self.style.min == self.style.max {
            max + DEGENERATE_RANGE_NUDGE
        } else {
            max
        }
    }

    pub fn scale(&self) -> f64 {
        254.0 / (self.max_value() - self.min_value())
    }

    pub fn offset(&self) -> f64 {
        -self.min_value()
    }

    pub fn clip(&self) -> f64 {
        self.max_value() + self.offset()
    }

    /// Position of a value in index space.
    pub fn scaled(&self, value: f64) -> f64 {
        self.scale() * (value + self.offset()).clamp(0.0, self.clip())
    }

    /// Renderer palette.
    ///
    /// Stepped styles yield `steps` colors, custom styles a 256-entry lookup
    /// table indexed by scaled value.
    pub fn palette(&self) -> Vec<String> {
        if self.style.use_custom_colors {
            (0..CUSTOM_PALETTE_SIZE)
                .map(|i| self.color_for_index(i as f64).to_string())
                .collect()
        } else {
            let colors = self.style.palette_colors();
            match self.style.steps {
                Some(steps) if steps as usize != colors.len() => resample(&colors, steps as usize),
                _ => colors,
            }
        }
    }

    /// Color of a custom-palette index.
    ///
    /// The first breakpoint owns `[0, scaled(t0)]`, each later one
    /// `(scaled(t_prev), scaled(t)]`. Anything else gets the rest color.
    pub fn color_for_index(&self, index: f64) -> &str {
        let mut previous: Option<f64> = None;
        for value in &self.breakpoints {
            let upper = self.scaled(value.threshold);
            let matched = match previous {
                None => index <= upper,
                Some(prev) => self.scaled(prev) < index && index <= upper,
            };
            if matched {
                return &value.color;
            }
            previous = Some(value.threshold);
        }
        &self.style.custom_color_for_rest
    }

    /// Color a data value renders with.
    pub fn color_for_value(&self, value: f64) -> Option<(u8, u8, u8)> {
        if !value.is_finite() {
            return None;
        }

        if self.style.use_custom_colors {
            return parse_hex_color(self.custom_color_for_value(value)).ok();
        }

        if self.stepped_rgb.is_empty() {
            return None;
        }
        let span = self.max_value() - self.min_value();
        let t = ((value - self.min_value()) / span).clamp(0.0, 1.0);
        let bucket = ((t * self.stepped_rgb.len() as f64) as usize).min(self.stepped_rgb.len() - 1);
        Some(self.stepped_rgb[bucket])
    }

    fn custom_color_for_value(&self, value: f64) -> &str {
        if value > self.max_value() {
            return &self.style.custom_color_for_rest;
        }
        self.color_for_index(self.scaled(value))
    }

    /// Band configuration handed to the tile renderer.
    pub fn style_json(&self) -> Value {
        json!({
            "bands": [
                {
                    "band": 1,
                    "min": self.style.min,
                    "max": self.style.max,
                    "palette": self.palette(),
                    "scheme": "discrete",
                }
            ]
        })
    }

    /// Contour shading parameters for the Magics engine.
    ///
    /// Only custom styles carry levels; stepped styles return `None`.
    pub fn magics_contour_params(&self) -> Option<Value> {
        if !self.style.use_custom_colors {
            return None;
        }

        let levels: Vec<f64> = self.breakpoints.iter().map(|v| v.threshold).collect();
        let mut colours: Vec<String> = self.breakpoints.iter().map(|v| v.color.clone()).collect();
        colours.push(self.style.custom_color_for_rest.clone());

        Some(json!({
            "contour": "off",
            "contour_shade": "on",
            "contour_shade_method": "area_fill",
            "contour_label": "off",
            "contour_level_selection_type": "level_list",
            "contour_level_list": levels,
            "contour_shade_min_level": self.style.min,
            "contour_shade_max_level": self.style.max,
            "contour_min_level": self.style.min,
            "contour_max_level": self.style.max,
            "contour_shade_colour_method": "list",
            "contour_shade_colour_list": colours,
        }))
    }
}

/// Resample a color ramp to `steps` entries by linear RGB interpolation.
///
/// Unparseable colors are skipped.
pub fn resample(colors: &[String], steps: usize) -> Vec<String> {
    let rgb: Vec<(u8, u8, u8)> = colors.iter().filter_map(|c| parse_hex_color(c).ok()).collect();
    if rgb.is_empty() || steps == 0 {
        return Vec::new();
    }
    if rgb.len() == 1 || steps == 1 {
        return vec![to_hex(rgb[0]); steps];
    }

    (0..steps)
        .map(|k| {
            let position = k as f64 / (steps - 1) as f64 * (rgb.len() - 1) as f64;
            let low = position.floor() as usize;
            let high = (low + 1).min(rgb.len() - 1);
            let t = position - low as f64;
            to_hex(lerp(rgb[low], rgb[high], t))
        })
        .collect()
}

fn lerp(a: (u8, u8, u8), b: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    let channel = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    (channel(a.0, b.0), channel(a.1, b.1), channel(a.2, b.2))
}

fn to_hex((r, g, b): (u8, u8, u8)) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}
