//! Legend generation.

use geomanager_common::LegendType;
use serde::{Deserialize, Serialize};

use crate::format::{format_value, round_to_precision, significant_digits};
use crate::style::StyleEngine;

/// One legend swatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendItem {
    pub color: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<f64>,
}

impl LegendItem {
    fn swatch(color: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            name: name.into(),
            from: None,
            to: None,
        }
    }
}

/// Legend configuration consumed by the map viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    #[serde(rename = "type")]
    pub legend_type: LegendType,
    pub items: Vec<LegendItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl<'a> StyleEngine<'a> {
    /// Legend for the style.
    pub fn legend(&self) -> Legend {
        let style = self.style();
        let mut legend_type = style.legend_type;

        let items = if style.use_custom_colors {
            let mut items: Vec<LegendItem> = self
                .breakpoints()
                .iter()
                .map(|value| {
                    let name = if !value.show_on_legend {
                        String::new()
                    } else {
                        match value.label.as_deref() {
                            Some(label) if !label.is_empty() => label.to_string(),
                            _ => value.threshold.to_string(),
                        }
                    };
                    LegendItem::swatch(value.color.clone(), name)
                })
                .collect();

            if items.len() == 1 && items[0].color == style.custom_color_for_rest {
                legend_type = LegendType::Basic;
            } else if !items.is_empty() {
                items.push(LegendItem::swatch(style.custom_color_for_rest.clone(), ""));
            }
            items
        } else {
            self.palette_legend_items()
        };

        Legend {
            legend_type,
            items,
            units: style.unit.clone().filter(|u| !u.is_empty()),
        }
    }

    /// Bucket items for a stepped palette.
    ///
    /// With a positive `min` the first color covers `< min`. Each following
    /// color covers one `from - to` step and the last open bucket reads
    /// `> from`.
    pub fn palette_legend_items(&self) -> Vec<LegendItem> {
        let style = self.style();
        let colors = self.palette();
        if colors.is_empty() {
            return Vec::new();
        }

        let min = style.min as f64;
        let max = style.max as f64;
        let positive_min = style.min > 0;

        let divisions = colors.len() as i64 - if positive_min { 2 } else { 1 };
        let step = (max - min) / divisions.max(1) as f64;
        let precision = significant_digits(step, max);
        let round = |v: f64| round_to_precision(v, precision);

        let mut val_from = min;
        let mut val_to = round(min + step);
        let mut items = Vec::with_capacity(colors.len());

        for (i, color) in colors.into_iter().enumerate() {
            let item = if i == 0 && positive_min {
                val_to = min;
                LegendItem {
                    color,
                    name: format!("< {}", style.min),
                    from: Some(0.0),
                    to: Some(min),
                }
            } else if val_from < max {
                LegendItem {
                    color,
                    name: format!(
                        "{} - {}",
                        format_value(val_from, precision),
                        format_value(val_to, precision)
                    ),
                    from: Some(round_to_precision(val_from, 1)),
                    to: Some(round_to_precision(val_to, 1)),
                }
            } else {
                LegendItem {
                    color,
                    name: format!("> {}", format_value(val_from, precision)),
                    from: Some(val_from),
                    to: None,
                }
            };
            items.push(item);

            val_from = val_to;
            let next = i as f64 + if positive_min { 1.0 } else { 2.0 };
            val_to = round(min + step * next);
        }

        items
    }
}
