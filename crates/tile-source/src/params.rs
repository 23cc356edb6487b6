//! Query parameters for tile, thumbnail and data requests.
//!
//! Parameters arrive as strings. An empty value counts as absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use geomanager_common::parse_iso_datetime;
use raster_io::Statistic;
use storage::TimeRange;

use crate::error::{Result, TileError};

pub const DEFAULT_PROJECTION: &str = "EPSG:3857";
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 256;

/// Requests the layer's own style, same as leaving `style` empty.
pub const LAYER_STYLE: &str = "layer-style";

/// Raw key-value query parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileQueryParams {
    pub time: Option<String>,
    pub time_from: Option<String>,
    pub time_to: Option<String>,
    pub geostore_id: Option<String>,
    pub style: Option<String>,
    pub format: Option<String>,
    pub projection: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub value_type: Option<String>,
}

/// Style selection of a tile request.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleParam {
    /// The layer's configured style, if it has one.
    Layer,
    /// A style document given inline.
    Inline(Value),
    /// Render without a style.
    Unstyled,
}

impl StyleParam {
    /// Parse the `style` parameter. Invalid JSON is ignored with a warning.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some(LAYER_STYLE) => StyleParam::Layer,
            Some(text) => match serde_json::from_str::<Value>(text) {
                Ok(value) => StyleParam::Inline(value),
                Err(e) => {
                    warn!(error = %e, "Ignoring invalid style parameter");
                    StyleParam::Unstyled
                }
            },
        }
    }
}

/// Output image encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageEncoding {
    #[default]
    Png,
    Jpeg,
    Tiff,
}

impl ImageEncoding {
    pub fn from_format(format: &str) -> Option<Self> {
        match format.trim().to_ascii_lowercase().as_str() {
            "png" | "image/png" => Some(Self::Png),
            "jpg" | "jpeg" | "image/jpeg" => Some(Self::Jpeg),
            "tif" | "tiff" | "image/tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Tiff => "image/tiff",
        }
    }
}

/// Options passed through to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct TileOptions {
    pub geostore_id: Option<Uuid>,
    pub style: StyleParam,
    pub encoding: ImageEncoding,
    pub projection: String,
    pub width: u32,
    pub height: u32,
}

impl TileQueryParams {
    /// Build from `(key, value)` pairs. Unknown keys are ignored.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key {
                "time" => &mut params.time,
                "time_from" => &mut params.time_from,
                "time_to" => &mut params.time_to,
                "geostore_id" => &mut params.geostore_id,
                "style" => &mut params.style,
                "format" => &mut params.format,
                "projection" => &mut params.projection,
                "width" => &mut params.width,
                "height" => &mut params.height,
                "x" => &mut params.x,
                "y" => &mut params.y,
                "value_type" => &mut params.value_type,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        params
    }

    /// The required `time` parameter.
    pub fn time(&self) -> Result<DateTime<Utc>> {
        let raw = non_empty(&self.time).ok_or(TileError::MissingParameter("time"))?;
        parse_time("time", raw)
    }

    /// Range from `time_from` and/or `time_to`; at least one is required.
    pub fn time_range(&self) -> Result<TimeRange> {
        let start = non_empty(&self.time_from)
            .map(|s| parse_time("time_from", s))
            .transpose()?;
        let end = non_empty(&self.time_to)
            .map(|s| parse_time("time_to", s))
            .transpose()?;

        if start.is_none() && end.is_none() {
            return Err(TileError::MissingParameter("time_from or time_to"));
        }
        Ok(TimeRange { start, end })
    }

    /// The required `x` and `y` coordinates.
    pub fn coords(&self) -> Result<(f64, f64)> {
        let x = non_empty(&self.x).ok_or(TileError::MissingParameter("x"))?;
        let y = non_empty(&self.y).ok_or(TileError::MissingParameter("y"))?;
        Ok((parse_number("x", x)?, parse_number("y", y)?))
    }

    /// The optional `geostore_id`.
    pub fn geostore_id(&self) -> Result<Option<Uuid>> {
        non_empty(&self.geostore_id)
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|e| TileError::InvalidParameter {
                    param: "geostore_id",
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    /// The `geostore_id` of an area query.
    pub fn required_geostore_id(&self) -> Result<Uuid> {
        self.geostore_id()?
            .ok_or(TileError::MissingParameter("geostore_id"))
    }

    /// Statistic picked by `value_type`. Unknown values fall back to mean.
    pub fn statistic(&self) -> Statistic {
        non_empty(&self.value_type)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    /// Rendering options: style, encoding, projection and size.
    pub fn options(&self) -> Result<TileOptions> {
        let encoding = match non_empty(&self.format) {
            None => ImageEncoding::default(),
            Some(format) => ImageEncoding::from_format(format).ok_or_else(|| TileError::InvalidParameter {
                param: "format",
                message: format!("unsupported format '{}'", format),
            })?,
        };

        Ok(TileOptions {
            geostore_id: self.geostore_id()?,
            style: StyleParam::parse(non_empty(&self.style)),
            encoding,
            projection: non_empty(&self.projection)
                .unwrap_or(DEFAULT_PROJECTION)
                .to_string(),
            width: parse_size("width", non_empty(&self.width))?,
            height: parse_size("height", non_empty(&self.height))?,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_time(param: &'static str, raw: &str) -> Result<DateTime<Utc>> {
    parse_iso_datetime(raw).map_err(|e| TileError::InvalidParameter {
        param,
        message: e.to_string(),
    })
}

fn parse_number(param: &'static str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TileError::InvalidParameter {
            param,
            message: format!("'{}' is not a number", raw),
        })
}

fn parse_size(param: &'static str, raw: Option<&str>) -> Result<u32> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_THUMBNAIL_SIZE);
    };
    match raw.parse::<u32>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(TileError::InvalidParameter {
            param,
            message: format!("'{}' is not a positive integer", raw),
        }),
    }
}
