//! Value queries against published COGs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RasterError, RasterResult};
use crate::info::open_dataset;
use crate::mask::PixelGrid;

/// Value of band 1 at a world coordinate.
///
/// `None` when the point is off the raster or the pixel is nodata.
pub fn pixel_value(path: &Path, x: f64, y: f64) -> RasterResult<Option<f64>> {
    let dataset = open_dataset(&path.to_string_lossy())?;
    let (width, height) = dataset.raster_size();
    let grid = PixelGrid::from_geotransform(&dataset.geo_transform()?, width, height)?;

    let Some((col, row)) = grid.pixel_at(x, y) else {
        return Ok(None);
    };

    if dataset.raster_count() == 0 {
        return Err(RasterError::NoBands(path.to_path_buf()));
    }
    let band = dataset.rasterband(1)?;
    let buffer = band.read_as::<f64>((col as isize, row as isize), (1, 1), (1, 1), None)?;
    let value = buffer.data().first().copied();

    Ok(value.filter(|v| is_valid(*v, band.no_data_value())))
}

/// All valid values of band 1.
pub fn valid_values(path: &Path) -> RasterResult<Vec<f64>> {
    let dataset = open_dataset(&path.to_string_lossy())?;
    if dataset.raster_count() == 0 {
        return Err(RasterError::NoBands(path.to_path_buf()));
    }
    let size = dataset.raster_size();
    let band = dataset.rasterband(1)?;
    let nodata = band.no_data_value();
    let buffer = band.read_as::<f64>((0, 0), size, size, None)?;

    Ok(buffer
        .data()
        .iter()
        .copied()
        .filter(|v| is_valid(*v, nodata))
        .collect())
}

fn is_valid(value: f64, nodata: Option<f64>) -> bool {
    !value.is_nan() && nodata.map_or(true, |nd| value != nd)
}

/// Summary statistics over a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandStatistics {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub sum: f64,
}

impl BandStatistics {
    /// `None` for an empty input.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let (min, max, sum) = values.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), v| (min.min(*v), max.max(*v), sum + v),
        );
        Some(Self {
            count: values.len(),
            min,
            max,
            mean: sum / values.len() as f64,
            sum,
        })
    }

    pub fn get(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Min => self.min,
            Statistic::Max => self.max,
            Statistic::Mean => self.mean,
            Statistic::Sum => self.sum,
        }
    }
}

/// A reducer selectable by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Min,
    Max,
    #[default]
    Mean,
    Sum,
}

impl std::str::FromStr for Statistic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            "mean" => Ok(Statistic::Mean),
            "sum" => Ok(Statistic::Sum),
            other => Err(format!("unknown statistic '{}'", other)),
        }
    }
}
