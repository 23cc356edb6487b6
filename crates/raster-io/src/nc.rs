//! Native NetCDF access using the netcdf library.
//!
//! GDAL gives us georeferencing for NetCDF subdatasets, but variable
//! listings, dimensions and CF-encoded time axes are read here directly.
//! Clipping also happens here so the output keeps the source's variable and
//! dimension layout.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Once;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use geo::Contains;
use geo_types::{MultiPolygon, Point};
use netcdf::AttributeValue;
use rayon::prelude::*;
use tracing::{debug, warn};

use geomanager_common::BoundingBox;

use crate::error::{RasterError, RasterResult};

/// Time dimension names looked up when none are configured.
pub const DEFAULT_TIME_DIMENSIONS: &[&str] = &["time", "TIME", "XTIME", "xtime"];

/// Variables that are never offered as data variables.
const SKIPPED_VARIABLES: &[&str] = &["nbnds", "time_bnds", "spatial_ref"];

const LONGITUDE_NAMES: &[&str] = &["lon", "longitude", "x"];
const LATITUDE_NAMES: &[&str] = &["lat", "latitude", "y"];

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints diagnostics even for errors we handle, such as
/// probing for optional attributes. Safe to call multiple times.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way to disable error output.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Variables, dimensions and decoded time axis of a NetCDF file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetCdfSummary {
    pub data_variables: Vec<String>,
    pub dimensions: Vec<String>,
    pub timestamps: Vec<DateTime<Utc>>,
    /// Name of the time dimension found, if any.
    pub time_dimension: Option<String>,
}

/// Inspect a NetCDF file.
///
/// `time_dimensions` lists the dimension names treated as the time axis;
/// the first one present wins.
pub fn inspect_netcdf(path: &Path, time_dimensions: &[String]) -> RasterResult<NetCdfSummary> {
    silence_hdf5_errors();

    let file = netcdf::open(path).map_err(|e| RasterError::Open {
        path: path.to_path_buf(),
        message: format!("Failed to open NetCDF: {}", e),
    })?;

    let dimensions: Vec<String> = file.dimensions().map(|d| d.name()).collect();
    let dimension_set: HashSet<&str> = dimensions.iter().map(String::as_str).collect();

    let data_variables = file
        .variables()
        .filter(|var| {
            let name = var.name();
            let dims = var.dimensions();
            let is_coordinate = dims.len() == 1 && dims[0].name() == name;
            !dims.is_empty()
                && !is_coordinate
                && !dimension_set.contains(name.as_str())
                && !SKIPPED_VARIABLES.contains(&name.as_str())
        })
        .map(|var| var.name())
        .collect();

    let time_dimension = time_dimensions
        .iter()
        .find(|name| dimension_set.contains(name.as_str()))
        .cloned();

    let timestamps = match &time_dimension {
        Some(dim) => match file.variable(dim) {
            Some(var) => decode_time_variable(&var)?,
            None => {
                warn!(dimension = %dim, path = %path.display(), "Time dimension has no coordinate variable");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    debug!(
        path = %path.display(),
        variables = ?data_variables,
        timestamps = timestamps.len(),
        "Inspected NetCDF file"
    );

    Ok(NetCdfSummary {
        data_variables,
        dimensions,
        timestamps,
        time_dimension,
    })
}

fn decode_time_variable(var: &netcdf::Variable) -> RasterResult<Vec<DateTime<Utc>>> {
    let units = get_string_attr(var, "units")
        .ok_or_else(|| RasterError::InvalidTimeUnits(format!("{} has no units", var.name())))?;
    let calendar = get_string_attr(var, "calendar");
    let values: Vec<f64> = var.get_values(..)?;
    decode_cf_times(&values, &units, calendar.as_deref())
}

/// Decode CF time offsets (`"<unit> since <epoch>"`) into UTC datetimes.
pub fn decode_cf_times(
    values: &[f64],
    units: &str,
    calendar: Option<&str>,
) -> RasterResult<Vec<DateTime<Utc>>> {
    match calendar.map(|c| c.trim().to_ascii_lowercase()) {
        None => {}
        Some(c) if matches!(c.as_str(), "standard" | "gregorian" | "proleptic_gregorian") => {}
        Some(c) => return Err(RasterError::UnsupportedCalendar(c)),
    }

    let (unit, epoch) = units
        .split_once(" since ")
        .ok_or_else(|| RasterError::InvalidTimeUnits(units.to_string()))?;

    let unit_ms: f64 = match unit.trim().to_ascii_lowercase().as_str() {
        "days" | "day" | "d" => 86_400_000.0,
        "hours" | "hour" | "hr" | "h" => 3_600_000.0,
        "minutes" | "minute" | "min" => 60_000.0,
        "seconds" | "second" | "sec" | "s" => 1_000.0,
        "milliseconds" | "millisecond" | "ms" => 1.0,
        _ => return Err(RasterError::InvalidTimeUnits(units.to_string())),
    };

    let epoch = parse_cf_epoch(epoch).ok_or_else(|| RasterError::InvalidTimeUnits(units.to_string()))?;

    values
        .iter()
        .map(|v| {
            if !v.is_finite() {
                return Err(RasterError::InvalidTimeUnits(format!("non-finite time value {}", v)));
            }
            Ok(epoch + Duration::milliseconds((v * unit_ms).round() as i64))
        })
        .collect()
}

fn parse_cf_epoch(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    let s = s
        .strip_suffix("UTC")
        .or_else(|| s.strip_suffix('Z'))
        .unwrap_or(s)
        .trim();

    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// Subdataset path GDAL uses for one variable of a NetCDF file.
pub fn subdataset_path(path: &Path, variable: &str) -> String {
    format!("NETCDF:\"{}\":{}", path.display(), variable)
}

/// Clip a NetCDF file to a geometry.
///
/// The lon/lat axes are cropped to the geometry's bounding box and every
/// variable gridded on them is masked outside the geometry with its fill
/// value (NaN when it has none). Other variables are copied unchanged.
pub fn clip_netcdf(src: &Path, geometry: &MultiPolygon<f64>, out: &Path) -> RasterResult<()> {
    silence_hdf5_errors();

    let bbox = BoundingBox::of_multipolygon(geometry).ok_or(RasterError::EmptyGeometry)?;
    let file = netcdf::open(src)?;

    let lon_name = find_axis(&file, LONGITUDE_NAMES)?;
    let lat_name = find_axis(&file, LATITUDE_NAMES)?;

    let lons: Vec<f64> = axis_values(&file, &lon_name)?;
    let lats: Vec<f64> = axis_values(&file, &lat_name)?;

    let lon_range = index_range(&lons, bbox.min_x, bbox.max_x).ok_or(RasterError::OutsideRaster)?;
    let lat_range = index_range(&lats, bbox.min_y, bbox.max_y).ok_or(RasterError::OutsideRaster)?;

    let crop_lons = &lons[lon_range.clone()];
    let inside: Vec<bool> = lats[lat_range.clone()]
        .par_iter()
        .flat_map_iter(|lat| {
            crop_lons
                .iter()
                .map(move |lon| geometry.contains(&Point::new(*lon, *lat)))
        })
        .collect();

    let mut output = netcdf::create(out)?;

    for dim in file.dimensions() {
        let name = dim.name();
        let len = if name == lon_name {
            lon_range.len()
        } else if name == lat_name {
            lat_range.len()
        } else {
            dim.len()
        };
        output.add_dimension(&name, len)?;
    }

    for attr in file.attributes() {
        if let Ok(value) = attr.value() {
            output.add_attribute(attr.name(), value)?;
        }
    }

    for var in file.variables() {
        let name = var.name();
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();

        let values: Vec<f64> = match var.get_values(..) {
            Ok(values) => values,
            Err(e) => {
                warn!(variable = %name, error = %e, "Skipping non-numeric variable");
                continue;
            }
        };

        let gridded = dims.len() >= 2
            && dims[dims.len() - 2] == lat_name
            && dims[dims.len() - 1] == lon_name;
        let fill_value = get_f64_attr(&var, "_FillValue").or_else(|| get_f64_attr(&var, "missing_value"));

        let values = if name == lon_name {
            lons[lon_range.clone()].to_vec()
        } else if name == lat_name {
            lats[lat_range.clone()].to_vec()
        } else if gridded {
            let fill = fill_value.unwrap_or(f64::NAN);
            crop_grid(&values, lats.len(), lons.len(), &lat_range, &lon_range, &inside, fill)
        } else if dims.iter().any(|d| *d == lon_name || *d == lat_name) {
            warn!(variable = %name, "Skipping variable with unsupported lon/lat layout");
            continue;
        } else {
            values
        };

        let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();
        let mut out_var = output.add_variable::<f64>(&name, &dim_refs)?;
        if gridded {
            out_var.set_fill_value(fill_value.unwrap_or(f64::NAN))?;
        }
        for attr in var.attributes() {
            if matches!(attr.name(), "_FillValue" | "missing_value") {
                continue;
            }
            if let Ok(value) = attr.value() {
                out_var.put_attribute(attr.name(), value)?;
            }
        }
        out_var.put_values(&values, ..)?;
    }

    debug!(
        src = %src.display(),
        out = %out.display(),
        lon = lon_range.len(),
        lat = lat_range.len(),
        "Clipped NetCDF file"
    );

    Ok(())
}

fn find_axis(file: &netcdf::File, candidates: &[&str]) -> RasterResult<String> {
    candidates
        .iter()
        .find(|name| file.variable(name).is_some())
        .map(|name| name.to_string())
        .ok_or_else(|| RasterError::MissingVariable(candidates.join("|")))
}

fn axis_values(file: &netcdf::File, name: &str) -> RasterResult<Vec<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| RasterError::MissingVariable(name.to_string()))?;
    Ok(var.get_values(..)?)
}

/// Contiguous index range of coordinates within `[min, max]`.
fn index_range(coords: &[f64], min: f64, max: f64) -> Option<std::ops::Range<usize>> {
    let first = coords.iter().position(|c| *c >= min && *c <= max)?;
    let last = coords.iter().rposition(|c| *c >= min && *c <= max)?;
    Some(first..last + 1)
}

/// Crop the trailing `(lat, lon)` plane of every leading index and apply the
/// inside mask.
fn crop_grid(
    values: &[f64],
    n_lat: usize,
    n_lon: usize,
    lat_range: &std::ops::Range<usize>,
    lon_range: &std::ops::Range<usize>,
    inside: &[bool],
    fill: f64,
) -> Vec<f64> {
    let plane = n_lat * n_lon;
    let planes = if plane == 0 { 0 } else { values.len() / plane };
    let mut out = Vec::with_capacity(planes * lat_range.len() * lon_range.len());

    for p in 0..planes {
        let base = p * plane;
        let mut k = 0;
        for j in lat_range.clone() {
            for i in lon_range.clone() {
                out.push(if inside[k] { values[base + j * n_lon + i] } else { fill });
                k += 1;
            }
        }
    }
    out
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

/// Helper to get f64 attribute.
fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

/// Helper to get string attribute.
fn get_string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Str(s) => Some(s),
        AttributeValue::Strs(strs) => strs.into_iter().next(),
        _ => None,
    }
}
