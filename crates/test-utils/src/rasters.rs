//! Writers for small GeoTIFF and NetCDF fixtures.
//!
//! Fixtures are generated on the fly so tests do not depend on checked-in
//! binary data.

use std::path::Path;

use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;

use crate::fixtures::grid::GridSpec;
use crate::fixtures::time::NETCDF_TIME_UNITS;
use crate::generators::create_test_grid;

/// A GeoTIFF to write.
#[derive(Debug, Clone)]
pub struct GeoTiffSpec {
    pub grid: GridSpec,
    /// One row-major buffer per band.
    pub bands: Vec<Vec<f64>>,
    pub nodata: Option<f64>,
    /// `None` writes the file without a CRS.
    pub epsg: Option<u32>,
}

impl GeoTiffSpec {
    /// Single band of [`create_test_grid`] values in EPSG:4326.
    pub fn single_band(grid: GridSpec) -> Self {
        Self {
            grid,
            bands: vec![create_test_grid(grid.width, grid.height)],
            nodata: None,
            epsg: Some(4326),
        }
    }

    pub fn with_bands(mut self, bands: Vec<Vec<f64>>) -> Self {
        self.bands = bands;
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn without_crs(mut self) -> Self {
        self.epsg = None;
        self
    }
}

/// Write a float64 GeoTIFF.
pub fn write_geotiff(path: &Path, spec: &GeoTiffSpec) -> gdal::errors::Result<()> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (width, height) = (spec.grid.width, spec.grid.height);
    let mut dataset = driver.create_with_band_type::<f64, _>(path, width, height, spec.bands.len())?;
    dataset.set_geo_transform(&spec.grid.geotransform())?;
    if let Some(epsg) = spec.epsg {
        dataset.set_spatial_ref(&SpatialRef::from_epsg(epsg)?)?;
    }

    for (i, values) in spec.bands.iter().enumerate() {
        let mut band = dataset.rasterband(i + 1)?;
        if let Some(nodata) = spec.nodata {
            band.set_no_data_value(Some(nodata))?;
        }
        let mut buffer = Buffer::new((width, height), values.clone());
        band.write((0, 0), (width, height), &mut buffer)?;
    }
    Ok(())
}

/// A CF-style NetCDF file to write: `time` x `lat` x `lon` variables.
#[derive(Debug, Clone)]
pub struct NetCdfSpec {
    pub grid: GridSpec,
    pub variables: Vec<String>,
    /// Offsets in days since 2023-01-01. Empty writes a file without a time axis.
    pub time_offsets: Vec<f64>,
    pub fill_value: Option<f64>,
    /// Adds a `time_bnds` variable.
    pub with_time_bounds: bool,
}

impl NetCdfSpec {
    pub fn new(grid: GridSpec, variables: &[&str], time_offsets: &[f64]) -> Self {
        Self {
            grid,
            variables: variables.iter().map(|v| v.to_string()).collect(),
            time_offsets: time_offsets.to_vec(),
            fill_value: None,
            with_time_bounds: false,
        }
    }

    pub fn with_fill_value(mut self, fill: f64) -> Self {
        self.fill_value = Some(fill);
        self
    }

    pub fn with_time_bounds(mut self) -> Self {
        self.with_time_bounds = true;
        self
    }

    /// Value written for a variable at (time, row, col).
    pub fn value(variable: usize, time: usize, row: usize, col: usize) -> f64 {
        (variable * 10_000 + time * 1_000 + row * 10 + col) as f64
    }
}

/// Write a NetCDF-4 fixture.
pub fn write_netcdf(path: &Path, spec: &NetCdfSpec) -> Result<(), netcdf::Error> {
    let mut file = netcdf::create(path)?;
    let (width, height) = (spec.grid.width, spec.grid.height);
    let has_time = !spec.time_offsets.is_empty();

    if has_time {
        file.add_dimension("time", spec.time_offsets.len())?;
    }
    file.add_dimension("lat", height)?;
    file.add_dimension("lon", width)?;
    file.add_attribute("Conventions", "CF-1.8")?;

    {
        let mut lat = file.add_variable::<f64>("lat", &["lat"])?;
        lat.put_attribute("units", "degrees_north")?;
        lat.put_attribute("standard_name", "latitude")?;
        lat.put_values(&spec.grid.lats(), ..)?;
    }
    {
        let mut lon = file.add_variable::<f64>("lon", &["lon"])?;
        lon.put_attribute("units", "degrees_east")?;
        lon.put_attribute("standard_name", "longitude")?;
        lon.put_values(&spec.grid.lons(), ..)?;
    }

    if has_time {
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", NETCDF_TIME_UNITS)?;
        time.put_attribute("calendar", "standard")?;
        time.put_values(&spec.time_offsets, ..)?;

        if spec.with_time_bounds {
            file.add_dimension("nbnds", 2)?;
            let bounds: Vec<f64> = spec
                .time_offsets
                .iter()
                .flat_map(|t| [*t, *t + 1.0])
                .collect();
            let mut time_bnds = file.add_variable::<f64>("time_bnds", &["time", "nbnds"])?;
            time_bnds.put_values(&bounds, ..)?;
        }
    }

    let steps = spec.time_offsets.len().max(1);
    for (v, name) in spec.variables.iter().enumerate() {
        let dims: &[&str] = if has_time { &["time", "lat", "lon"] } else { &["lat", "lon"] };
        let mut values = Vec::with_capacity(steps * width * height);
        for t in 0..steps {
            for row in 0..height {
                for col in 0..width {
                    values.push(NetCdfSpec::value(v, t, row, col));
                }
            }
        }

        let mut var = file.add_variable::<f64>(name, dims)?;
        if let Some(fill) = spec.fill_value {
            var.set_fill_value(fill)?;
        }
        var.put_attribute("units", "mm")?;
        var.put_attribute("long_name", name.as_str())?;
        var.put_values(&values, ..)?;
    }

    Ok(())
}
