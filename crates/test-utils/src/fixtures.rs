//! Common test fixtures for geomanager tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in raster ingestion.

use geo_types::{MultiPolygon, Polygon};

use geomanager_common::BoundingBox;

/// Common bounding box definitions for testing.
pub mod bbox {
    use geomanager_common::BoundingBox;

    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: BoundingBox = BoundingBox {
        min_x: -180.0,
        min_y: -90.0,
        max_x: 180.0,
        max_y: 90.0,
    };

    /// Roughly the extent of Kenya
    pub const KENYA: BoundingBox = BoundingBox {
        min_x: 33.9,
        min_y: -4.7,
        max_x: 41.9,
        max_y: 5.0,
    };

    /// East Africa, covering Kenya and its neighbours
    pub const EAST_AFRICA: BoundingBox = BoundingBox {
        min_x: 28.0,
        min_y: -12.0,
        max_x: 52.0,
        max_y: 15.0,
    };

    /// Somewhere over the Atlantic, disjoint from the boxes above
    pub const ATLANTIC: BoundingBox = BoundingBox {
        min_x: -40.0,
        min_y: 20.0,
        max_x: -30.0,
        max_y: 30.0,
    };
}

/// Common grid specifications for testing.
pub mod grid {
    /// Simple 10x10 one-degree grid over lon 0..10, lat 0..10
    pub const SIMPLE_10X10: GridSpec = GridSpec {
        width: 10,
        height: 10,
        min_lon: 0.0,
        max_lon: 10.0,
        min_lat: 0.0,
        max_lat: 10.0,
    };

    /// 0.5 degree grid over East Africa
    pub const EAST_AFRICA: GridSpec = GridSpec {
        width: 48,
        height: 54,
        min_lon: 28.0,
        max_lon: 52.0,
        min_lat: -12.0,
        max_lat: 15.0,
    };

    /// Grid specification for testing.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub width: usize,
        pub height: usize,
        pub min_lon: f64,
        pub max_lon: f64,
        pub min_lat: f64,
        pub max_lat: f64,
    }

    impl GridSpec {
        /// Returns the total number of grid cells.
        pub fn size(&self) -> usize {
            self.width * self.height
        }

        /// Returns the resolution in degrees.
        pub fn resolution(&self) -> (f64, f64) {
            let dx = (self.max_lon - self.min_lon) / self.width as f64;
            let dy = (self.max_lat - self.min_lat) / self.height as f64;
            (dx, dy)
        }

        /// North-up GDAL geotransform.
        pub fn geotransform(&self) -> [f64; 6] {
            let (dx, dy) = self.resolution();
            [self.min_lon, dx, 0.0, self.max_lat, 0.0, -dy]
        }

        /// Pixel-center longitudes, west to east.
        pub fn lons(&self) -> Vec<f64> {
            let (dx, _) = self.resolution();
            (0..self.width)
                .map(|i| self.min_lon + (i as f64 + 0.5) * dx)
                .collect()
        }

        /// Pixel-center latitudes, north to south.
        pub fn lats(&self) -> Vec<f64> {
            let (_, dy) = self.resolution();
            (0..self.height)
                .map(|j| self.max_lat - (j as f64 + 0.5) * dy)
                .collect()
        }
    }
}

/// Common time values for testing.
pub mod time {
    /// A fixed reference time for tests
    pub const REFERENCE_TIME: &str = "2023-01-01T00:00:00Z";

    /// File name stem carrying an auto-ingest timestamp
    pub const TIMESTAMPED_STEM: &str = "rainfall_2023-01-01T00:00:00.000Z";

    /// Epoch of the time axis written into NetCDF fixtures
    pub const NETCDF_TIME_UNITS: &str = "days since 2023-01-01 00:00:00";
}

/// Common CRS identifiers.
pub mod crs {
    /// WGS84 geographic
    pub const EPSG_4326: &str = "EPSG:4326";
}

/// Axis-aligned rectangle as a multipolygon.
pub fn rectangle(bbox: &BoundingBox) -> MultiPolygon<f64> {
    MultiPolygon(vec![bbox.to_polygon()])
}

/// A triangle with its right angle at the south-west corner of `bbox`.
pub fn triangle(bbox: &BoundingBox) -> MultiPolygon<f64> {
    let polygon = Polygon::new(
        vec![
            (bbox.min_x, bbox.min_y),
            (bbox.max_x, bbox.min_y),
            (bbox.min_x, bbox.max_y),
            (bbox.min_x, bbox.min_y),
        ]
        .into(),
        vec![],
    );
    MultiPolygon(vec![polygon])
}

/// GeoJSON Feature wrapping a rectangle.
pub fn rectangle_feature_geojson(bbox: &BoundingBox) -> String {
    format!(
        r#"{{"type":"Feature","properties":{{}},"geometry":{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}}}"#,
        x0 = bbox.min_x,
        y0 = bbox.min_y,
        x1 = bbox.max_x,
        y1 = bbox.max_y,
    )
}
