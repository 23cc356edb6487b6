//! Geostores: stored polygons used as clip and query regions.
//!
//! A geostore is persisted as GeoJSON text and converted into a
//! `geo_types::MultiPolygon` before it is handed to the clipping code.

use geo_types::{Geometry, MultiPolygon};
use geojson::GeoJson;
use uuid::Uuid;

use crate::{BoundingBox, GeoError, GeoResult};

/// An immutable clip geometry (EPSG:4326).
#[derive(Debug, Clone, PartialEq)]
pub struct Geostore {
    pub id: Uuid,
    pub geometry: MultiPolygon<f64>,
}

impl Geostore {
    pub fn new(id: Uuid, geometry: MultiPolygon<f64>) -> Self {
        Self { id, geometry }
    }

    /// Build a geostore from its stored GeoJSON encoding.
    pub fn from_geojson(id: Uuid, geojson: &str) -> GeoResult<Self> {
        Ok(Self::new(id, multipolygon_from_geojson(geojson)?))
    }

    /// Hex form of the identifier, used in cache directory names.
    pub fn id_hex(&self) -> String {
        self.id.simple().to_string()
    }

    /// Bounding box of the geometry.
    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::of_multipolygon(&self.geometry)
    }

    /// GeoJSON text of the geometry.
    pub fn to_geojson(&self) -> String {
        let value = geojson::Value::from(&self.geometry);
        GeoJson::Geometry(geojson::Geometry::new(value)).to_string()
    }
}

/// Parse GeoJSON text (geometry, feature or feature collection) into a
/// multipolygon. Non-areal members are ignored.
pub fn multipolygon_from_geojson(text: &str) -> GeoResult<MultiPolygon<f64>> {
    let parsed: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| GeoError::InvalidGeometry(e.to_string()))?;

    let geometries = match parsed {
        GeoJson::Geometry(geometry) => vec![geometry],
        GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|feature| feature.geometry)
            .collect(),
    };

    let mut polygons = Vec::new();
    for geometry in geometries {
        let geometry = Geometry::<f64>::try_from(geometry)
            .map_err(|e| GeoError::InvalidGeometry(e.to_string()))?;
        collect_polygons(geometry, &mut polygons);
    }

    if polygons.is_empty() {
        return Err(GeoError::InvalidGeometry(
            "geometry contains no polygons".to_string(),
        ));
    }

    Ok(MultiPolygon(polygons))
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<geo_types::Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.0 {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}
