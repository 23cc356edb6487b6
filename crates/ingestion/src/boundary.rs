//! Boundary clipping policy for uploads.

use geo::BooleanOps;
use geo_types::MultiPolygon;
use tracing::{debug, warn};

use geomanager_common::{BoundaryRelation, BoundingBox};
use storage::{BoundarySettings, CountryBoundaryRepository};

use crate::error::Result;

/// What to do with an upload given the configured boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipDecision {
    /// Clipping does not apply; keep the upload as is.
    Skip(&'static str),
    /// The raster lies inside the boundary.
    Contained,
    /// The raster lies outside the boundary.
    Disjoint,
    /// Clip to this geometry.
    Clip(MultiPolygon<f64>),
}

/// Decide how an upload with `raster_bounds` relates to the boundary.
pub async fn decide_clip(
    raster_bounds: Option<&BoundingBox>,
    settings: &BoundarySettings,
    countries: &dyn CountryBoundaryRepository,
) -> Result<ClipDecision> {
    let Some(combined) = settings.combined_bounds.as_ref() else {
        return Ok(ClipDecision::Skip("no boundary configured"));
    };
    let Some(bounds) = raster_bounds.filter(|b| b.width() > 0.0 && b.height() > 0.0) else {
        return Ok(ClipDecision::Skip("raster has no bounds"));
    };

    match bounds.relationship(combined) {
        BoundaryRelation::Disjoint => Ok(ClipDecision::Disjoint),
        BoundaryRelation::Contained => Ok(ClipDecision::Contained),
        BoundaryRelation::Intersecting => match resolve_boundary_geometry(settings, countries).await? {
            Some(geometry) => Ok(ClipDecision::Clip(geometry)),
            None => Ok(ClipDecision::Skip("no country geometry resolved")),
        },
    }
}

/// Union of all configured country polygons.
///
/// Each country is looked up by its 2-letter code, then its 3-letter code,
/// and falls back to its bounding box. Countries with none of these are
/// left out.
pub async fn resolve_boundary_geometry(
    settings: &BoundarySettings,
    countries: &dyn CountryBoundaryRepository,
) -> Result<Option<MultiPolygon<f64>>> {
    let mut union: Option<MultiPolygon<f64>> = None;

    for country in &settings.countries {
        let mut geometry = countries.country_geometry(&country.code).await?;
        if geometry.is_none() {
            if let Some(alpha3) = &country.alpha3 {
                geometry = countries.country_geometry(alpha3).await?;
            }
        }
        let geometry = geometry.or_else(|| country.bbox.map(|b| MultiPolygon(vec![b.to_polygon()])));

        match geometry {
            Some(g) => {
                debug!(country = %country.code, polygons = g.0.len(), "Resolved country boundary");
                union = Some(match union {
                    Some(acc) => acc.union(&g),
                    None => g,
                });
            }
            None => warn!(country = %country.code, "No boundary geometry for country"),
        }
    }

    Ok(union.filter(|g| !g.0.is_empty()))
}
