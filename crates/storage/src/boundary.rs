//! Country boundary settings and polygon lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use geo_types::MultiPolygon;
use serde::{Deserialize, Serialize};

use geomanager_common::BoundingBox;

use crate::error::Result;

/// One configured country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountrySetting {
    /// ISO 3166-1 alpha-2 code.
    pub code: String,
    /// ISO 3166-1 alpha-3 code.
    #[serde(default)]
    pub alpha3: Option<String>,
    /// Fallback extent when no polygon is stored for the country.
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

impl CountrySetting {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            alpha3: None,
            bbox: None,
        }
    }

    pub fn with_alpha3(mut self, alpha3: impl Into<String>) -> Self {
        self.alpha3 = Some(alpha3.into());
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

/// Boundary configuration used to clip ingested rasters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundarySettings {
    /// Extent of all configured countries. `None` disables clipping.
    #[serde(default)]
    pub combined_bounds: Option<BoundingBox>,
    #[serde(default)]
    pub countries: Vec<CountrySetting>,
}

#[async_trait]
pub trait BoundarySettingsProvider: Send + Sync {
    async fn boundary_settings(&self) -> Result<BoundarySettings>;
}

#[async_trait]
pub trait CountryBoundaryRepository: Send + Sync {
    /// Polygon of the country with this alpha-2 or alpha-3 code.
    async fn country_geometry(&self, code: &str) -> Result<Option<MultiPolygon<f64>>>;
}

/// Fixed settings, typically read from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticBoundarySettings(pub BoundarySettings);

#[async_trait]
impl BoundarySettingsProvider for StaticBoundarySettings {
    async fn boundary_settings(&self) -> Result<BoundarySettings> {
        Ok(self.0.clone())
    }
}

/// Country polygons keyed by upper-case code.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCountryBoundaries {
    geometries: HashMap<String, MultiPolygon<f64>>,
}

impl InMemoryCountryBoundaries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: &str, geometry: MultiPolygon<f64>) {
        self.geometries.insert(code.to_uppercase(), geometry);
    }

    pub fn with(mut self, code: &str, geometry: MultiPolygon<f64>) -> Self {
        self.insert(code, geometry);
        self
    }
}

#[async_trait]
impl CountryBoundaryRepository for InMemoryCountryBoundaries {
    async fn country_geometry(&self, code: &str) -> Result<Option<MultiPolygon<f64>>> {
        Ok(self.geometries.get(&code.to_uppercase()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_lookup_is_case_insensitive() {
        let bbox = BoundingBox::new(33.0, -5.0, 42.0, 5.0);
        let repo = InMemoryCountryBoundaries::new().with("ke", MultiPolygon(vec![bbox.to_polygon()]));

        assert!(repo.country_geometry("KE").await.unwrap().is_some());
        assert!(repo.country_geometry("UG").await.unwrap().is_none());
    }

    #[test]
    fn test_settings_deserialize_defaults() {
        let settings: BoundarySettings =
            serde_json::from_str(r#"{"countries":[{"code":"KE"}]}"#).unwrap();
        assert!(settings.combined_bounds.is_none());
        assert_eq!(settings.countries[0].alpha3, None);
    }
}
