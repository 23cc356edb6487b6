//! Ingestion configuration.
//!
//! Built once at startup from environment variables, optionally overlaid by
//! a YAML file, then shared read-only. YAML values support `${VAR}` and
//! `${VAR:-default}` substitution.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use geomanager_common::BoundingBox;
use raster_io::DEFAULT_TIME_DIMENSIONS;
use storage::{BoundarySettings, CountrySetting};

use crate::error::{IngestionError, Result};

pub const DEFAULT_CLIP_CACHE_CAPACITY: usize = 256;

/// Immutable pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub database_url: Option<String>,
    /// Root of the per-layer auto-ingest directories.
    pub auto_ingest_dir: PathBuf,
    /// Root of managed media storage.
    pub media_root: PathBuf,
    /// Root of the geostore clip cache.
    pub cache_dir: PathBuf,
    pub clip_cache_capacity: usize,
    /// NetCDF time dimension names accepted on top of the defaults.
    pub extra_time_dimensions: Vec<String>,
    /// Whether directory ingestion clips to the country boundary.
    pub clip_to_boundary: bool,
    pub boundary: BoundarySettings,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            auto_ingest_dir: PathBuf::from("data/auto_ingest"),
            media_root: PathBuf::from("media"),
            cache_dir: PathBuf::from("cache/geostore_clips"),
            clip_cache_capacity: DEFAULT_CLIP_CACHE_CAPACITY,
            extra_time_dimensions: Vec::new(),
            clip_to_boundary: true,
            boundary: BoundarySettings::default(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from `GEOMANAGER_*` and `DATABASE_URL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        config.database_url = get("DATABASE_URL");
        if let Some(dir) = get("GEOMANAGER_AUTO_INGEST_DIR") {
            config.auto_ingest_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("GEOMANAGER_MEDIA_ROOT") {
            config.media_root = PathBuf::from(dir);
        }
        if let Some(dir) = get("GEOMANAGER_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(capacity) = get("GEOMANAGER_CLIP_CACHE_CAPACITY") {
            config.clip_cache_capacity = capacity.trim().parse().map_err(|_| {
                IngestionError::InvalidConfig(format!(
                    "GEOMANAGER_CLIP_CACHE_CAPACITY must be a positive integer, got '{}'",
                    capacity
                ))
            })?;
        }
        if let Some(dims) = get("GEOMANAGER_TIME_DIMENSIONS") {
            config.extra_time_dimensions = split_list(&dims);
        }
        if let Some(flag) = get("GEOMANAGER_CLIP_TO_BOUNDARY") {
            config.clip_to_boundary = parse_bool(&flag);
        }
        if let Some(codes) = get("GEOMANAGER_BOUNDARY_COUNTRIES") {
            config.boundary.countries = split_list(&codes).into_iter().map(CountrySetting::new).collect();
        }
        if let Some(bbox) = get("GEOMANAGER_BOUNDARY_BBOX") {
            config.boundary.combined_bounds = Some(parse_bbox(&bbox)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Overlay values from a YAML file.
    pub fn with_yaml_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            IngestionError::InvalidConfig(format!(
                "Failed to read config from {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        self.with_yaml_str(&content)
    }

    pub fn with_yaml_str(mut self, content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let file: ConfigFile = serde_yaml::from_str(&expanded)
            .map_err(|e| IngestionError::InvalidConfig(format!("Failed to parse config YAML: {}", e)))?;

        if let Some(url) = file.database_url {
            self.database_url = Some(url);
        }
        if let Some(dir) = file.auto_ingest_dir {
            self.auto_ingest_dir = dir;
        }
        if let Some(dir) = file.media_root {
            self.media_root = dir;
        }
        if let Some(dir) = file.cache_dir {
            self.cache_dir = dir;
        }
        if let Some(capacity) = file.clip_cache_capacity {
            self.clip_cache_capacity = capacity;
        }
        if let Some(dims) = file.time_dimensions {
            self.extra_time_dimensions = dims;
        }
        if let Some(clip) = file.clip_to_boundary {
            self.clip_to_boundary = clip;
        }
        if let Some(boundary) = file.boundary {
            self.boundary = boundary;
        }

        self.validate()?;
        Ok(self)
    }

    /// Default time dimension names followed by the configured extras.
    pub fn time_dimensions(&self) -> Vec<String> {
        let mut dims: Vec<String> = DEFAULT_TIME_DIMENSIONS.iter().map(|s| s.to_string()).collect();
        for extra in &self.extra_time_dimensions {
            if !dims.contains(extra) {
                dims.push(extra.clone());
            }
        }
        dims
    }

    fn validate(&self) -> Result<()> {
        if self.clip_cache_capacity == 0 {
            return Err(IngestionError::InvalidConfig(
                "clip cache capacity must be greater than zero".to_string(),
            ));
        }
        if let Some(bounds) = &self.boundary.combined_bounds {
            if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
                return Err(IngestionError::InvalidConfig(format!(
                    "boundary bounds are empty: {:?}",
                    bounds.to_array()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    database_url: Option<String>,
    auto_ingest_dir: Option<PathBuf>,
    media_root: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    clip_cache_capacity: Option<usize>,
    time_dimensions: Option<Vec<String>>,
    clip_to_boundary: Option<bool>,
    boundary: Option<BoundarySettings>,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_bbox(value: &str) -> Result<BoundingBox> {
    BoundingBox::parse(value).map_err(|e| IngestionError::InvalidConfig(format!("GEOMANAGER_BOUNDARY_BBOX: {}", e)))
}

/// Substitute `${VAR}` and `${VAR:-default}` references.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::new();
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => var_expr.push(c),
                    None => {
                        return Err(IngestionError::InvalidConfig(format!(
                            "Unclosed variable substitution: ${{{}",
                            var_expr
                        )))
                    }
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim())
            .map_err(|_| IngestionError::InvalidConfig(format!("Environment variable {} not set", expr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IngestConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, IngestConfig::default());
        assert_eq!(config.time_dimensions(), vec!["time", "TIME", "XTIME", "xtime"]);
    }

    #[test]
    fn test_from_lookup() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/geomanager"),
            ("GEOMANAGER_MEDIA_ROOT", "/srv/media"),
            ("GEOMANAGER_CLIP_CACHE_CAPACITY", "16"),
            ("GEOMANAGER_TIME_DIMENSIONS", "valid_time, time"),
            ("GEOMANAGER_BOUNDARY_COUNTRIES", "KE,UG"),
            ("GEOMANAGER_BOUNDARY_BBOX", "29,-5,42,5"),
        ]))
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/geomanager"));
        assert_eq!(config.media_root, PathBuf::from("/srv/media"));
        assert_eq!(config.clip_cache_capacity, 16);
        assert_eq!(
            config.time_dimensions(),
            vec!["time", "TIME", "XTIME", "xtime", "valid_time"]
        );
        assert_eq!(config.boundary.countries.len(), 2);
        assert_eq!(config.boundary.combined_bounds, Some(BoundingBox::new(29.0, -5.0, 42.0, 5.0)));
    }

    #[test]
    fn test_invalid_capacity() {
        assert!(IngestConfig::from_lookup(lookup(&[("GEOMANAGER_CLIP_CACHE_CAPACITY", "lots")])).is_err());
        assert!(IngestConfig::from_lookup(lookup(&[("GEOMANAGER_CLIP_CACHE_CAPACITY", "0")])).is_err());
    }

    #[test]
    fn test_yaml_overlay() {
        let yaml = r#"
media_root: /data/media
clip_to_boundary: false
boundary:
  combined_bounds: { min_x: 33.0, min_y: -5.0, max_x: 42.0, max_y: 5.0 }
  countries:
    - code: KE
      alpha3: KEN
"#;
        let config = IngestConfig::default().with_yaml_str(yaml).unwrap();
        assert_eq!(config.media_root, PathBuf::from("/data/media"));
        assert!(!config.clip_to_boundary);
        assert_eq!(config.boundary.countries[0].alpha3.as_deref(), Some("KEN"));
        // untouched values keep their previous setting
        assert_eq!(config.clip_cache_capacity, DEFAULT_CLIP_CACHE_CAPACITY);
    }

    #[test]
    fn test_yaml_rejects_unknown_keys() {
        assert!(IngestConfig::default().with_yaml_str("cache_size: 3").is_err());
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        std::env::remove_var("GEOMANAGER_TEST_UNSET_VAR");
        let result = expand_env_vars("root: ${GEOMANAGER_TEST_UNSET_VAR:-/tmp/media}").unwrap();
        assert_eq!(result, "root: /tmp/media");
    }

    #[test]
    fn test_expand_env_vars_missing_required() {
        std::env::remove_var("GEOMANAGER_TEST_REQUIRED_VAR");
        assert!(expand_env_vars("${GEOMANAGER_TEST_REQUIRED_VAR}").is_err());
    }
}
