//! Integration tests for the ingestion pipeline.
//!
//! Most tests run against a fake toolkit so they exercise the orchestration
//! (staging, skip/replace decisions, cleanup) without native libraries.
//! The last section runs the real GDAL toolkit on generated fixtures.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use geo_types::MultiPolygon;
use tempfile::TempDir;
use uuid::Uuid;

use geomanager_common::{BoundingBox, RasterDriver, RasterFileLayer, RasterMetadata};
use ingestion::{
    IngestConfig, IngestOutcome, IngestionError, Ingester, PublishSelection, TimestampSelection,
    WatchEvent,
};
use raster_io::{GdalToolkit, RasterClip, RasterResult, RasterToolkit};
use storage::{
    BoundarySettings, CountrySetting, InMemoryCountryBoundaries, MemoryCatalog, RasterCatalog,
    StaticBoundarySettings, TimeRange,
};
use test_utils::{bbox, fixtures::grid, rectangle, write_geotiff, GeoTiffSpec};

const TIMESTAMPED: &str = "rainfall_2023-01-01T00:00:00.000Z.tif";

// ============================================================================
// Fake toolkit
// ============================================================================

/// Toolkit that derives metadata from the file extension and writes small
/// marker files instead of rasters.
struct FakeToolkit {
    bounds: BoundingBox,
    clipped_bounds: BoundingBox,
    timestamps: Vec<String>,
    converts: AtomicUsize,
    clips: AtomicUsize,
}

impl FakeToolkit {
    fn new() -> Self {
        Self {
            bounds: BoundingBox::new(30.0, -5.0, 40.0, 5.0),
            clipped_bounds: BoundingBox::new(33.0, -4.0, 40.0, 5.0),
            timestamps: vec![
                "2023-01-01T00:00:00".to_string(),
                "2023-02-01T00:00:00".to_string(),
                "2023-03-01T00:00:00".to_string(),
            ],
            converts: AtomicUsize::new(0),
            clips: AtomicUsize::new(0),
        }
    }
}

impl RasterClip for FakeToolkit {
    fn clip(
        &self,
        _src: &Path,
        _driver: RasterDriver,
        _geometry: &MultiPolygon<f64>,
        out: &Path,
    ) -> RasterResult<()> {
        self.clips.fetch_add(1, Ordering::SeqCst);
        std::fs::write(out, b"clipped")?;
        Ok(())
    }
}

impl RasterToolkit for FakeToolkit {
    fn read_info(&self, path: &Path) -> RasterResult<RasterMetadata> {
        let is_nc = path.extension().map_or(false, |e| e == "nc");
        let clipped = std::fs::read(path)? == b"clipped";

        Ok(RasterMetadata {
            crs: Some("EPSG:4326".to_string()),
            bounds: if clipped { self.clipped_bounds } else { self.bounds },
            width: 10,
            height: 10,
            bands_count: if is_nc { self.timestamps.len() } else { 1 },
            driver: if is_nc { RasterDriver::NetCdf } else { RasterDriver::GTiff },
            nodatavals: vec![None],
            data_variables: if is_nc { vec!["rain".to_string()] } else { vec![] },
            dimensions: if is_nc {
                vec!["time".to_string(), "lat".to_string(), "lon".to_string()]
            } else {
                vec![]
            },
            timestamps: if is_nc { self.timestamps.clone() } else { vec![] },
        })
    }

    fn convert_to_cog(
        &self,
        _metadata: &RasterMetadata,
        _src: &Path,
        out: &Path,
        band_index: Option<usize>,
        data_variable: Option<&str>,
    ) -> RasterResult<()> {
        self.converts.fetch_add(1, Ordering::SeqCst);
        let marker = format!("cog:{:?}:{}", band_index, data_variable.unwrap_or("-"));
        std::fs::write(out, marker)?;
        Ok(())
    }

    fn pixel_value(&self, _path: &Path, _x: f64, _y: f64) -> RasterResult<Option<f64>> {
        Ok(None)
    }

    fn valid_values(&self, _path: &Path) -> RasterResult<Vec<f64>> {
        Ok(vec![])
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    dir: TempDir,
    config: Arc<IngestConfig>,
    catalog: Arc<MemoryCatalog>,
    toolkit: Arc<FakeToolkit>,
    layer: RasterFileLayer,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(IngestConfig {
            media_root: dir.path().join("media"),
            auto_ingest_dir: dir.path().join("auto_ingest"),
            cache_dir: dir.path().join("cache"),
            ..IngestConfig::default()
        });

        let catalog = Arc::new(MemoryCatalog::new());
        let mut layer = RasterFileLayer::new(Uuid::new_v4(), Uuid::new_v4(), "Rainfall");
        layer.auto_ingest_from_directory = true;
        layer.auto_ingest_nc_data_variable = Some("rain".to_string());
        catalog.insert_layer(layer.clone()).await;

        Self {
            dir,
            config,
            catalog,
            toolkit: Arc::new(FakeToolkit::new()),
            layer,
        }
    }

    fn ingester(&self) -> Ingester {
        Ingester::new(self.config.clone(), self.catalog.clone(), self.toolkit.clone())
    }

    fn raw_file(&self, name: &str) -> PathBuf {
        let incoming = self.dir.path().join("incoming");
        std::fs::create_dir_all(&incoming).unwrap();
        let path = incoming.join(name);
        std::fs::write(&path, b"raw").unwrap();
        path
    }

    fn dropped_file(&self, directory: &str, name: &str) -> PathBuf {
        let dir = self.config.auto_ingest_dir.join(directory);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, b"raw").unwrap();
        path
    }

    fn media_path(&self, relative: &Path) -> PathBuf {
        self.config.media_root.join(relative)
    }

    async fn assert_no_uploads_left(&self) {
        assert_eq!(self.catalog.upload_count().await, 0);
        let uploads = self.config.media_root.join("raster_uploads");
        if uploads.exists() {
            assert_eq!(std::fs::read_dir(uploads).unwrap().count(), 0);
        }
    }
}

// ============================================================================
// GeoTIFF ingestion tests
// ============================================================================

#[tokio::test]
async fn test_geotiff_ingest_creates_record() {
    let h = Harness::new().await;
    let raw = h.raw_file(TIMESTAMPED);

    let report = h.ingester().ingest(&h.layer, &raw, false, false).await.unwrap();

    assert_eq!(report.created(), 1);
    let IngestOutcome::Created(file) = &report.outcomes[0] else {
        panic!("expected a created outcome");
    };
    assert_eq!(file.time, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(
        file.file_path,
        PathBuf::from(format!(
            "raster_files/RasterFileLayer-{}/2023-01-01T00:00:00+00:00.tif",
            h.layer.id
        ))
    );
    assert_eq!(std::fs::read_to_string(h.media_path(&file.file_path)).unwrap(), "cog:None:-");
    assert!(raw.exists(), "source file is left in place");
    h.assert_no_uploads_left().await;
}

#[tokio::test]
async fn test_reingest_without_overwrite_is_skipped() {
    let h = Harness::new().await;
    let ingester = h.ingester();
    let raw = h.raw_file(TIMESTAMPED);

    ingester.ingest(&h.layer, &raw, false, false).await.unwrap();
    let second = ingester.ingest(&h.layer, &raw, false, false).await.unwrap();

    assert_eq!(second.skipped(), 1);
    assert_eq!(h.catalog.raster_file_count().await, 1);
    assert_eq!(h.toolkit.converts.load(Ordering::SeqCst), 1);
    h.assert_no_uploads_left().await;
}

#[tokio::test]
async fn test_reingest_with_overwrite_replaces_record_and_file() {
    let h = Harness::new().await;
    let ingester = h.ingester();
    let raw = h.raw_file(TIMESTAMPED);

    let first = ingester.ingest(&h.layer, &raw, false, false).await.unwrap();
    let IngestOutcome::Created(old) = &first.outcomes[0] else {
        panic!("expected a created outcome");
    };

    let second = ingester.ingest(&h.layer, &raw, true, false).await.unwrap();
    let IngestOutcome::Replaced { previous, file } = &second.outcomes[0] else {
        panic!("expected a replaced outcome");
    };

    assert_eq!(*previous, old.id);
    assert_ne!(file.file_path, old.file_path);
    assert!(h.media_path(&file.file_path).exists());
    assert!(!h.media_path(&old.file_path).exists());
    assert_eq!(h.catalog.raster_file_count().await, 1);
}

#[tokio::test]
async fn test_aborted_replace_keeps_previous_file() {
    let h = Harness::new().await;
    let ingester = h.ingester();
    let raw = h.raw_file(TIMESTAMPED);

    let first = ingester.ingest(&h.layer, &raw, false, false).await.unwrap();
    let IngestOutcome::Created(old) = first.outcomes[0].clone() else {
        panic!("expected a created outcome");
    };

    h.catalog.fail_next_replace();
    let err = ingester.ingest(&h.layer, &raw, true, false).await.unwrap_err();
    assert!(matches!(err, IngestionError::Storage(_)));

    let kept = h.catalog.find_raster_file(h.layer.id, old.time).await.unwrap().unwrap();
    assert_eq!(kept.id, old.id);
    assert!(h.media_path(&old.file_path).exists());

    // Only the original COG remains in the layer folder
    let folder = h.config.media_root.join(h.layer.storage_folder());
    assert_eq!(std::fs::read_dir(folder).unwrap().count(), 1);
    h.assert_no_uploads_left().await;
}

#[tokio::test]
async fn test_geotiff_without_timestamp_is_rejected_before_staging() {
    let h = Harness::new().await;
    let ingester = with_boundary(&h, bbox::KENYA);
    let raw = h.raw_file("rainfall.tif");

    let err = ingester.ingest(&h.layer, &raw, false, true).await.unwrap_err();

    assert!(matches!(err, IngestionError::MissingTimestampInFilename(_)));
    assert_eq!(err.field(), Some("time"));
    assert_eq!(h.toolkit.clips.load(Ordering::SeqCst), 0);
    assert_eq!(h.toolkit.converts.load(Ordering::SeqCst), 0);
    assert_eq!(h.catalog.raster_file_count().await, 0);
    assert!(!h.config.media_root.join("raster_uploads").exists());
    h.assert_no_uploads_left().await;
}

#[tokio::test]
async fn test_concurrent_ingests_without_overwrite_skip_duplicate() {
    let h = Harness::new().await;
    let ingester = h.ingester();
    let raw = h.raw_file(TIMESTAMPED);

    let (a, b) = tokio::join!(
        ingester.ingest(&h.layer, &raw, false, false),
        ingester.ingest(&h.layer, &raw, false, false)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.created() + b.created(), 1);
    assert_eq!(a.skipped() + b.skipped(), 1);
    assert_eq!(h.catalog.raster_file_count().await, 1);

    let folder = h.config.media_root.join(h.layer.storage_folder());
    assert_eq!(std::fs::read_dir(folder).unwrap().count(), 1);
    h.assert_no_uploads_left().await;
}

#[tokio::test]
async fn test_concurrent_ingests_with_overwrite_keep_one_record() {
    let h = Harness::new().await;
    let ingester = h.ingester();
    let raw = h.raw_file(TIMESTAMPED);

    let (a, b) = tokio::join!(
        ingester.ingest(&h.layer, &raw, true, false),
        ingester.ingest(&h.layer, &raw, true, false)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.created() + b.created(), 1);
    assert_eq!(a.replaced() + b.replaced(), 1);

    let time = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let current = h.catalog.find_raster_file(h.layer.id, time).await.unwrap().unwrap();
    assert!(h.media_path(&current.file_path).exists());
    assert_eq!(h.catalog.raster_file_count().await, 1);

    // The replaced COG is gone, only the current one remains
    let folder = h.config.media_root.join(h.layer.storage_folder());
    assert_eq!(std::fs::read_dir(folder).unwrap().count(), 1);
    h.assert_no_uploads_left().await;
}

#[tokio::test]
async fn test_rejects_missing_file_and_bad_extension() {
    let h = Harness::new().await;
    let ingester = h.ingester();

    let missing = h.dir.path().join("nope_2023-01-01T00:00:00.000Z.tif");
    assert!(matches!(
        ingester.ingest(&h.layer, &missing, false, false).await.unwrap_err(),
        IngestionError::FileNotFound(_)
    ));

    let grib = h.raw_file("gfs.grib2");
    assert!(matches!(
        ingester.ingest(&h.layer, &grib, false, false).await.unwrap_err(),
        IngestionError::InvalidExtension(_)
    ));
    assert_eq!(h.toolkit.converts.load(Ordering::SeqCst), 0);
}

// ============================================================================
// NetCDF ingestion tests
// ============================================================================

#[tokio::test]
async fn test_netcdf_ingest_one_record_per_timestamp() {
    let h = Harness::new().await;
    let raw = h.raw_file("chirps.nc");

    let report = h.ingester().ingest(&h.layer, &raw, false, false).await.unwrap();
    assert_eq!(report.created(), 3);

    let files = h
        .catalog
        .list_raster_files(h.layer.id, TimeRange::default())
        .await
        .unwrap();
    assert_eq!(files.len(), 3);

    for (index, file) in files.iter().enumerate() {
        let name = file.file_name();
        assert!(name.starts_with("rain_2023-0"), "unexpected name {}", name);
        let marker = std::fs::read_to_string(h.media_path(&file.file_path)).unwrap();
        assert_eq!(marker, format!("cog:Some({}):rain", index));
    }
    h.assert_no_uploads_left().await;
}

#[tokio::test]
async fn test_netcdf_requires_data_variable() {
    let h = Harness::new().await;
    let mut layer = h.layer.clone();
    layer.auto_ingest_nc_data_variable = None;
    let raw = h.raw_file("chirps.nc");

    let err = h.ingester().ingest(&layer, &raw, false, false).await.unwrap_err();
    assert!(matches!(err, IngestionError::MissingDataVariable { .. }));

    layer.auto_ingest_nc_data_variable = Some("precip".to_string());
    let err = h.ingester().ingest(&layer, &raw, false, false).await.unwrap_err();
    assert!(matches!(err, IngestionError::DataVariableNotFound { ref variable, .. } if variable == "precip"));
    assert_eq!(err.field(), Some("data_variable"));
    h.assert_no_uploads_left().await;
}

// ============================================================================
// Boundary tests
// ============================================================================

fn with_boundary(h: &Harness, combined: BoundingBox) -> Ingester {
    let settings = BoundarySettings {
        combined_bounds: Some(combined),
        countries: vec![CountrySetting::new("KE").with_alpha3("KEN")],
    };
    let countries = InMemoryCountryBoundaries::new().with("KEN", rectangle(&bbox::KENYA));
    h.ingester()
        .with_boundaries(Arc::new(StaticBoundarySettings(settings)), Arc::new(countries))
}

#[tokio::test]
async fn test_disjoint_raster_is_rejected() {
    let h = Harness::new().await;
    let ingester = with_boundary(&h, bbox::ATLANTIC);
    let raw = h.raw_file(TIMESTAMPED);

    let err = ingester.ingest(&h.layer, &raw, false, true).await.unwrap_err();
    assert!(matches!(err, IngestionError::BoundaryDisjoint(_)));
    assert_eq!(h.toolkit.clips.load(Ordering::SeqCst), 0);
    h.assert_no_uploads_left().await;
}

#[tokio::test]
async fn test_intersecting_raster_is_clipped() {
    let h = Harness::new().await;
    let ingester = with_boundary(&h, bbox::KENYA);
    let raw = h.raw_file(TIMESTAMPED);

    let report = ingester.ingest(&h.layer, &raw, false, true).await.unwrap();
    assert_eq!(report.created(), 1);
    assert_eq!(h.toolkit.clips.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_contained_raster_is_ingested_unclipped() {
    let h = Harness::new().await;
    let ingester = with_boundary(&h, bbox::EAST_AFRICA);

    let report = ingester
        .ingest(&h.layer, &h.raw_file(TIMESTAMPED), false, true)
        .await
        .unwrap();
    assert_eq!(report.created(), 1);
    assert_eq!(h.toolkit.clips.load(Ordering::SeqCst), 0);

    let staged = ingester
        .stage_upload(&h.layer, &h.raw_file(TIMESTAMPED), true)
        .await
        .unwrap();
    assert_eq!(staged.metadata.bounds, h.toolkit.bounds);
    assert_eq!(std::fs::read(&staged.upload.file_path).unwrap(), b"raw");
    assert_eq!(h.toolkit.clips.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_clip_flag_off_ignores_boundary() {
    let h = Harness::new().await;
    let ingester = with_boundary(&h, bbox::ATLANTIC);
    let raw = h.raw_file(TIMESTAMPED);

    let report = ingester.ingest(&h.layer, &raw, false, false).await.unwrap();
    assert_eq!(report.created(), 1);
}

#[tokio::test]
async fn test_staged_metadata_reflects_clip() {
    let h = Harness::new().await;
    let ingester = with_boundary(&h, bbox::KENYA);
    let raw = h.raw_file(TIMESTAMPED);

    let staged = ingester.stage_upload(&h.layer, &raw, true).await.unwrap();
    assert_eq!(staged.metadata.bounds, h.toolkit.clipped_bounds);

    let stored = h.catalog.get_upload(staged.upload.id).await.unwrap().unwrap();
    assert_eq!(stored.metadata.unwrap().bounds, h.toolkit.clipped_bounds);
}

// ============================================================================
// Directory tests
// ============================================================================

#[tokio::test]
async fn test_directory_resolution() {
    let h = Harness::new().await;
    let ingester = h.ingester();

    let by_id = h.dropped_file(&h.layer.id.to_string(), TIMESTAMPED);
    assert_eq!(ingester.resolve_directory_layer(&by_id).await.unwrap().id, h.layer.id);

    let mut custom = RasterFileLayer::new(Uuid::new_v4(), Uuid::new_v4(), "NDVI");
    custom.auto_ingest_from_directory = true;
    custom.auto_ingest_custom_directory_name = Some("ndvi".to_string());
    h.catalog.insert_layer(custom.clone()).await;
    let by_name = h.dropped_file("ndvi", TIMESTAMPED);
    assert_eq!(ingester.resolve_directory_layer(&by_name).await.unwrap().id, custom.id);

    let unknown_id = h.dropped_file(&Uuid::new_v4().to_string(), TIMESTAMPED);
    assert!(matches!(
        ingester.resolve_directory_layer(&unknown_id).await.unwrap_err(),
        IngestionError::LayerNotFound(_)
    ));

    let stray = h.dropped_file("misc", TIMESTAMPED);
    assert!(matches!(
        ingester.resolve_directory_layer(&stray).await.unwrap_err(),
        IngestionError::InvalidLayerDirectory(_)
    ));
}

#[tokio::test]
async fn test_watch_events() {
    let h = Harness::new().await;
    let ingester = h.ingester();
    let dir = h.layer.id.to_string();
    let created = h.dropped_file(&dir, TIMESTAMPED);
    let moved = h.dropped_file(&dir, "rainfall_2023-02-01T00:00:00.000Z.tif");

    let ignored = ingester
        .handle_event(&WatchEvent::Other("deleted".into()), &created, None, false, false)
        .await
        .unwrap();
    assert!(ignored.is_none());

    let report = ingester
        .handle_event(&WatchEvent::Created, &created, None, false, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.created(), 1);

    let report = ingester
        .handle_event(&WatchEvent::Moved, Path::new("/elsewhere/tmp.part"), Some(&moved), false, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.outcomes[0].time(), Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap());
}

#[tokio::test]
async fn test_process_directory_continues_after_failures() {
    let h = Harness::new().await;
    let dir = h.layer.id.to_string();
    h.dropped_file(&dir, TIMESTAMPED);
    h.dropped_file(&dir, "undated.tif");
    h.dropped_file(&dir, "readme.txt");

    let scan = h
        .ingester()
        .process_directory(h.layer.id, false, false)
        .await
        .unwrap();

    assert_eq!(scan.reports.len(), 1);
    assert_eq!(scan.failures.len(), 1);
    assert!(scan.failures[0].0.ends_with("undated.tif"));
    assert_eq!(h.catalog.raster_file_count().await, 1);
}

// ============================================================================
// Interactive upload tests
// ============================================================================

#[tokio::test]
async fn test_publish_selected_netcdf_timestamps() {
    let h = Harness::new().await;
    let ingester = h.ingester();
    let raw = h.raw_file("chirps.nc");

    let staged = ingester.stage_upload(&h.layer, &raw, false).await.unwrap();
    assert_eq!(staged.metadata.timestamps.len(), 3);
    assert_eq!(h.catalog.upload_count().await, 1);

    let selection = PublishSelection::NetCdf {
        data_variable: "rain".to_string(),
        timestamps: vec![TimestampSelection {
            time: Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap(),
            band_index: 1,
        }],
    };
    let report = ingester
        .publish_upload(staged.upload.id, &h.layer, &selection, false)
        .await
        .unwrap();

    assert_eq!(report.created(), 1);
    assert_eq!(h.catalog.raster_file_count().await, 1);
    h.assert_no_uploads_left().await;
}

#[tokio::test]
async fn test_publish_existing_time_reports_field_error() {
    let h = Harness::new().await;
    let ingester = h.ingester();
    ingester
        .ingest(&h.layer, &h.raw_file("chirps.nc"), false, false)
        .await
        .unwrap();

    let staged = ingester
        .stage_upload(&h.layer, &h.raw_file("chirps.nc"), false)
        .await
        .unwrap();
    let selection = PublishSelection::NetCdf {
        data_variable: "rain".to_string(),
        timestamps: vec![TimestampSelection {
            time: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            band_index: 0,
        }],
    };

    let err = ingester
        .publish_upload(staged.upload.id, &h.layer, &selection, false)
        .await
        .unwrap_err();

    assert_eq!(err.field(), Some("nc_dates"));
    assert_eq!(
        err.to_string(),
        "File with date 2023-01-01T00:00:00.000Z already exists for layer Rainfall"
    );
    assert_eq!(h.toolkit.converts.load(Ordering::SeqCst), 3);
    h.assert_no_uploads_left().await;
}

#[tokio::test]
async fn test_publish_geotiff_with_explicit_time() {
    let h = Harness::new().await;
    let ingester = h.ingester();
    let staged = ingester
        .stage_upload(&h.layer, &h.raw_file("scene.tif"), false)
        .await
        .unwrap();

    let time = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let report = ingester
        .publish_upload(staged.upload.id, &h.layer, &PublishSelection::GeoTiff { time }, false)
        .await
        .unwrap();
    assert_eq!(report.outcomes[0].time(), time);
}

#[tokio::test]
async fn test_publish_rejects_selection_for_other_format() {
    let h = Harness::new().await;
    let ingester = h.ingester();
    let staged = ingester
        .stage_upload(&h.layer, &h.raw_file("chirps.nc"), false)
        .await
        .unwrap();

    let time = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let err = ingester
        .publish_upload(staged.upload.id, &h.layer, &PublishSelection::GeoTiff { time }, false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestionError::SelectionMismatch {
            driver: RasterDriver::NetCdf,
            ..
        }
    ));
    assert_eq!(err.field(), Some("file"));
    assert_eq!(h.toolkit.converts.load(Ordering::SeqCst), 0);
    assert_eq!(h.catalog.raster_file_count().await, 0);
    h.assert_no_uploads_left().await;
}

#[tokio::test]
async fn test_publish_rejects_layer_from_other_dataset() {
    let h = Harness::new().await;
    let ingester = h.ingester();
    let staged = ingester
        .stage_upload(&h.layer, &h.raw_file("scene.tif"), false)
        .await
        .unwrap();

    let other = RasterFileLayer::new(Uuid::new_v4(), Uuid::new_v4(), "NDVI");
    h.catalog.insert_layer(other.clone()).await;

    let time = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let err = ingester
        .publish_upload(staged.upload.id, &other, &PublishSelection::GeoTiff { time }, false)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestionError::UploadLayerMismatch { .. }));
    assert_eq!(err.field(), Some("layer"));
    assert_eq!(h.toolkit.converts.load(Ordering::SeqCst), 0);
    h.assert_no_uploads_left().await;
}

#[tokio::test]
async fn test_discard_upload() {
    let h = Harness::new().await;
    let ingester = h.ingester();
    let staged = ingester
        .stage_upload(&h.layer, &h.raw_file("scene.tif"), false)
        .await
        .unwrap();

    ingester.discard_upload(staged.upload.id).await.unwrap();
    h.assert_no_uploads_left().await;
    assert!(matches!(
        ingester
            .publish_upload(staged.upload.id, &h.layer, &PublishSelection::GeoTiff { time: Utc::now() }, false)
            .await
            .unwrap_err(),
        IngestionError::UploadNotFound(_)
    ));
}

// ============================================================================
// GDAL pipeline test
// ============================================================================

#[tokio::test]
async fn test_gdal_geotiff_pipeline() {
    let h = Harness::new().await;
    let raw = h.dir.path().join(TIMESTAMPED);
    write_geotiff(&raw, &GeoTiffSpec::single_band(grid::SIMPLE_10X10).with_nodata(-9999.0)).unwrap();

    let ingester = Ingester::new(h.config.clone(), h.catalog.clone(), Arc::new(GdalToolkit::default()));
    let report = ingester.ingest(&h.layer, &raw, false, false).await.unwrap();

    let IngestOutcome::Created(file) = &report.outcomes[0] else {
        panic!("expected a created outcome");
    };
    let metadata = file.metadata.as_ref().unwrap();
    assert_eq!(metadata.driver, RasterDriver::GTiff);
    assert_eq!((metadata.width, metadata.height), (10, 10));
    assert_eq!(metadata.crs.as_deref(), Some("EPSG:4326"));
    h.assert_no_uploads_left().await;
}
