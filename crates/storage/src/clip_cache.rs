//! On-disk cache of published rasters clipped to geostores.
//!
//! Each (geostore, raster file) pair owns one directory:
//!
//! ```text
//! {cache_dir}/LayerRasterFile-{geostore_hex}-{file_id}/{basename}
//! ```
//!
//! Population is serialized per destination path and the clip is written
//! to a temporary file in the same directory, then renamed into place.
//! Readers see either no file or a complete one.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use metrics::counter;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use geomanager_common::{Geostore, LayerRasterFile, RasterDriver, LAYER_RASTER_FILE_TYPE};
use raster_io::RasterClip;

use crate::error::{Result, StorageError};

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Bounded cache of clipped rasters.
pub struct GeostoreClipCache {
    cache_dir: PathBuf,
    clipper: Arc<dyn RasterClip>,
    /// Entry directories in recency order
    entries: Mutex<LruCache<PathBuf, ()>>,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    stats: Mutex<CacheStats>,
    capacity: usize,
}

impl GeostoreClipCache {
    /// Create a cache holding at most `capacity` clipped files.
    ///
    /// Entry directories already under `cache_dir` are adopted oldest
    /// first, and the oldest are removed when they exceed `capacity`.
    pub fn new(cache_dir: impl Into<PathBuf>, clipper: Arc<dyn RasterClip>, capacity: usize) -> Self {
        let cache_dir = cache_dir.into();
        let cache_size = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        let mut entries = LruCache::new(cache_size);
        let mut stats = CacheStats::default();
        for dir in existing_entries(&cache_dir) {
            if let Some((old, _)) = entries.push(dir, ()) {
                stats.evictions += 1;
                match std::fs::remove_dir_all(&old) {
                    Ok(()) => debug!(path = %old.display(), "Evicted stale clipped raster"),
                    Err(e) => warn!(path = %old.display(), error = %e, "Failed to evict clipped raster"),
                }
            }
        }
        if !entries.is_empty() {
            info!(dir = %cache_dir.display(), entries = entries.len(), "Adopted existing clip cache entries");
        }

        Self {
            cache_dir,
            clipper,
            entries: Mutex::new(entries),
            locks: Mutex::new(HashMap::new()),
            stats: Mutex::new(stats),
            capacity: cache_size.get(),
        }
    }

    /// Cache location for a raster file clipped to a geostore.
    pub fn cache_path(&self, file: &LayerRasterFile, geostore: &Geostore) -> PathBuf {
        self.entry_dir(file.id, geostore).join(file.file_name())
    }

    fn entry_dir(&self, file_id: Uuid, geostore: &Geostore) -> PathBuf {
        self.cache_dir.join(format!(
            "{}-{}-{}",
            LAYER_RASTER_FILE_TYPE,
            geostore.id_hex(),
            file_id
        ))
    }

    /// Local path of `file` clipped to `geostore`, clipping on first use.
    ///
    /// `source` is the absolute path of the published raster.
    pub async fn resolve_local_path(
        &self,
        file: &LayerRasterFile,
        source: &Path,
        geostore: &Geostore,
    ) -> Result<PathBuf> {
        let dest = self.cache_path(file, geostore);
        let dir = self.entry_dir(file.id, geostore);

        if fs::try_exists(&dest).await? {
            self.record_hit(&dir).await;
            return Ok(dest);
        }

        let lock = self.lock_for(&dest).await;
        let _guard = lock.lock().await;

        // Another task may have finished while we waited
        if fs::try_exists(&dest).await? {
            self.record_hit(&dir).await;
            return Ok(dest);
        }

        self.record_miss().await;
        fs::create_dir_all(&dir).await?;

        let tmp = dir.join(format!(".{}-{}", Uuid::new_v4().simple(), file.file_name()));
        let clipper = Arc::clone(&self.clipper);
        let driver = driver_for_path(source);
        let src = source.to_path_buf();
        let geometry = geostore.geometry.clone();
        let tmp_out = tmp.clone();

        let clipped = tokio::task::spawn_blocking(move || clipper.clip(&src, driver, &geometry, &tmp_out))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?;

        if let Err(e) = clipped {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        fs::rename(&tmp, &dest).await?;

        debug!(path = %dest.display(), geostore = %geostore.id, "Clipped raster cached");
        self.insert_entry(dir).await;
        Ok(dest)
    }

    async fn lock_for(&self, dest: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(dest.to_path_buf()).or_default())
    }

    async fn record_hit(&self, dir: &Path) {
        counter!("geomanager_clip_cache_hits_total").increment(1);
        self.stats.lock().await.hits += 1;

        let known = self.entries.lock().await.get(dir).is_some();
        if !known {
            // Left over from an earlier process
            self.insert_entry(dir.to_path_buf()).await;
        }
    }

    async fn record_miss(&self) {
        counter!("geomanager_clip_cache_misses_total").increment(1);
        self.stats.lock().await.misses += 1;
    }

    async fn insert_entry(&self, dir: PathBuf) {
        let evicted = self.entries.lock().await.push(dir.clone(), ());

        if let Some((old, _)) = evicted {
            if old != dir {
                self.stats.lock().await.evictions += 1;
                self.locks.lock().await.retain(|path, _| !path.starts_with(&old));

                match fs::remove_dir_all(&old).await {
                    Ok(()) => info!(path = %old.display(), "Evicted clipped raster"),
                    Err(e) => warn!(path = %old.display(), error = %e, "Failed to evict clipped raster"),
                }
            }
        }
    }

    /// Current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.stats.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Entry directories under `cache_dir`, least recently modified first.
fn existing_entries(cache_dir: &Path) -> Vec<PathBuf> {
    let read = match std::fs::read_dir(cache_dir) {
        Ok(read) => read,
        Err(_) => return Vec::new(),
    };

    let prefix = format!("{}-", LAYER_RASTER_FILE_TYPE);
    let mut found: Vec<(std::time::SystemTime, PathBuf)> = read
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_dir() {
                return None;
            }
            let modified = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
            Some((modified, entry.path()))
        })
        .collect();

    found.sort();
    found.into_iter().map(|(_, path)| path).collect()
}

fn driver_for_path(path: &Path) -> RasterDriver {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("nc") => RasterDriver::NetCdf,
        _ => RasterDriver::GTiff,
    }
}
