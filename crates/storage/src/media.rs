//! Managed file storage for uploads and published rasters.
//!
//! Layout under the media root:
//!
//! ```text
//! raster_uploads/<upload_id>/<original name>
//! raster_files/RasterFileLayer-<layer_id>/<time>.tif
//! tmp/<uuid>.<ext>
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use geomanager_common::RasterFileLayer;

use crate::error::{Result, StorageError};

const UPLOADS_DIR: &str = "raster_uploads";
const TMP_DIR: &str = "tmp";

/// Local media storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Relative roots are anchored at the current directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&root))
                .unwrap_or(root)
        };
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a stored file. Absolute inputs are returned as is.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Copy a raw file into the uploads area, keeping its file name.
    pub async fn store_upload(&self, upload_id: Uuid, source: &Path) -> Result<PathBuf> {
        let name = source.file_name().ok_or_else(|| {
            StorageError::NotFound(format!("no file name in {}", source.display()))
        })?;

        let dir = self.root.join(UPLOADS_DIR).join(upload_id.to_string());
        fs::create_dir_all(&dir).await?;

        let dest = dir.join(name);
        fs::copy(source, &dest).await?;

        debug!(upload_id = %upload_id, path = %dest.display(), "Stored upload");
        Ok(dest)
    }

    /// Reserve an unused relative path for a published file of `layer`.
    ///
    /// When `file_name` is taken a random suffix is added before the
    /// extension, so an existing published file is never overwritten. The
    /// name is claimed by creating an empty file, which
    /// [`publish`](MediaStore::publish) then replaces.
    pub async fn publish_path(&self, layer: &RasterFileLayer, file_name: &str) -> Result<PathBuf> {
        let folder = PathBuf::from(layer.storage_folder());
        fs::create_dir_all(self.root.join(&folder)).await?;

        let mut candidate = folder.join(file_name);
        loop {
            let reserved = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&candidate))
                .await;
            match reserved {
                Ok(_) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = folder.join(with_suffix(file_name, &random_suffix()));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Move a finished file to a relative path under the root.
    pub async fn publish(&self, source: &Path, relative: &Path) -> Result<PathBuf> {
        let dest = self.resolve(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        if fs::rename(source, &dest).await.is_err() {
            // Different filesystem
            fs::copy(source, &dest).await?;
            self.delete(source).await;
        }
        Ok(dest)
    }

    /// Fresh path for intermediate output. Nothing is created at it.
    ///
    /// `extension` may be given with or without its leading dot.
    pub async fn temp_path(&self, extension: &str) -> Result<PathBuf> {
        let dir = self.root.join(TMP_DIR);
        fs::create_dir_all(&dir).await?;
        Ok(dir.join(format!(
            "{}.{}",
            Uuid::new_v4().simple(),
            extension.trim_start_matches('.')
        )))
    }

    /// Remove a file, ignoring files that are already gone.
    pub async fn delete(&self, path: &Path) {
        let path = self.resolve(path);
        match fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Deleted file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete file"),
        }
    }

    /// Remove an upload's file together with its directory.
    pub async fn delete_upload(&self, path: &Path) {
        self.delete(path).await;
        if let Some(dir) = self.resolve(path).parent() {
            if dir.parent().map_or(false, |p| p.ends_with(UPLOADS_DIR)) {
                let _ = fs::remove_dir(dir).await;
            }
        }
    }
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..7].to_string()
}

fn with_suffix(file_name: &str, suffix: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, suffix, ext),
        _ => format!("{}_{}", file_name, suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_suffix() {
        assert_eq!(with_suffix("2023-01-01.tif", "abc1234"), "2023-01-01_abc1234.tif");
        assert_eq!(with_suffix("noext", "abc1234"), "noext_abc1234");
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let store = MediaStore::new("/media");
        assert_eq!(store.resolve(Path::new("a/b.tif")), PathBuf::from("/media/a/b.tif"));
        assert_eq!(store.resolve(Path::new("/x/b.tif")), PathBuf::from("/x/b.tif"));
    }
}
