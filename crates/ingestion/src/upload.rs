//! Two-step interactive upload: stage and inspect, then publish a
//! selection of timestamps.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use geomanager_common::{
    tile_timestamp, RasterDriver, RasterFileLayer, RasterMetadata, RasterUpload,
};
use raster_io::RasterError;

use crate::error::{IngestionError, Result};
use crate::ingester::{check_data_variable, IngestReport, Ingester, PublishTarget, UploadGuard};
use crate::metadata::validate_raw_file;

/// An upload waiting for the user to pick what to publish.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub upload: RasterUpload,
    pub metadata: RasterMetadata,
}

/// One NetCDF timestamp chosen for publishing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimestampSelection {
    pub time: DateTime<Utc>,
    /// 0-based index along the time axis.
    pub band_index: usize,
}

/// What to publish from a staged upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishSelection {
    GeoTiff {
        time: DateTime<Utc>,
    },
    NetCdf {
        data_variable: String,
        timestamps: Vec<TimestampSelection>,
    },
}

impl PublishSelection {
    fn kind(&self) -> &'static str {
        match self {
            Self::GeoTiff { .. } => "GeoTIFF",
            Self::NetCdf { .. } => "NetCDF",
        }
    }
}

impl Ingester {
    /// Copy and inspect a file for `layer`, keeping the upload for
    /// [`publish_upload`](Ingester::publish_upload).
    pub async fn stage_upload(
        &self,
        layer: &RasterFileLayer,
        raw_file: &Path,
        clip_to_boundary: bool,
    ) -> Result<StagedUpload> {
        validate_raw_file(raw_file)?;

        let (guard, upload, metadata) = self.stage(layer.dataset_id, raw_file, clip_to_boundary).await?;
        guard.keep();

        info!(upload_id = %upload.id, layer_id = %layer.id, driver = %metadata.driver, "Upload staged");
        Ok(StagedUpload { upload, metadata })
    }

    /// Publish selected timestamps of a staged upload into `layer`.
    ///
    /// All selected times are checked before anything is published. The
    /// upload is deleted whatever the result.
    pub async fn publish_upload(
        &self,
        upload_id: Uuid,
        layer: &RasterFileLayer,
        selection: &PublishSelection,
        overwrite: bool,
    ) -> Result<IngestReport> {
        let upload = self
            .catalog
            .get_upload(upload_id)
            .await?
            .ok_or_else(|| IngestionError::UploadNotFound(upload_id.to_string()))?;
        let guard = UploadGuard::new(self.catalog.clone(), self.media.clone(), &upload);

        let result = self.publish_selection(&upload, layer, selection, overwrite).await;
        guard.release().await;

        Ok(IngestReport {
            layer_id: layer.id,
            source: upload.file_path.clone(),
            outcomes: result?,
        })
    }

    /// Drop a staged upload without publishing it.
    pub async fn discard_upload(&self, upload_id: Uuid) -> Result<()> {
        if let Some(upload) = self.catalog.get_upload(upload_id).await? {
            UploadGuard::new(self.catalog.clone(), self.media.clone(), &upload)
                .release()
                .await;
        }
        Ok(())
    }

    async fn publish_selection(
        &self,
        upload: &RasterUpload,
        layer: &RasterFileLayer,
        selection: &PublishSelection,
        overwrite: bool,
    ) -> Result<Vec<crate::IngestOutcome>> {
        if upload.dataset_id != layer.dataset_id {
            return Err(IngestionError::UploadLayerMismatch {
                upload: upload.id.to_string(),
                layer: layer.title.clone(),
            });
        }

        let metadata = match &upload.metadata {
            Some(m) => m.clone(),
            None => self.read_info(&upload.file_path).await?,
        };

        let expected = match selection {
            PublishSelection::GeoTiff { .. } => RasterDriver::GTiff,
            PublishSelection::NetCdf { .. } => RasterDriver::NetCdf,
        };
        if metadata.driver != expected {
            return Err(IngestionError::SelectionMismatch {
                selection: selection.kind(),
                driver: metadata.driver,
            });
        }

        let (targets, field) = match selection {
            PublishSelection::GeoTiff { time } => (
                vec![PublishTarget {
                    time: *time,
                    band_index: None,
                    data_variable: None,
                }],
                "time",
            ),
            PublishSelection::NetCdf {
                data_variable,
                timestamps,
            } => {
                let variable = data_variable.trim();
                if variable.is_empty() {
                    return Err(IngestionError::MissingDataVariable {
                        layer: layer.title.clone(),
                    });
                }
                check_data_variable(&metadata, variable, &upload.file_path)?;
                if timestamps.is_empty() {
                    return Err(IngestionError::MissingTimestamps(upload.file_path.clone()));
                }

                let count = metadata.timestamps.len();
                let mut targets = Vec::with_capacity(timestamps.len());
                for ts in timestamps {
                    if ts.band_index >= count {
                        return Err(RasterError::BandOutOfRange {
                            index: ts.band_index,
                            count,
                        }
                        .into());
                    }
                    targets.push(PublishTarget {
                        time: ts.time,
                        band_index: Some(ts.band_index),
                        data_variable: Some(variable),
                    });
                }
                (targets, "nc_dates")
            }
        };

        if !overwrite {
            for target in &targets {
                if self.catalog.find_raster_file(layer.id, target.time).await?.is_some() {
                    return Err(IngestionError::TimeExists {
                        time: tile_timestamp(&target.time),
                        layer: layer.title.clone(),
                        field,
                    });
                }
            }
        }

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            outcomes.push(self.publish_time(layer, upload, &metadata, target, overwrite).await?);
        }
        Ok(outcomes)
    }
}
