//! Raster catalog using PostgreSQL.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo_types::MultiPolygon;
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use geomanager_common::{
    multipolygon_from_geojson, DateFormat, Geostore, LayerRasterFile, NewLayerRasterFile,
    RasterFileLayer, RasterMetadata, RasterStyle, RasterUpload,
};

use crate::boundary::CountryBoundaryRepository;
use crate::catalog::{RasterCatalog, Replacement, TimeRange};
use crate::error::{Result, StorageError};

/// Database connection pool and catalog operations.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Connect to the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables if they are missing.
    pub async fn migrate(&self) -> Result<()> {
        // Split SQL statements and execute them individually
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(&self.pool).await?;
            }
        }

        info!("Catalog schema ready");
        Ok(())
    }

    async fn insert_raster_file<'e, E>(executor: E, file: NewLayerRasterFile) -> Result<LayerRasterFile>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let record = file.into_record(Uuid::new_v4());

        sqlx::query(
            r#"
            INSERT INTO layer_raster_files (id, layer_id, time, file_path, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.layer_id)
        .bind(record.time)
        .bind(record.file_path.to_string_lossy().into_owned())
        .bind(record.metadata.clone().map(Json))
        .bind(record.created_at)
        .execute(executor)
        .await
        .map_err(|e| conflict_or_database(e, &record))?;

        Ok(record)
    }
}

fn conflict_or_database(error: sqlx::Error, record: &LayerRasterFile) -> StorageError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict(format!(
            "raster file for layer {} at {} already exists",
            record.layer_id, record.time
        )),
        _ => StorageError::Database(error),
    }
}

#[async_trait]
impl RasterCatalog for PgCatalog {
    async fn get_layer(&self, id: Uuid) -> Result<Option<RasterFileLayer>> {
        let row = sqlx::query_as::<_, LayerRow>(&format!("{} WHERE id = $1", LAYER_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn find_layer_by_directory(&self, name: &str) -> Result<Option<RasterFileLayer>> {
        let row = match Uuid::parse_str(name) {
            Ok(id) => {
                sqlx::query_as::<_, LayerRow>(&format!("{} WHERE id = $1", LAYER_SELECT))
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            Err(_) => {
                sqlx::query_as::<_, LayerRow>(&format!(
                    "{} WHERE auto_ingest_from_directory \
                     AND TRIM(auto_ingest_custom_directory_name) = $1 LIMIT 1",
                    LAYER_SELECT
                ))
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(row.map(Into::into))
    }

    async fn find_raster_file(
        &self,
        layer_id: Uuid,
        time: DateTime<Utc>,
    ) -> Result<Option<LayerRasterFile>> {
        let row = sqlx::query_as::<_, RasterFileRow>(&format!(
            "{} WHERE layer_id = $1 AND time = $2",
            RASTER_FILE_SELECT
        ))
        .bind(layer_id)
        .bind(time)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn get_raster_file(&self, id: Uuid) -> Result<Option<LayerRasterFile>> {
        let row = sqlx::query_as::<_, RasterFileRow>(&format!("{} WHERE id = $1", RASTER_FILE_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn list_raster_files(&self, layer_id: Uuid, range: TimeRange) -> Result<Vec<LayerRasterFile>> {
        let rows = sqlx::query_as::<_, RasterFileRow>(&format!(
            "{} WHERE layer_id = $1 \
             AND ($2::timestamptz IS NULL OR time >= $2) \
             AND ($3::timestamptz IS NULL OR time <= $3) \
             ORDER BY time ASC",
            RASTER_FILE_SELECT
        ))
        .bind(layer_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_raster_file(&self, file: NewLayerRasterFile) -> Result<LayerRasterFile> {
        Self::insert_raster_file(&self.pool, file).await
    }

    async fn replace_raster_file(&self, file: NewLayerRasterFile) -> Result<Replacement> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_as::<_, RasterFileRow>(
            "DELETE FROM layer_raster_files WHERE layer_id = $1 AND time = $2 \
             RETURNING id, layer_id, time, file_path, metadata, created_at",
        )
        .bind(file.layer_id)
        .bind(file.time)
        .fetch_optional(&mut *tx)
        .await?
        .map(LayerRasterFile::from);

        let record = Self::insert_raster_file(&mut *tx, file).await?;
        tx.commit().await?;

        debug!(old = ?previous.as_ref().map(|f| f.id), new = %record.id, "Replaced raster file");
        Ok(Replacement {
            previous,
            file: record,
        })
    }

    async fn get_style(&self, id: i64) -> Result<Option<RasterStyle>> {
        let row = sqlx::query_as::<_, StyleRow>("SELECT id, definition FROM raster_styles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| {
            let mut style = r.definition.0;
            style.id = r.id;
            style
        }))
    }

    async fn get_geostore(&self, id: Uuid) -> Result<Option<Geostore>> {
        let row = sqlx::query_as::<_, GeostoreRow>("SELECT id, geojson FROM geostores WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(Geostore::from_geojson(r.id, &r.geojson)?)),
            None => Ok(None),
        }
    }

    async fn create_upload(&self, upload: &RasterUpload) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO raster_uploads (id, dataset_id, file_path, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(upload.id)
        .bind(upload.dataset_id)
        .bind(upload.file_path.to_string_lossy().into_owned())
        .bind(upload.metadata.clone().map(Json))
        .bind(upload.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_upload_metadata(&self, id: Uuid, metadata: &RasterMetadata) -> Result<()> {
        let result = sqlx::query("UPDATE raster_uploads SET metadata = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(metadata))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("upload {}", id)));
        }
        Ok(())
    }

    async fn get_upload(&self, id: Uuid) -> Result<Option<RasterUpload>> {
        let row = sqlx::query_as::<_, UploadRow>(
            "SELECT id, dataset_id, file_path, metadata, created_at FROM raster_uploads WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn delete_upload(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM raster_uploads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CountryBoundaryRepository for PgCatalog {
    async fn country_geometry(&self, code: &str) -> Result<Option<MultiPolygon<f64>>> {
        let geojson = sqlx::query_scalar::<_, String>(
            "SELECT geojson FROM country_boundaries \
             WHERE UPPER(iso_a2) = UPPER($1) OR UPPER(iso_a3) = UPPER($1) LIMIT 1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        match geojson {
            Some(text) => Ok(Some(multipolygon_from_geojson(&text)?)),
            None => Ok(None),
        }
    }
}

const LAYER_SELECT: &str = "SELECT id, dataset_id, title, style_id, auto_ingest_from_directory, \
     auto_ingest_nc_data_variable, auto_ingest_custom_directory_name, date_format \
     FROM raster_file_layers";

const RASTER_FILE_SELECT: &str =
    "SELECT id, layer_id, time, file_path, metadata, created_at FROM layer_raster_files";

#[derive(FromRow)]
struct LayerRow {
    id: Uuid,
    dataset_id: Uuid,
    title: String,
    style_id: Option<i64>,
    auto_ingest_from_directory: bool,
    auto_ingest_nc_data_variable: Option<String>,
    auto_ingest_custom_directory_name: Option<String>,
    date_format: String,
}

impl From<LayerRow> for RasterFileLayer {
    fn from(row: LayerRow) -> Self {
        Self {
            id: row.id,
            dataset_id: row.dataset_id,
            title: row.title,
            style_id: row.style_id,
            auto_ingest_from_directory: row.auto_ingest_from_directory,
            auto_ingest_nc_data_variable: row.auto_ingest_nc_data_variable,
            auto_ingest_custom_directory_name: row.auto_ingest_custom_directory_name,
            date_format: DateFormat::from_choice(&row.date_format),
        }
    }
}

#[derive(FromRow)]
struct RasterFileRow {
    id: Uuid,
    layer_id: Uuid,
    time: DateTime<Utc>,
    file_path: String,
    metadata: Option<Json<RasterMetadata>>,
    created_at: DateTime<Utc>,
}

impl From<RasterFileRow> for LayerRasterFile {
    fn from(row: RasterFileRow) -> Self {
        Self {
            id: row.id,
            layer_id: row.layer_id,
            time: row.time,
            file_path: PathBuf::from(row.file_path),
            metadata: row.metadata.map(|m| m.0),
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct UploadRow {
    id: Uuid,
    dataset_id: Uuid,
    file_path: String,
    metadata: Option<Json<RasterMetadata>>,
    created_at: DateTime<Utc>,
}

impl From<UploadRow> for RasterUpload {
    fn from(row: UploadRow) -> Self {
        Self {
            id: row.id,
            dataset_id: row.dataset_id,
            file_path: PathBuf::from(row.file_path),
            metadata: row.metadata.map(|m| m.0),
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct StyleRow {
    id: i64,
    definition: Json<RasterStyle>,
}

#[derive(FromRow)]
struct GeostoreRow {
    id: Uuid,
    geojson: String,
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS raster_file_layers (
    id UUID PRIMARY KEY,
    dataset_id UUID NOT NULL,
    title VARCHAR(255) NOT NULL,
    style_id BIGINT,
    auto_ingest_from_directory BOOLEAN NOT NULL DEFAULT FALSE,
    auto_ingest_nc_data_variable VARCHAR(100),
    auto_ingest_custom_directory_name VARCHAR(255),
    date_format VARCHAR(50) NOT NULL DEFAULT 'yyyy-MM-dd HH:mm'
);

CREATE TABLE IF NOT EXISTS layer_raster_files (
    id UUID PRIMARY KEY,
    layer_id UUID NOT NULL REFERENCES raster_file_layers(id) ON DELETE CASCADE,
    time TIMESTAMPTZ NOT NULL,
    file_path TEXT NOT NULL,
    metadata JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE(layer_id, time)
);

CREATE INDEX IF NOT EXISTS idx_layer_raster_files_layer_time ON layer_raster_files(layer_id, time);

CREATE TABLE IF NOT EXISTS raster_styles (
    id BIGSERIAL PRIMARY KEY,
    definition JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS geostores (
    id UUID PRIMARY KEY,
    geojson TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS raster_uploads (
    id UUID PRIMARY KEY,
    dataset_id UUID NOT NULL,
    file_path TEXT NOT NULL,
    metadata JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS country_boundaries (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    iso_a2 VARCHAR(2),
    iso_a3 VARCHAR(3),
    geojson TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_country_boundaries_a2 ON country_boundaries(iso_a2);
CREATE INDEX IF NOT EXISTS idx_country_boundaries_a3 ON country_boundaries(iso_a3)
"#;
