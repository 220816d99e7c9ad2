use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Error as SqlxError;
use std::time::Duration;
use tracing::{error, info};

use super::store::{BatchStore, SnapshotSource, StoreError};
use crate::models::{Batch, BatchStatus, BatchUpdate, ImportSummary, NewBatch};

const CREATE_BATCHES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS batches (
        id BIGSERIAL PRIMARY KEY,
        batch_number TEXT NOT NULL UNIQUE,
        article_number TEXT NOT NULL,
        description TEXT NOT NULL,
        location TEXT,
        total_weight BIGINT NOT NULL,
        inventored_weight BIGINT,
        status TEXT NOT NULL DEFAULT 'not_started',
        updated_at TIMESTAMPTZ,
        user_id BIGINT,
        user_name TEXT
    )
"#;

const BATCH_COLUMNS: &str = "id, batch_number, article_number, description, location, total_weight, \
     inventored_weight, status, updated_at, user_id, user_name";

/// Batch row as stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
struct BatchRow {
    id: i64,
    batch_number: String,
    article_number: String,
    description: String,
    location: Option<String>,
    total_weight: i64,
    inventored_weight: Option<i64>,
    status: String,
    updated_at: Option<DateTime<Utc>>,
    user_id: Option<i64>,
    user_name: Option<String>,
}

impl TryFrom<BatchRow> for Batch {
    type Error = StoreError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<BatchStatus>()
            .map_err(|reason| StoreError::InvalidStatus { id: row.id, reason })?;
        Ok(Batch {
            id: row.id,
            batch_number: row.batch_number,
            article_number: row.article_number,
            description: row.description,
            location: row.location,
            total_weight: row.total_weight,
            inventored_weight: row.inventored_weight,
            status,
            updated_at: row.updated_at,
            user_id: row.user_id,
            user_name: row.user_name,
        })
    }
}

fn conflict_or_db(e: SqlxError, batch_number: &str) -> StoreError {
    match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict(format!("Batch number '{}' already exists", batch_number))
        }
        _ => StoreError::Database(e),
    }
}

fn updated_row(id: i64, result: Result<Option<BatchRow>, SqlxError>) -> Result<Batch, StoreError> {
    match result {
        Ok(Some(row)) => Batch::try_from(row),
        Ok(None) => Err(StoreError::NotFound(id)),
        Err(e) => {
            error!("Failed to update batch {}: {}", id, e);
            Err(StoreError::Database(e))
        }
    }
}

/// PostgreSQL backed batch store
pub struct PgBatchStore {
    pool: PgPool,
}

impl PgBatchStore {
    /// Create a new database connection pool
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    pub async fn connect(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600)) // Close idle connections after 10 minutes
            .max_lifetime(Duration::from_secs(1800)) // Recycle connections after 30 minutes
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    /// Create the batches table if it does not exist yet
    pub async fn init_schema(&self) -> Result<(), SqlxError> {
        sqlx::query(CREATE_BATCHES_TABLE).execute(&self.pool).await?;
        info!("Batches table ready");
        Ok(())
    }
}

#[async_trait]
impl SnapshotSource for PgBatchStore {
    async fn snapshot(&self) -> Result<Vec<Batch>, StoreError> {
        let sql = format!("SELECT {} FROM batches ORDER BY id ASC", BATCH_COLUMNS);
        let rows = sqlx::query_as::<_, BatchRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Batch::try_from).collect()
    }
}

#[async_trait]
impl BatchStore for PgBatchStore {
    async fn get_batch(&self, id: i64) -> Result<Option<Batch>, StoreError> {
        let sql = format!("SELECT {} FROM batches WHERE id = $1", BATCH_COLUMNS);
        let row = sqlx::query_as::<_, BatchRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Batch::try_from).transpose()
    }

    async fn create_batch(&self, batch: NewBatch) -> Result<Batch, StoreError> {
        let sql = format!(
            "INSERT INTO batches (batch_number, article_number, description, location, total_weight) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            BATCH_COLUMNS
        );
        let row = sqlx::query_as::<_, BatchRow>(&sql)
            .bind(&batch.batch_number)
            .bind(&batch.article_number)
            .bind(&batch.description)
            .bind(&batch.location)
            .bind(batch.total_weight)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_or_db(e, &batch.batch_number))?;
        Batch::try_from(row)
    }

    async fn update_batch(&self, id: i64, update: BatchUpdate) -> Result<Batch, StoreError> {
        let sql = format!(
            "UPDATE batches SET \
                location = COALESCE($2, location), \
                inventored_weight = COALESCE($3, inventored_weight), \
                status = COALESCE($4, status), \
                user_id = COALESCE($5, user_id), \
                user_name = COALESCE($6, user_name), \
                updated_at = now() \
             WHERE id = $1 RETURNING {}",
            BATCH_COLUMNS
        );
        let result = sqlx::query_as::<_, BatchRow>(&sql)
            .bind(id)
            .bind(update.location)
            .bind(update.inventored_weight)
            .bind(update.status.map(|s| s.as_str()))
            .bind(update.user_id)
            .bind(update.user_name)
            .fetch_optional(&self.pool)
            .await;
        updated_row(id, result)
    }

    async fn mark_inventoried(&self, id: i64, location: Option<String>) -> Result<Batch, StoreError> {
        let sql = format!(
            "UPDATE batches SET \
                location = COALESCE($2, location), \
                status = 'completed', \
                inventored_weight = total_weight, \
                updated_at = now() \
             WHERE id = $1 RETURNING {}",
            BATCH_COLUMNS
        );
        let result = sqlx::query_as::<_, BatchRow>(&sql)
            .bind(id)
            .bind(location)
            .fetch_optional(&self.pool)
            .await;
        updated_row(id, result)
    }

    async fn mark_partially_inventoried(
        &self,
        id: i64,
        weight: i64,
        location: Option<String>,
    ) -> Result<Batch, StoreError> {
        let sql = format!(
            "UPDATE batches SET \
                location = COALESCE($3, location), \
                status = 'partially_completed', \
                inventored_weight = $2, \
                updated_at = now() \
             WHERE id = $1 RETURNING {}",
            BATCH_COLUMNS
        );
        let result = sqlx::query_as::<_, BatchRow>(&sql)
            .bind(id)
            .bind(weight)
            .bind(location)
            .fetch_optional(&self.pool)
            .await;
        updated_row(id, result)
    }

    async fn undo_inventory(&self, id: i64) -> Result<Batch, StoreError> {
        let sql = format!(
            "UPDATE batches SET \
                status = 'not_started', \
                inventored_weight = NULL, \
                updated_at = now() \
             WHERE id = $1 RETURNING {}",
            BATCH_COLUMNS
        );
        let result = sqlx::query_as::<_, BatchRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        updated_row(id, result)
    }

    async fn import_batches(
        &self,
        rows: Vec<NewBatch>,
        overwrite: bool,
    ) -> Result<ImportSummary, StoreError> {
        // xmax is zero for a freshly inserted tuple and non-zero for an upserted one
        let sql = if overwrite {
            "INSERT INTO batches (batch_number, article_number, description, location, total_weight) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (batch_number) DO UPDATE SET \
                article_number = EXCLUDED.article_number, \
                description = EXCLUDED.description, \
                location = EXCLUDED.location, \
                total_weight = EXCLUDED.total_weight \
             RETURNING (xmax = 0)"
        } else {
            "INSERT INTO batches (batch_number, article_number, description, location, total_weight) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (batch_number) DO NOTHING \
             RETURNING true"
        };

        let mut tx = self.pool.begin().await?;
        let mut summary = ImportSummary::default();
        for row in &rows {
            let inserted: Option<bool> = sqlx::query_scalar(sql)
                .bind(&row.batch_number)
                .bind(&row.article_number)
                .bind(&row.description)
                .bind(&row.location)
                .bind(row.total_weight)
                .fetch_optional(&mut *tx)
                .await?;
            match inserted {
                Some(true) => summary.created += 1,
                Some(false) => summary.updated += 1,
                None => summary.skipped += 1,
            }
        }
        tx.commit().await?;

        info!(
            "Imported {} rows: {} created, {} updated, {} skipped",
            rows.len(),
            summary.created,
            summary.updated,
            summary.skipped
        );
        Ok(summary)
    }

    async fn clear_batches(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM batches").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
