use async_trait::async_trait;

use crate::models::{Batch, BatchUpdate, ImportSummary, NewBatch};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Batch with id {0} not found")]
    NotFound(i64),
    #[error("{0}")]
    Conflict(String),
    #[error("Stored batch {id} has an invalid status: {reason}")]
    InvalidStatus { id: i64, reason: String },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read side the broadcast coordinator depends on.
///
/// Once a mutation call on the same store has returned, `snapshot` must
/// reflect it.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// The full batch table, ordered by id
    async fn snapshot(&self) -> Result<Vec<Batch>, StoreError>;
}

/// Durable batch storage
#[async_trait]
pub trait BatchStore: SnapshotSource {
    async fn get_batch(&self, id: i64) -> Result<Option<Batch>, StoreError>;

    async fn create_batch(&self, batch: NewBatch) -> Result<Batch, StoreError>;

    async fn update_batch(&self, id: i64, update: BatchUpdate) -> Result<Batch, StoreError>;

    /// Mark fully inventoried: the inventoried weight becomes the total weight
    async fn mark_inventoried(&self, id: i64, location: Option<String>) -> Result<Batch, StoreError>;

    async fn mark_partially_inventoried(
        &self,
        id: i64,
        weight: i64,
        location: Option<String>,
    ) -> Result<Batch, StoreError>;

    /// Reset to `not_started` and forget the inventoried weight
    async fn undo_inventory(&self, id: i64) -> Result<Batch, StoreError>;

    /// Insert rows by batch number. Existing batch numbers are skipped, or
    /// have their descriptive fields replaced when `overwrite` is set.
    async fn import_batches(
        &self,
        rows: Vec<NewBatch>,
        overwrite: bool,
    ) -> Result<ImportSummary, StoreError>;

    /// Remove every batch, returning how many were removed
    async fn clear_batches(&self) -> Result<u64, StoreError>;
}
