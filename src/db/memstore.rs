use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::store::{BatchStore, SnapshotSource, StoreError};
use crate::models::{Batch, BatchStatus, BatchUpdate, ImportSummary, NewBatch};

struct MemState {
    batches: BTreeMap<i64, Batch>,
    next_id: i64,
}

impl MemState {
    fn find_by_number(&self, batch_number: &str) -> Option<i64> {
        self.batches
            .values()
            .find(|batch| batch.batch_number == batch_number)
            .map(|batch| batch.id)
    }

    fn insert(&mut self, row: NewBatch) -> Batch {
        let id = self.next_id;
        self.next_id += 1;
        let batch = Batch {
            id,
            batch_number: row.batch_number,
            article_number: row.article_number,
            description: row.description,
            location: row.location,
            total_weight: row.total_weight,
            inventored_weight: None,
            status: BatchStatus::NotStarted,
            updated_at: None,
            user_id: None,
            user_name: None,
        };
        self.batches.insert(id, batch.clone());
        batch
    }

    fn modify(&mut self, id: i64, f: impl FnOnce(&mut Batch)) -> Result<Batch, StoreError> {
        let batch = self.batches.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        f(batch);
        batch.updated_at = Some(Utc::now());
        Ok(batch.clone())
    }
}

/// Batch store kept in process memory, ordered by id.
pub struct MemoryBatchStore {
    state: RwLock<MemState>,
}

impl MemoryBatchStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemState {
                batches: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Store pre-filled with rows, ids assigned in order starting at 1
    pub fn with_rows(rows: Vec<NewBatch>) -> Self {
        let mut state = MemState {
            batches: BTreeMap::new(),
            next_id: 1,
        };
        for row in rows {
            state.insert(row);
        }
        Self {
            state: RwLock::new(state),
        }
    }
}

impl Default for MemoryBatchStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotSource for MemoryBatchStore {
    async fn snapshot(&self) -> Result<Vec<Batch>, StoreError> {
        Ok(self.state.read().await.batches.values().cloned().collect())
    }
}

#[async_trait]
impl BatchStore for MemoryBatchStore {
    async fn get_batch(&self, id: i64) -> Result<Option<Batch>, StoreError> {
        Ok(self.state.read().await.batches.get(&id).cloned())
    }

    async fn create_batch(&self, batch: NewBatch) -> Result<Batch, StoreError> {
        let mut state = self.state.write().await;
        if state.find_by_number(&batch.batch_number).is_some() {
            return Err(StoreError::Conflict(format!(
                "Batch number '{}' already exists",
                batch.batch_number
            )));
        }
        Ok(state.insert(batch))
    }

    async fn update_batch(&self, id: i64, update: BatchUpdate) -> Result<Batch, StoreError> {
        self.state.write().await.modify(id, |batch| {
            if let Some(location) = update.location {
                batch.location = Some(location);
            }
            if let Some(weight) = update.inventored_weight {
                batch.inventored_weight = Some(weight);
            }
            if let Some(status) = update.status {
                batch.status = status;
            }
            if let Some(user_id) = update.user_id {
                batch.user_id = Some(user_id);
            }
            if let Some(user_name) = update.user_name {
                batch.user_name = Some(user_name);
            }
        })
    }

    async fn mark_inventoried(&self, id: i64, location: Option<String>) -> Result<Batch, StoreError> {
        self.state.write().await.modify(id, |batch| {
            if let Some(location) = location {
                batch.location = Some(location);
            }
            batch.status = BatchStatus::Completed;
            batch.inventored_weight = Some(batch.total_weight);
        })
    }

    async fn mark_partially_inventoried(
        &self,
        id: i64,
        weight: i64,
        location: Option<String>,
    ) -> Result<Batch, StoreError> {
        self.state.write().await.modify(id, |batch| {
            if let Some(location) = location {
                batch.location = Some(location);
            }
            batch.status = BatchStatus::PartiallyCompleted;
            batch.inventored_weight = Some(weight);
        })
    }

    async fn undo_inventory(&self, id: i64) -> Result<Batch, StoreError> {
        self.state.write().await.modify(id, |batch| {
            batch.status = BatchStatus::NotStarted;
            batch.inventored_weight = None;
        })
    }

    async fn import_batches(
        &self,
        rows: Vec<NewBatch>,
        overwrite: bool,
    ) -> Result<ImportSummary, StoreError> {
        let mut state = self.state.write().await;
        let mut summary = ImportSummary::default();
        for row in rows {
            match state.find_by_number(&row.batch_number) {
                Some(id) if overwrite => {
                    state.modify(id, |batch| {
                        batch.article_number = row.article_number;
                        batch.description = row.description;
                        batch.location = row.location;
                        batch.total_weight = row.total_weight;
                    })?;
                    summary.updated += 1;
                }
                Some(_) => summary.skipped += 1,
                None => {
                    state.insert(row);
                    summary.created += 1;
                }
            }
        }
        debug!(
            "Imported batches into memory store: {} created, {} updated, {} skipped",
            summary.created, summary.updated, summary.skipped
        );
        Ok(summary)
    }

    async fn clear_batches(&self) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let removed = state.batches.len() as u64;
        state.batches.clear();
        Ok(removed)
    }
}
