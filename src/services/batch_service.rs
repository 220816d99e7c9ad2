use std::sync::Arc;
use tracing::info;

use crate::db::{BatchStore, StoreError};
use crate::models::{Batch, BatchUpdate, ImportSummary, NewBatch};
use crate::ws::BroadcastCoordinator;

/// Batch operations with live-update notification.
///
/// Every mutating call notifies the coordinator exactly once, after the store
/// write returned successfully. Reads never notify.
#[derive(Clone)]
pub struct BatchService {
    store: Arc<dyn BatchStore>,
    coordinator: Arc<BroadcastCoordinator>,
}

impl BatchService {
    pub fn new(store: Arc<dyn BatchStore>, coordinator: Arc<BroadcastCoordinator>) -> Self {
        Self { store, coordinator }
    }

    fn committed<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if result.is_ok() {
            self.coordinator.notify_mutation();
        }
        result
    }

    pub async fn list(&self) -> Result<Vec<Batch>, StoreError> {
        self.store.snapshot().await
    }

    pub async fn get(&self, id: i64) -> Result<Batch, StoreError> {
        self.store
            .get_batch(id)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    pub async fn create(&self, batch: NewBatch) -> Result<Batch, StoreError> {
        let result = self.store.create_batch(batch).await;
        self.committed(result)
    }

    pub async fn update(&self, id: i64, update: BatchUpdate) -> Result<Batch, StoreError> {
        let result = self.store.update_batch(id, update).await;
        if let Ok(batch) = &result {
            info!("Batch {} updated, status is now {}", batch.id, batch.status);
        }
        self.committed(result)
    }

    pub async fn mark_inventoried(&self, id: i64, location: Option<String>) -> Result<Batch, StoreError> {
        let result = self.store.mark_inventoried(id, location).await;
        self.committed(result)
    }

    pub async fn mark_partially_inventoried(
        &self,
        id: i64,
        weight: i64,
        location: Option<String>,
    ) -> Result<Batch, StoreError> {
        info!(
            "Marking batch {} as partially inventoried with weight {} and location {}",
            id,
            weight,
            location.as_deref().unwrap_or("not specified")
        );
        let result = self
            .store
            .mark_partially_inventoried(id, weight, location)
            .await;
        self.committed(result)
    }

    pub async fn undo_inventory(&self, id: i64) -> Result<Batch, StoreError> {
        let result = self.store.undo_inventory(id).await;
        if let Ok(batch) = &result {
            info!("Inventory of batch {} undone, status is now {}", batch.id, batch.status);
        }
        self.committed(result)
    }

    pub async fn import(&self, rows: Vec<NewBatch>, overwrite: bool) -> Result<ImportSummary, StoreError> {
        let result = self.store.import_batches(rows, overwrite).await;
        self.committed(result)
    }

    pub async fn clear(&self) -> Result<u64, StoreError> {
        let result = self.store.clear_batches().await;
        self.committed(result)
    }
}
