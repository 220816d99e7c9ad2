//! Batch inventory service with a throttled live update channel.

pub mod client;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod websocket;
pub mod ws;

use std::sync::Arc;

use config::Config;
use db::BatchStore;
use services::BatchService;
use ws::BroadcastCoordinator;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub coordinator: Arc<BroadcastCoordinator>,
    pub batches: BatchService,
}

/// Wire a store to a fresh coordinator and service
pub fn build_state<S: BatchStore + 'static>(store: Arc<S>, config: Config) -> AppState {
    let coordinator = BroadcastCoordinator::new(
        store.clone(),
        config.broadcast_throttle(),
        config.connection_queue_capacity,
    );
    let batches = BatchService::new(store, coordinator.clone());
    AppState {
        config: Arc::new(config),
        coordinator,
        batches,
    }
}
