use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    clear_batches, create_batch, diagnostics, get_batch, health_check, import_batches,
    inventory_complete, inventory_partial, list_batches, ready_check, undo_inventory,
    update_batch,
};
use crate::AppState;

/// Create API routes
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/diagnostics", get(diagnostics))
        .route(
            "/batches",
            get(list_batches).post(create_batch).delete(clear_batches),
        )
        .route("/batches/:id", get(get_batch).put(update_batch))
        .route("/batches/:id/inventory-complete", post(inventory_complete))
        .route("/batches/:id/inventory-partial", post(inventory_partial))
        .route("/batches/:id/undo-inventory", post(undo_inventory))
        .route("/import", post(import_batches))
}
