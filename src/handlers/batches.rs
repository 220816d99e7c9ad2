use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info, warn};

use crate::db::StoreError;
use crate::models::{
    Batch, BatchUpdate, ClearResponse, ErrorResponse, ImportRequest, ImportResponse,
    InventoryCompleteRequest, NewBatch, PartialInventoryRequest,
};
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(_) => ErrorResponse::reply(StatusCode::NOT_FOUND, e.to_string()),
        StoreError::Conflict(_) => ErrorResponse::reply(StatusCode::CONFLICT, e.to_string()),
        _ => {
            error!("Batch store failure: {}", e);
            ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// List all batches
pub async fn list_batches(State(state): State<AppState>) -> Result<Json<Vec<Batch>>, ApiError> {
    state.batches.list().await.map(Json).map_err(store_error)
}

/// Get one batch
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Batch>, ApiError> {
    state.batches.get(id).await.map(Json).map_err(store_error)
}

/// Create a batch
pub async fn create_batch(
    State(state): State<AppState>,
    Json(payload): Json<NewBatch>,
) -> Result<(StatusCode, Json<Batch>), ApiError> {
    payload
        .validate()
        .map_err(|message| ErrorResponse::reply(StatusCode::BAD_REQUEST, message))?;

    let batch = state.batches.create(payload).await.map_err(store_error)?;
    info!("Created batch {} ({})", batch.id, batch.batch_number);
    Ok((StatusCode::CREATED, Json(batch)))
}

/// Update a batch
pub async fn update_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<BatchUpdate>,
) -> Result<Json<Batch>, ApiError> {
    payload
        .validate()
        .map_err(|message| ErrorResponse::reply(StatusCode::BAD_REQUEST, message))?;

    state
        .batches
        .update(id, payload)
        .await
        .map(Json)
        .map_err(store_error)
}

/// Mark a batch as fully inventoried. The body is optional, but when present
/// it must be a valid request.
pub async fn inventory_complete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<Batch>, ApiError> {
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        InventoryCompleteRequest::default()
    } else {
        serde_json::from_slice::<InventoryCompleteRequest>(&body).map_err(|e| {
            warn!("Rejecting inventory-complete for batch {}: {}", id, e);
            ErrorResponse::reply(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
        })?
    };

    state
        .batches
        .mark_inventoried(id, payload.location)
        .await
        .map(Json)
        .map_err(store_error)
}

/// Mark a batch as partially inventoried
pub async fn inventory_partial(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<PartialInventoryRequest>,
) -> Result<Json<Batch>, ApiError> {
    if payload.weight < 0 {
        return Err(ErrorResponse::reply(
            StatusCode::BAD_REQUEST,
            "Weight must not be negative",
        ));
    }

    state
        .batches
        .mark_partially_inventoried(id, payload.weight, payload.location)
        .await
        .map(Json)
        .map_err(store_error)
}

/// Reset a batch to not started
pub async fn undo_inventory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Batch>, ApiError> {
    state
        .batches
        .undo_inventory(id)
        .await
        .map(Json)
        .map_err(store_error)
}

/// Import batches in bulk
pub async fn import_batches(
    State(state): State<AppState>,
    Json(payload): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
    for (index, row) in payload.rows.iter().enumerate() {
        if let Err(message) = row.validate() {
            warn!("Rejecting import, row {} is invalid: {}", index + 1, message);
            return Err(ErrorResponse::reply(
                StatusCode::BAD_REQUEST,
                format!("Row {}: {}", index + 1, message),
            ));
        }
    }

    let summary = state
        .batches
        .import(payload.rows, payload.overwrite)
        .await
        .map_err(store_error)?;

    let count = summary.created + summary.updated;
    info!(
        "Imported batches: {} created, {} updated, {} skipped",
        summary.created, summary.updated, summary.skipped
    );
    Ok(Json(ImportResponse {
        message: format!("Imported {} batches", count),
        count,
        created: summary.created,
        updated: summary.updated,
        skipped: summary.skipped,
    }))
}

/// Remove all batches
pub async fn clear_batches(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    let removed = state.batches.clear().await.map_err(store_error)?;
    warn!("Cleared {} batches", removed);
    Ok(Json(ClearResponse {
        message: format!("Removed {} batches", removed),
        removed,
    }))
}
