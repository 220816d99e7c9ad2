use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Batch store is not reachable", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

#[utoipa::path(
    get,
    path = "/api/diagnostics",
    responses(
        (status = 200, description = "Connection and host statistics", body = DiagnosticsResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

/// List all batches
#[utoipa::path(
    get,
    path = "/api/batches",
    responses(
        (status = 200, description = "All batches ordered by id", body = [Batch])
    )
)]
#[allow(dead_code)]
pub async fn list_batches_doc() {}

/// Create a batch
#[utoipa::path(
    post,
    path = "/api/batches",
    request_body = NewBatch,
    responses(
        (status = 201, description = "Batch created", body = Batch),
        (status = 400, description = "Invalid batch", body = ErrorResponse),
        (status = 409, description = "Batch number already exists", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn create_batch_doc() {}

/// Remove all batches
#[utoipa::path(
    delete,
    path = "/api/batches",
    responses(
        (status = 200, description = "Batches removed", body = ClearResponse)
    )
)]
#[allow(dead_code)]
pub async fn clear_batches_doc() {}

#[utoipa::path(
    get,
    path = "/api/batches/{id}",
    params(("id" = i64, Path, description = "Batch id")),
    responses(
        (status = 200, description = "The batch", body = Batch),
        (status = 404, description = "Batch not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn get_batch_doc() {}

#[utoipa::path(
    put,
    path = "/api/batches/{id}",
    params(("id" = i64, Path, description = "Batch id")),
    request_body = BatchUpdate,
    responses(
        (status = 200, description = "Updated batch", body = Batch),
        (status = 400, description = "Invalid update", body = ErrorResponse),
        (status = 404, description = "Batch not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn update_batch_doc() {}

/// Mark a batch as fully inventoried
#[utoipa::path(
    post,
    path = "/api/batches/{id}/inventory-complete",
    params(("id" = i64, Path, description = "Batch id")),
    request_body(content = InventoryCompleteRequest, description = "Optional new location"),
    responses(
        (status = 200, description = "Updated batch", body = Batch),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 404, description = "Batch not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn inventory_complete_doc() {}

/// Mark a batch as partially inventoried
#[utoipa::path(
    post,
    path = "/api/batches/{id}/inventory-partial",
    params(("id" = i64, Path, description = "Batch id")),
    request_body = PartialInventoryRequest,
    responses(
        (status = 200, description = "Updated batch", body = Batch),
        (status = 400, description = "Negative weight", body = ErrorResponse),
        (status = 404, description = "Batch not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn inventory_partial_doc() {}

#[utoipa::path(
    post,
    path = "/api/batches/{id}/undo-inventory",
    params(("id" = i64, Path, description = "Batch id")),
    responses(
        (status = 200, description = "Batch reset to not started", body = Batch),
        (status = 404, description = "Batch not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn undo_inventory_doc() {}

/// Import batches in bulk
#[utoipa::path(
    post,
    path = "/api/import",
    request_body = ImportRequest,
    responses(
        (status = 200, description = "Import summary", body = ImportResponse),
        (status = 400, description = "A row is invalid", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn import_batches_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        diagnostics_doc,
        list_batches_doc,
        create_batch_doc,
        clear_batches_doc,
        get_batch_doc,
        update_batch_doc,
        inventory_complete_doc,
        inventory_partial_doc,
        undo_inventory_doc,
        import_batches_doc,
    ),
    components(
        schemas(
            HealthResponse,
            DiagnosticsResponse,
            ErrorResponse,
            Batch,
            BatchStatus,
            NewBatch,
            BatchUpdate,
            InventoryCompleteRequest,
            PartialInventoryRequest,
            ImportRequest,
            ImportResponse,
            ClearResponse,
        )
    ),
    tags(
        (name = "api", description = "Batch inventory endpoints")
    )
)]
pub struct ApiDoc;
