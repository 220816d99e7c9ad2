use axum::{extract::State, http::StatusCode, Json};
use std::sync::{Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

use crate::models::{DiagnosticsResponse, ErrorResponse};
use crate::AppState;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Connection and host statistics
pub async fn diagnostics(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<DiagnosticsResponse>), (StatusCode, Json<ErrorResponse>)> {
    let n_conn = state.coordinator.connection_count().await as u32;
    let broadcast_pending = state.coordinator.is_pending();
    let n_batches = state
        .batches
        .list()
        .await
        .map_err(|e| ErrorResponse::reply(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?
        .len() as u32;

    // System stats
    let (cpu_usage, memory_alloc, memory_free, memory_total) = {
        let sys_lock = SYSTEM_MONITOR.get_or_init(|| Mutex::new(System::new_all()));
        match sys_lock.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0, 0),
        }
    };

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB (Free: {} MB), Conn: {}, Batches: {}",
        cpu_usage,
        memory_alloc / 1024 / 1024,
        memory_total / 1024 / 1024,
        memory_free / 1024 / 1024,
        n_conn,
        n_batches
    );

    Ok((
        StatusCode::OK,
        Json(DiagnosticsResponse {
            n_conn,
            broadcast_pending,
            n_batches,
            cpu_usage,
            memory_alloc,
            memory_total,
            memory_free,
        }),
    ))
}
