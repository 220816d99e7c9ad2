use std::panic;
use std::sync::Arc;

use batch_live::config::Config;
use batch_live::db::{MemoryBatchStore, PgBatchStore};
use batch_live::routes::create_app;
use batch_live::{build_state, AppState};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Configuration comes first so its log level can shape the filter
    let loaded = Config::load();
    let default_filter = loaded
        .as_ref()
        .map(Config::default_log_filter)
        .unwrap_or_else(|_| Config::default().default_log_filter());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .init();

    info!("Starting server...");

    let config = loaded.unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    if config.is_development() {
        info!("Running in development mode: {:?}", config);
    }

    let state = connect_store(config).await;
    let address = state.config.server_address();
    let ws_path = state.config.ws_path.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", address));

    info!("🚀 Server running on http://{}", address);
    info!("📡 Live updates available at ws://{}{}", address, ws_path);
    info!("📚 Swagger UI available at http://{}/swagger", address);

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}

/// Postgres when a database URL is configured and reachable, memory otherwise
async fn connect_store(config: Config) -> AppState {
    let Some(db_url) = config.db_url.clone() else {
        warn!("No database URL configured - batches are kept in memory only");
        return build_state(Arc::new(MemoryBatchStore::new()), config);
    };

    let store = match PgBatchStore::connect(&db_url).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            warn!("Falling back to the in-memory batch store");
            return build_state(Arc::new(MemoryBatchStore::new()), config);
        }
    };

    if let Err(e) = store.init_schema().await {
        error!("Failed to initialize database schema: {}", e);
        warn!("Falling back to the in-memory batch store");
        return build_state(Arc::new(MemoryBatchStore::new()), config);
    }

    info!("Database initialized successfully");
    build_state(Arc::new(store), config)
}
