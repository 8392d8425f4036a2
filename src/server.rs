/// Server setup and initialization
///
/// Wires together all components: storage, definition registry, notification
/// relay, process engine, and HTTP routes.

use crate::{
    api::{create_api_routes, AppState},
    config::Config,
    notify::BroadcastRelay,
    process::registry::DefinitionRegistry,
    runtime::engine::ProcessEngine,
    storage::{Database, SqliteStore},
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Running application: the router plus handles tests and embedders may want.
pub struct App {
    pub router: Router,
    pub engine: Arc<ProcessEngine>,
    pub relay: BroadcastRelay,
}

/// Create the main Axum application with all routes
///
/// Opens the database, warms the definition registry from storage, and builds
/// the engine and HTTP routes on top.
pub async fn create_app(config: Config) -> Result<App> {
    tracing::info!("🗄️ Initializing process storage in {}", config.database.data_dir);
    let database = Database::connect(&config.database).await?;
    let store = Arc::new(SqliteStore::new(&database));

    tracing::info!("📣 Initializing approval relay (capacity {})", config.notifications.channel_capacity);
    let relay = BroadcastRelay::new(config.notifications.channel_capacity);

    let engine = Arc::new(ProcessEngine::new(
        store,
        Arc::new(DefinitionRegistry::new()),
        Arc::new(relay.clone()),
    ));

    tracing::info!("📥 Loading existing definitions into registry");
    let loaded = engine
        .warm_registry()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load definitions from storage: {}", e))?;
    tracing::debug!("📊 Registry warmed with {} definitions", loaded);

    let router = build_router(Arc::clone(&engine));
    tracing::info!("✅ Application initialized successfully");

    Ok(App {
        router,
        engine,
        relay,
    })
}

/// Router over an already-built engine
pub fn build_router(engine: Arc<ProcessEngine>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        .merge(create_api_routes().with_state(AppState { engine }))
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting process manager...");

    let app = create_app(config.clone()).await?;

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.router.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
