/// Process manager server
///
/// Main entry point. Loads configuration from the environment and starts the
/// HTTP server.

use process_manager::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Process definition API at /api/processes/*
/// - Instance API at /api/instances/*
/// - Approval API at /api/approvals/*
/// - Health check at /healthz
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (defaults to 0.0.0.0:5001 and data/process_manager.db)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
