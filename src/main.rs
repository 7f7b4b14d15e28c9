//! Notes API server.
//!
//! Wires configuration, the document store, the request pipeline and the
//! server lifecycle together, then blocks until SIGINT/SIGTERM.

use notes_api::{build_router, server, AppState, Config, MemoryStore, Server};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Initialize structured logging
    init_tracing();

    // Load configuration
    let config = Config::from_env();
    log_startup_info(&config);

    // Initialize core components
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store, config.clone());

    // Start background workers
    let workers = CancellationToken::new();
    state
        .limiter
        .clone()
        .start_cleanup_task(config.rate_limit_cleanup_interval, workers.clone());

    // Bind, serve and wait for a termination signal
    let app = build_router(state);
    let server = match Server::bind(&config, app).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Cannot start notes API server");
            return ExitCode::FAILURE;
        }
    };

    let result = server.run(server::shutdown_signal()).await;
    workers.cancel();

    match result {
        Ok(()) => {
            info!("Server shutdown completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server shutdown failed");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with environment-based log levels.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("notes_api=debug,tower_http=info")),
        )
        .init();
}

/// Log startup configuration (no secrets).
fn log_startup_info(config: &Config) {
    info!(
        host = %config.host,
        port = config.port,
        storage = "memory",
        rate_limit_requests = config.rate_limit_requests,
        rate_limit_window_secs = config.rate_limit_window.as_secs(),
        cors_origins = ?config.cors_allowed_origins,
        request_timeout_secs = config.request_timeout.as_secs(),
        header_read_timeout_secs = config.header_read_timeout.as_secs(),
        shutdown_timeout_secs = config.shutdown_timeout.as_secs(),
        "Starting notes API"
    );
}
