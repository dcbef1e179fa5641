//! weabase - query service for monthly weather-station observation files
//!
//! This is the main entry point for the weabase server.

use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

use weabase::handlers::router;
use weabase::{init_tracing, log_error, AppState, Config, Result, WeaError};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before tracing so the configured level applies
    let (config, data_dir) = Config::load()?;
    init_tracing(&config.log_level);

    info!("Starting weabase v{}", env!("CARGO_PKG_VERSION"));

    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    info!("Serving station data from {:?}", data_dir);

    let app_state = AppState::from_config(config.clone(), data_dir).map_err(|e| {
        log_error(&e, "loading element catalog");
        e
    })?;

    app_state.validate().map_err(|e| {
        log_error(&e, "validating application state");
        e
    })?;

    info!("Catalog holds {} elements", app_state.catalog.len());

    let app = router(std::sync::Arc::new(app_state));

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| WeaError::Config {
                message: format!("Invalid host address: {}", e),
            })?,
        config.server.port,
    ));

    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| WeaError::Server {
            message: format!("Failed to bind to address: {}", e),
        })?;

    info!("Server is ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| WeaError::Server {
            message: format!("Server error: {}", e),
        })?;

    info!("Server has been gracefully shut down");
    Ok(())
}

/// Wait for a shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
