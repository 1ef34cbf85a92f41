use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::api::routes::build_router;
use crate::api::state::AppState;
use crate::errors::{PasswordPalError, Result};

/// Bind and serve until Ctrl-C.
pub async fn start_api_server(state: AppState) -> Result<()> {
    let bind_address = state.config.server.bind_address();
    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        PasswordPalError::config(format!("Invalid API address '{}': {}", bind_address, e))
    })?;

    let router: Router = build_router(state);

    let listener = TcpListener::bind(addr).await.map_err(|e| PasswordPalError::Io {
        source: e,
        context: format!("Failed to bind API server to {}", addr),
    })?;

    info!(address = %addr, "Starting HTTP API server");
    run_http_server(listener, router).await?;

    info!("API server shutdown completed");
    Ok(())
}

async fn run_http_server(listener: TcpListener, router: Router) -> Result<()> {
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "API server shutdown listener failed");
            }
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| PasswordPalError::Io { source: e, context: "API server error".to_string() })
}
