use std::net::SocketAddr;

use action_hub_core::api::CliError;
use axum::middleware;
use tokio::signal;
use tracing::info;

use super::{
    middleware::{create_middleware_stack, request_logger},
    routes::create_router,
    AppState,
};

#[derive(Debug, Clone)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

/// Serves until Ctrl+C or SIGTERM, then drains in-flight requests.
pub async fn start_server(listen: ListenConfig, state: AppState) -> Result<(), CliError> {
    let stack = create_middleware_stack(&state.config);
    let app = create_router(state)
        .layer(middleware::from_fn(request_logger))
        .layer(stack);

    let addr: SocketAddr = format!("{}:{}", listen.host, listen.port)
        .parse()
        .map_err(|e| CliError::Command(format!("invalid listen address: {e}")))?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Action Hub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C signal");
                }
                _ = wait_for_sigterm() => {
                    info!("Received SIGTERM signal");
                }
            }
            info!("Starting graceful shutdown...");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot install SIGTERM handler");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
