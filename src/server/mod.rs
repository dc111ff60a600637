//! HTTP server for rescue-geo
//!
//! Exposes the geocoding client and datum conversion as a small REST API,
//! for surface pages that cannot call the vendor directly.

pub mod routes;
pub mod state;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::geo::Transport;
use routes::create_router;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Start the HTTP server
///
/// Never returns unless the server shuts down.
pub async fn run(config: Config) -> Result<()> {
    let addr = config.server_addr();
    let state = Arc::new(AppState::from_config(config)?);
    serve(&addr, state).await
}

/// Serve `state` on a specific address
///
/// Useful for tests or when you want to override config
pub async fn serve<T: Transport + 'static>(addr: &str, state: Arc<AppState<T>>) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Server(format!("Invalid server address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Server(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("Starting server on {}", addr);

    axum::serve(listener, create_router(state))
        .await
        .map_err(|e| Error::Server(format!("Server error: {}", e)))?;

    Ok(())
}
