//! Liveness probe endpoint for the hosting platform.

use axum::Router;
use axum::routing::get;
use tracing::{error, info};

pub fn router() -> Router {
    // Anything except /health falls through to axum's default 404.
    Router::new().route("/health", get(|| async { "OK" }))
}

/// Serve the health endpoint for the life of the process.
///
/// Runs on its own task and shares no state with the bot loop. A bind or
/// serve failure is logged but never takes the bot down.
pub async fn serve(port: u16) {
    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(l) => l,
        Err(e) => {
            error!("Health listener failed to bind port {port}: {e}");
            return;
        }
    };

    info!("Health listener on port {port}");
    if let Err(e) = axum::serve(listener, router()).await {
        error!("Health listener stopped: {e}");
    }
}
