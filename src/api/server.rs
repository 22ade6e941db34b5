//! Axum server setup and startup

use std::net::SocketAddr;

use tower_http::cors::{Any, CorsLayer};

use super::routes::create_router;
use super::ApiState;

/// Run the API server on the specified port with shared state
///
/// This function is intended to be run on a tokio runtime.
/// It will block until the server is shut down or the shutdown signal is received.
pub async fn run_server(
    port: u16,
    state: ApiState,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    // Browser frontends are served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    log::info!("API server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            log::info!("API server shutting down gracefully");
        })
        .await
}
