use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::ServiceState;

pub mod api;
pub mod health;

/// Client-facing router: descriptor API under `/api`, probes under `/_status`.
pub fn router(state: ServiceState) -> Router {
    Router::new()
        .nest("/api", api::router(state.clone()))
        .nest("/_status", health::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(
    listener: TcpListener,
    state: ServiceState,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "proxy api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!("proxy api shutting down");
        })
        .await
}
