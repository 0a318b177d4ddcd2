use axum::routing::get;
use axum::Router;

use server::http_server::health::liveness;

pub mod version;

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/livez", get(liveness::handler))
        .route("/version", get(version::handler))
}
