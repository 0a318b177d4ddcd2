use axum::Router;

use crate::ServiceState;

pub mod files;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/files", files::router(state.clone()))
        .with_state(state)
}
