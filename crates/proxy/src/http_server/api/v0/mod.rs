//! Client-facing file API
//!
//! - `POST /fd/open`          open a path, returns a descriptor
//! - `POST /fd/:fd/read`      read at the descriptor's position
//! - `POST /fd/:fd/write`     write at the descriptor's position
//! - `POST /fd/:fd/lseek`     move the position
//! - `POST /fd/:fd/close`     close, writing back modifications
//! - `POST /unlink`           delete a file
//! - `POST /client/done`      close every handle a client still holds
//! - `GET  /cache/stats`      cache counters
//!
//! File content travels base64-encoded inside JSON bodies. Failures answer
//! with `{"errno": <negative errno>, "message": ...}`.

use axum::extract::DefaultBodyLimit;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use common::api::ApiError;

use crate::proxy::ProxyError;
use crate::ServiceState;

pub mod cache_stats;
pub mod client_done;
pub mod fd;
pub mod unlink;

pub use cache_stats::CacheStatsRequest;
pub use client_done::{ClientDoneRequest, ClientDoneResponse};
pub use unlink::{UnlinkRequest, UnlinkResponse};

/// Base64 inflates payloads by a third; leave room for a full chunk-sized write.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Error body returned by every proxy endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub errno: i32,
    pub message: String,
}

impl ErrorBody {
    /// Recover the error body from a failed API call, if the proxy sent one.
    pub fn from_api_error(err: &ApiError) -> Option<Self> {
        match err {
            ApiError::HttpStatus(_, body) => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/fd", fd::router(state.clone()))
        .route("/unlink", post(unlink::handler))
        .route("/client/done", post(client_done::handler))
        .route("/cache/stats", get(cache_stats::handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::InvalidArgument(_) | ProxyError::BadHandle(_) => StatusCode::BAD_REQUEST,
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::IsDirectory(_) | ProxyError::AlreadyExists(_) => StatusCode::CONFLICT,
            ProxyError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ProxyError::ResourceExhausted(_) => StatusCode::INSUFFICIENT_STORAGE,
            ProxyError::Transport(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Io(_) | ProxyError::Internal(_) => {
                tracing::error!(error = %self, "proxy failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            errno: self.errno(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
