//! Master-copy file endpoints
//!
//! - `GET    /info?path=`                     metadata
//! - `GET    /content?path=`                  whole file (raw bytes)
//! - `PUT    /content?path=`                  replace whole file, returns new version
//! - `GET    /chunk?path=&offset=`            one chunk (raw bytes)
//! - `PUT    /chunk?path=&offset=&finished=`  write one chunk
//! - `POST   /create`                         create empty file
//! - `DELETE /?path=`                         delete file

use axum::extract::DefaultBodyLimit;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use http::StatusCode;
use serde::{Deserialize, Serialize};

use common::remote::{CHUNK_SIZE, HUGE_FILE_SIZE};

use crate::store::StoreError;
use crate::ServiceState;

pub mod content;
pub mod create;
pub mod info;
pub mod remove;
pub mod upload;

pub use content::{FetchChunkRequest, FetchRequest};
pub use create::{CreateRequest, CreateResponse};
pub use info::InfoRequest;
pub use remove::{DeleteRequest, DeleteResponse};
pub use upload::{UploadChunkRequest, UploadChunkResponse, UploadRequest, UploadResponse};

/// Whole-file uploads stop at the huge-file threshold; anything larger is chunked.
pub const MAX_BODY_BYTES: usize = (HUGE_FILE_SIZE + CHUNK_SIZE) as usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkQuery {
    pub path: String,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadChunkQuery {
    pub path: String,
    pub offset: u64,
    #[serde(default)]
    pub finished: bool,
}

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", delete(remove::handler))
        .route("/info", get(info::handler))
        .route("/content", get(content::handler).put(upload::handler))
        .route("/chunk", get(content::chunk_handler).put(upload::chunk_handler))
        .route("/create", post(create::handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoreError::InvalidPath(_) => StatusCode::FORBIDDEN,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::IsDirectory(_) => StatusCode::CONFLICT,
            StoreError::Io(e) => {
                tracing::error!(error = %e, "store io failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}
