use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};

use super::{PathQuery, UploadChunkQuery};
use crate::store::StoreError;
use crate::ServiceState;

/// Replace a master copy with new content
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub version: u64,
}

/// Write one chunk of a large upload
#[derive(Debug, Clone)]
pub struct UploadChunkRequest {
    pub path: String,
    pub data: Bytes,
    pub offset: u64,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadChunkResponse {
    /// Set only once the final chunk has been written
    pub version: Option<u64>,
}

#[tracing::instrument(skip(state, body), fields(size = body.len()))]
pub async fn handler(
    State(state): State<ServiceState>,
    Query(query): Query<PathQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, StoreError> {
    let version = state.store().write(&query.path, body).await?;
    Ok(Json(UploadResponse { version }))
}

#[tracing::instrument(skip(state, body), fields(size = body.len()))]
pub async fn chunk_handler(
    State(state): State<ServiceState>,
    Query(query): Query<UploadChunkQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, StoreError> {
    let version = state
        .store()
        .write_chunk(&query.path, body, query.offset, query.finished)
        .await?;
    Ok(Json(UploadChunkResponse { version }))
}

impl ApiRequest for UploadRequest {
    type Response = UploadResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/files/content")?;
        Ok(client
            .put(full_url)
            .query(&[("path", self.path)])
            .header(http::header::CONTENT_TYPE, "application/octet-stream")
            .body(self.data))
    }
}

impl ApiRequest for UploadChunkRequest {
    type Response = UploadChunkResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/files/chunk")?;
        Ok(client
            .put(full_url)
            .query(&[
                ("path", self.path),
                ("offset", self.offset.to_string()),
                ("finished", self.finished.to_string()),
            ])
            .header(http::header::CONTENT_TYPE, "application/octet-stream")
            .body(self.data))
    }
}
