use axum::extract::{Query, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, RawApiRequest};

use super::{ChunkQuery, PathQuery};
use crate::store::StoreError;
use crate::ServiceState;

/// Request the whole content of a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub path: String,
}

/// Request one chunk of a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchChunkRequest {
    pub path: String,
    pub offset: u64,
}

#[tracing::instrument(skip(state))]
pub async fn handler(
    State(state): State<ServiceState>,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse, StoreError> {
    let data = state.store().read(&query.path).await?;
    Ok((
        [(http::header::CONTENT_TYPE, "application/octet-stream")],
        data,
    ))
}

#[tracing::instrument(skip(state))]
pub async fn chunk_handler(
    State(state): State<ServiceState>,
    Query(query): Query<ChunkQuery>,
) -> Result<impl IntoResponse, StoreError> {
    let data = state.store().read_chunk(&query.path, query.offset).await?;
    Ok((
        [(http::header::CONTENT_TYPE, "application/octet-stream")],
        data,
    ))
}

impl RawApiRequest for FetchRequest {
    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/files/content")?;
        Ok(client.get(full_url).query(&[("path", self.path)]))
    }
}

impl RawApiRequest for FetchChunkRequest {
    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/files/chunk")?;
        Ok(client
            .get(full_url)
            .query(&[("path", self.path), ("offset", self.offset.to_string())]))
    }
}
