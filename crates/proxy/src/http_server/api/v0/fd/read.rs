use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};

use crate::proxy::ProxyError;
use crate::ServiceState;

/// Largest single read served in one call
pub const MAX_READ_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Carried in the URL path
    #[serde(skip)]
    pub fd: u64,
    pub len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResponse {
    /// Base64 of the bytes read; empty at end of file
    pub data: String,
    pub len: usize,
}

#[tracing::instrument(skip(state))]
pub async fn handler(
    State(state): State<ServiceState>,
    Path(fd): Path<u64>,
    Json(body): Json<ReadRequest>,
) -> Result<impl IntoResponse, ProxyError> {
    if body.len > MAX_READ_LEN {
        return Err(ProxyError::InvalidArgument(format!(
            "read of {} bytes exceeds {}",
            body.len, MAX_READ_LEN
        )));
    }
    let data = state.proxy().read(fd, body.len).await?;
    Ok(Json(ReadResponse {
        len: data.len(),
        data: base64::engine::general_purpose::STANDARD.encode(&data),
    }))
}

impl ApiRequest for ReadRequest {
    type Response = ReadResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join(&format!("/api/v0/fd/{}/read", self.fd))?;
        Ok(client.post(full_url).json(&self))
    }
}
