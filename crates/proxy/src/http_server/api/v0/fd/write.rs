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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Carried in the URL path
    #[serde(skip)]
    pub fd: u64,
    /// Base64 of the bytes to write
    pub data: String,
}

impl WriteRequest {
    pub fn new(fd: u64, data: &[u8]) -> Self {
        Self {
            fd,
            data: base64::engine::general_purpose::STANDARD.encode(data),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    pub written: usize,
}

#[tracing::instrument(skip(state, body))]
pub async fn handler(
    State(state): State<ServiceState>,
    Path(fd): Path<u64>,
    Json(body): Json<WriteRequest>,
) -> Result<impl IntoResponse, ProxyError> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(&body.data)
        .map_err(|e| ProxyError::InvalidArgument(format!("bad base64 payload: {}", e)))?;
    let written = state.proxy().write(fd, &data).await?;
    Ok(Json(WriteResponse { written }))
}

impl ApiRequest for WriteRequest {
    type Response = WriteResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join(&format!("/api/v0/fd/{}/write", self.fd))?;
        Ok(client.post(full_url).json(&self))
    }
}
