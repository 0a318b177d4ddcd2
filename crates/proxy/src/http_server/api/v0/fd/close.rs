use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};

use crate::proxy::ProxyError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseRequest {
    pub fd: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseResponse {
    pub closed: bool,
}

#[tracing::instrument(skip(state))]
pub async fn handler(
    State(state): State<ServiceState>,
    Path(fd): Path<u64>,
) -> Result<impl IntoResponse, ProxyError> {
    state.proxy().close(fd).await?;
    Ok(Json(CloseResponse { closed: true }))
}

impl ApiRequest for CloseRequest {
    type Response = CloseResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join(&format!("/api/v0/fd/{}/close", self.fd))?;
        Ok(client.post(full_url))
    }
}
