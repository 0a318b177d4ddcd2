use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};

use crate::proxy::{LseekOption, ProxyError};
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LseekRequest {
    /// Carried in the URL path
    #[serde(skip)]
    pub fd: u64,
    pub pos: i64,
    pub whence: LseekOption,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LseekResponse {
    pub position: u64,
}

#[tracing::instrument(skip(state))]
pub async fn handler(
    State(state): State<ServiceState>,
    Path(fd): Path<u64>,
    Json(body): Json<LseekRequest>,
) -> Result<impl IntoResponse, ProxyError> {
    let position = state.proxy().lseek(fd, body.pos, body.whence).await?;
    Ok(Json(LseekResponse { position }))
}

impl ApiRequest for LseekRequest {
    type Response = LseekResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join(&format!("/api/v0/fd/{}/lseek", self.fd))?;
        Ok(client.post(full_url).json(&self))
    }
}
