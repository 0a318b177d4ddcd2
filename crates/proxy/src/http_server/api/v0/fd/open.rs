use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};

use crate::proxy::{OpenOption, ProxyError};
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRequest {
    pub path: String,
    pub option: OpenOption,
    /// Session tag used by `client/done`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenResponse {
    pub fd: u64,
}

#[tracing::instrument(skip(state))]
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<OpenRequest>,
) -> Result<impl IntoResponse, ProxyError> {
    let fd = state.proxy().open(&req.path, req.option, req.client).await?;
    Ok(Json(OpenResponse { fd }))
}

impl ApiRequest for OpenRequest {
    type Response = OpenResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/fd/open")?;
        Ok(client.post(full_url).json(&self))
    }
}
