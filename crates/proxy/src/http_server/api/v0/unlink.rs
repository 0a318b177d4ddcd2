use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};

use crate::proxy::ProxyError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlinkRequest {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlinkResponse {
    pub path: String,
}

#[tracing::instrument(skip(state))]
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<UnlinkRequest>,
) -> Result<impl IntoResponse, ProxyError> {
    state.proxy().unlink(&req.path).await?;
    Ok(Json(UnlinkResponse { path: req.path }))
}

impl ApiRequest for UnlinkRequest {
    type Response = UnlinkResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/unlink")?;
        Ok(client.post(full_url).json(&self))
    }
}
