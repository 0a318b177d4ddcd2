use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};
use common::build_info;
use common::version::BuildInfo;

/// Request type for the version endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRequest {}

impl ApiRequest for VersionRequest {
    type Response = BuildInfo;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/_status/version")?;
        Ok(client.get(full_url))
    }
}

#[tracing::instrument]
pub async fn handler() -> Response {
    (StatusCode::OK, Json(build_info!())).into_response()
}
