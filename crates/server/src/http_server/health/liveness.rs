use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivezRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivezResponse {
    pub status: String,
}

impl LivezResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

impl ApiRequest for LivezRequest {
    type Response = LivezResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/_status/livez")?;
        Ok(client.get(full_url))
    }
}

/// Answers `ok` for as long as the process serves requests. Shared by the
/// server and the proxy.
#[tracing::instrument]
pub async fn handler() -> Json<LivezResponse> {
    Json(LivezResponse::ok())
}
