use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};

use crate::cache::CacheStats;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsRequest {}

pub async fn handler(State(state): State<ServiceState>) -> impl IntoResponse {
    Json(state.proxy().stats())
}

impl ApiRequest for CacheStatsRequest {
    type Response = CacheStats;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/cache/stats")?;
        Ok(client.get(full_url))
    }
}
