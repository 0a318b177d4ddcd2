use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};
use common::remote::RemoteFileInfo;

use super::PathQuery;
use crate::store::StoreError;
use crate::ServiceState;

/// Request metadata for a path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoRequest {
    pub path: String,
}

#[tracing::instrument(skip(state))]
pub async fn handler(
    State(state): State<ServiceState>,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse, StoreError> {
    let info = state.store().info(&query.path).await?;
    Ok(Json(info))
}

impl ApiRequest for InfoRequest {
    type Response = RemoteFileInfo;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/files/info")?;
        Ok(client.get(full_url).query(&[("path", self.path)]))
    }
}
