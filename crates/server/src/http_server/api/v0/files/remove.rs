use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};
use common::remote::RemoteStatus;

use super::PathQuery;
use crate::store::StoreError;
use crate::ServiceState;

/// Request to delete a master copy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: RemoteStatus,
}

#[tracing::instrument(skip(state))]
pub async fn handler(
    State(state): State<ServiceState>,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse, StoreError> {
    let status = state.store().delete(&query.path).await?;
    Ok(Json(DeleteResponse { status }))
}

impl ApiRequest for DeleteRequest {
    type Response = DeleteResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/files")?;
        Ok(client.delete(full_url).query(&[("path", self.path)]))
    }
}
