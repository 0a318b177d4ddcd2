use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};
use common::remote::RemoteStatus;

use crate::store::StoreError;
use crate::ServiceState;

/// Request to create an empty master copy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub status: RemoteStatus,
}

#[tracing::instrument(skip(state))]
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<CreateRequest>,
) -> Result<impl IntoResponse, StoreError> {
    let status = state.store().create(&req.path).await?;
    Ok(Json(CreateResponse { status }))
}

impl ApiRequest for CreateRequest {
    type Response = CreateResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/files/create")?;
        Ok(client.post(full_url).json(&self))
    }
}
