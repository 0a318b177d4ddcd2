use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::api::{ApiError, ApiRequest};

use crate::ServiceState;

/// A client is going away; close whatever it left open
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDoneRequest {
    pub client: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDoneResponse {
    pub closed: usize,
}

#[tracing::instrument(skip(state))]
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<ClientDoneRequest>,
) -> impl IntoResponse {
    let closed = state.proxy().client_done(&req.client).await;
    Json(ClientDoneResponse { closed })
}

impl ApiRequest for ClientDoneRequest {
    type Response = ClientDoneResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/client/done")?;
        Ok(client.post(full_url).json(&self))
    }
}
