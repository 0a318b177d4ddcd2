//! HTTP request plumbing shared by every cachefs client
//!
//! Each endpoint module defines a request type and implements [`ApiRequest`]
//! (JSON response) or [`RawApiRequest`] (raw byte response) for it, so the
//! route, method and body live next to the handler that serves them.

use bytes::Bytes;
use reqwest::{header::HeaderMap, header::HeaderValue, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

/// A request whose response body is JSON
pub trait ApiRequest {
    type Response: DeserializeOwned;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError>;
}

/// A request whose response body is returned as raw bytes
pub trait RawApiRequest {
    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    pub remote: Url,
    client: Client,
}

impl ApiClient {
    pub fn new(remote: &Url) -> Result<Self, ApiError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder().default_headers(default_headers).build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
        })
    }

    pub async fn call<T: ApiRequest>(&self, request: T) -> Result<T::Response, ApiError> {
        let request_builder = request.build_request(&self.remote, &self.client)?;
        let response = request_builder.send().await?;

        if response.status().is_success() {
            Ok(response.json::<T::Response>().await?)
        } else {
            Err(ApiError::HttpStatus(
                response.status(),
                response.text().await?,
            ))
        }
    }

    pub async fn call_raw<T: RawApiRequest>(&self, request: T) -> Result<Bytes, ApiError> {
        let request_builder = request.build_request(&self.remote, &self.client)?;
        let response = request_builder.send().await?;

        if response.status().is_success() {
            Ok(response.bytes().await?)
        } else {
            Err(ApiError::HttpStatus(
                response.status(),
                response.text().await?,
            ))
        }
    }

    /// Get the base URL for API requests
    pub fn base_url(&self) -> &Url {
        &self.remote
    }

    /// Get the underlying HTTP client for custom requests
    pub fn http_client(&self) -> &Client {
        &self.client
    }
}
