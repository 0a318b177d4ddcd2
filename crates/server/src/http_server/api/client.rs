//! [`RemoteStore`] over the server's HTTP API
//!
//! This is what a proxy uses to reach a remote `cachefs-server`. Connection
//! failures surface as [`RemoteError::Transport`]; error statuses returned by
//! the server surface as [`RemoteError::Server`].

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use common::api::{ApiClient, ApiError};
use common::remote::{RemoteError, RemoteFileInfo, RemoteStatus, RemoteStore};

use super::v0::files::{
    CreateRequest, DeleteRequest, FetchChunkRequest, FetchRequest, InfoRequest,
    UploadChunkRequest, UploadRequest,
};

#[derive(Debug, Clone)]
pub struct RemoteClient {
    api: ApiClient,
}

impl RemoteClient {
    pub fn new(server: &Url) -> Result<Self, ApiError> {
        Ok(Self {
            api: ApiClient::new(server)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        self.api.base_url()
    }
}

fn remote_error(e: ApiError) -> RemoteError {
    match e {
        ApiError::HttpStatus(status, body) => {
            RemoteError::Server(format!("{}: {}", status, body))
        }
        other => RemoteError::Transport(other.to_string()),
    }
}

#[async_trait]
impl RemoteStore for RemoteClient {
    async fn get_file_info(&self, path: &str) -> Result<RemoteFileInfo, RemoteError> {
        self.api
            .call(InfoRequest {
                path: path.to_string(),
            })
            .await
            .map_err(remote_error)
    }

    async fn get_file(&self, path: &str) -> Result<Bytes, RemoteError> {
        self.api
            .call_raw(FetchRequest {
                path: path.to_string(),
            })
            .await
            .map_err(remote_error)
    }

    async fn get_file_chunk(&self, path: &str, offset: u64) -> Result<Bytes, RemoteError> {
        self.api
            .call_raw(FetchChunkRequest {
                path: path.to_string(),
                offset,
            })
            .await
            .map_err(remote_error)
    }

    async fn create_file(&self, path: &str) -> Result<RemoteStatus, RemoteError> {
        let response = self
            .api
            .call(CreateRequest {
                path: path.to_string(),
            })
            .await
            .map_err(remote_error)?;
        Ok(response.status)
    }

    async fn upload_file(&self, path: &str, data: Bytes) -> Result<u64, RemoteError> {
        let response = self
            .api
            .call(UploadRequest {
                path: path.to_string(),
                data,
            })
            .await
            .map_err(remote_error)?;
        Ok(response.version)
    }

    async fn upload_file_chunk(
        &self,
        path: &str,
        data: Bytes,
        offset: u64,
        finished: bool,
    ) -> Result<Option<u64>, RemoteError> {
        let response = self
            .api
            .call(UploadChunkRequest {
                path: path.to_string(),
                data,
                offset,
                finished,
            })
            .await
            .map_err(remote_error)?;
        Ok(response.version)
    }

    async fn delete_file(&self, path: &str) -> Result<RemoteStatus, RemoteError> {
        let response = self
            .api
            .call(DeleteRequest {
                path: path.to_string(),
            })
            .await
            .map_err(remote_error)?;
        Ok(response.status)
    }
}
