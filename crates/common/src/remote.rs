//! Contract between the caching proxy and the master-copy server
//!
//! The proxy never touches the master copies directly. Everything it knows
//! about a file comes through a [`RemoteStore`]: metadata (existence, kind,
//! version, size), whole-file and chunked content, and the mutating calls that
//! create, upload and delete master copies. Versions are assigned by the
//! server and only ever grow for a given path.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Size of a single chunk for chunked transfers (200 KiB).
pub const CHUNK_SIZE: u64 = 204_800;

/// Files larger than this are transferred in [`CHUNK_SIZE`] pieces.
pub const HUGE_FILE_SIZE: u64 = 10_000_000;

/// Metadata the server reports for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileInfo {
    /// Whether anything exists at the path
    pub exists: bool,
    /// Whether the path is a directory
    pub is_dir: bool,
    /// Current master-copy version
    pub version: u64,
    /// Size in bytes (0 when absent)
    pub size: u64,
    /// False when the path resolves outside the server root
    pub path_valid: bool,
}

impl RemoteFileInfo {
    /// Metadata for a path that was rejected before resolution.
    pub fn invalid() -> Self {
        Self {
            exists: false,
            is_dir: false,
            version: 0,
            size: 0,
            path_valid: false,
        }
    }
}

/// Status returned by create and delete
///
/// On the wire these are the integer codes `0`, `-1` and `-2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum RemoteStatus {
    /// The operation succeeded
    Ok,
    /// The target (or its parent, for create) does not exist
    NotFound,
    /// The server refused the operation
    PermissionDenied,
}

impl RemoteStatus {
    pub fn code(self) -> i32 {
        match self {
            RemoteStatus::Ok => 0,
            RemoteStatus::NotFound => -1,
            RemoteStatus::PermissionDenied => -2,
        }
    }

    pub fn is_ok(self) -> bool {
        matches!(self, RemoteStatus::Ok)
    }
}

impl From<RemoteStatus> for i32 {
    fn from(status: RemoteStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i32> for RemoteStatus {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(RemoteStatus::Ok),
            -1 => Ok(RemoteStatus::NotFound),
            -2 => Ok(RemoteStatus::PermissionDenied),
            other => Err(format!("unknown remote status code: {}", other)),
        }
    }
}

/// Failure talking to (or inside) the remote store
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// The request never produced a usable answer
    #[error("transport error: {0}")]
    Transport(String),
    /// The server answered but could not carry out the request
    #[error("server error: {0}")]
    Server(String),
}

/// The remote master-copy store as seen by the proxy
#[async_trait]
pub trait RemoteStore: std::fmt::Debug + Send + Sync {
    /// Current metadata for `path`.
    async fn get_file_info(&self, path: &str) -> Result<RemoteFileInfo, RemoteError>;

    /// Whole content of `path`.
    async fn get_file(&self, path: &str) -> Result<Bytes, RemoteError>;

    /// Up to [`CHUNK_SIZE`] bytes of `path` starting at `offset`.
    async fn get_file_chunk(&self, path: &str, offset: u64) -> Result<Bytes, RemoteError>;

    /// Create an empty master copy at `path`.
    async fn create_file(&self, path: &str) -> Result<RemoteStatus, RemoteError>;

    /// Replace the master copy and return its new version.
    async fn upload_file(&self, path: &str, data: Bytes) -> Result<u64, RemoteError>;

    /// Write one chunk of a large upload.
    ///
    /// A chunk at offset 0 truncates the master copy. The version is bumped
    /// and returned only when `finished` is set.
    async fn upload_file_chunk(
        &self,
        path: &str,
        data: Bytes,
        offset: u64,
        finished: bool,
    ) -> Result<Option<u64>, RemoteError>;

    /// Remove the master copy at `path`.
    async fn delete_file(&self, path: &str) -> Result<RemoteStatus, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_codes() {
        assert_eq!(serde_json::to_string(&RemoteStatus::Ok).unwrap(), "0");
        assert_eq!(serde_json::to_string(&RemoteStatus::NotFound).unwrap(), "-1");
        assert_eq!(
            serde_json::from_str::<RemoteStatus>("-2").unwrap(),
            RemoteStatus::PermissionDenied
        );
        assert!(serde_json::from_str::<RemoteStatus>("7").is_err());
    }

    #[test]
    fn test_invalid_info() {
        let info = RemoteFileInfo::invalid();
        assert!(!info.path_valid);
        assert!(!info.exists);
    }
}
