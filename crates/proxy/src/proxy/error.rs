use common::{PathError, RemoteError};

use crate::cache::CacheError;

pub const EPERM: i32 = -1;
pub const ENOENT: i32 = -2;
pub const EIO: i32 = -5;
pub const EBADF: i32 = -9;
pub const ENOMEM: i32 = -12;
pub const EEXIST: i32 = -17;
pub const EISDIR: i32 = -21;
pub const EINVAL: i32 = -22;

/// Failure of a proxy operation, as seen by the client
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no such file: {0}")]
    NotFound(String),
    #[error("is a directory: {0}")]
    IsDirectory(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("bad file descriptor: {0}")]
    BadHandle(u64),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("remote store unavailable: {0}")]
    Transport(#[from] RemoteError),
    #[error("local io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// Negative errno reported at the handle boundary.
    pub fn errno(&self) -> i32 {
        match self {
            ProxyError::InvalidArgument(_) => EINVAL,
            ProxyError::NotFound(_) => ENOENT,
            ProxyError::IsDirectory(_) => EISDIR,
            ProxyError::AlreadyExists(_) => EEXIST,
            ProxyError::PermissionDenied(_) => EPERM,
            ProxyError::BadHandle(_) => EBADF,
            ProxyError::ResourceExhausted(_) => ENOMEM,
            ProxyError::Transport(_) | ProxyError::Io(_) | ProxyError::Internal(_) => EIO,
        }
    }
}

impl From<CacheError> for ProxyError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Exhausted { .. } => ProxyError::ResourceExhausted(err.to_string()),
            CacheError::Io(e) => ProxyError::Io(e),
            CacheError::UnknownEntry(_)
            | CacheError::RefCountUnderflow(_)
            | CacheError::NotWriteCopy(_) => {
                tracing::error!(error = %err, "cache consistency failure");
                ProxyError::Internal(err.to_string())
            }
        }
    }
}

impl From<PathError> for ProxyError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::Empty => ProxyError::InvalidArgument(err.to_string()),
            PathError::EscapesRoot(_) => ProxyError::PermissionDenied(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(ProxyError::InvalidArgument("x".into()).errno(), -22);
        assert_eq!(ProxyError::NotFound("x".into()).errno(), -2);
        assert_eq!(ProxyError::IsDirectory("x".into()).errno(), -21);
        assert_eq!(ProxyError::AlreadyExists("x".into()).errno(), -17);
        assert_eq!(ProxyError::PermissionDenied("x".into()).errno(), -1);
        assert_eq!(ProxyError::BadHandle(3).errno(), -9);
        assert_eq!(ProxyError::ResourceExhausted("x".into()).errno(), -12);
        assert_eq!(
            ProxyError::Transport(RemoteError::Transport("down".into())).errno(),
            -5
        );
    }

    #[test]
    fn test_cache_error_conversion() {
        let exhausted = CacheError::Exhausted {
            needed: 10,
            available: 1,
            capacity: 5,
        };
        assert!(matches!(
            ProxyError::from(exhausted),
            ProxyError::ResourceExhausted(_)
        ));
        assert!(matches!(
            ProxyError::from(CacheError::RefCountUnderflow(PathBuf::from("a"))),
            ProxyError::Internal(_)
        ));
    }

    #[test]
    fn test_path_error_conversion() {
        assert!(matches!(
            ProxyError::from(PathError::Empty),
            ProxyError::InvalidArgument(_)
        ));
        assert!(matches!(
            ProxyError::from(PathError::EscapesRoot("../x".into())),
            ProxyError::PermissionDenied(_)
        ));
    }
}
