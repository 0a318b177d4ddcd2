//! Master-copy store and version authority
//!
//! The store owns the authoritative copy of every file under a single root
//! directory. It is the only component that assigns versions: each path has a
//! counter that starts at 1 the first time the path is seen and grows by one on
//! every create and completed upload. Counters survive deletes, so a file that
//! is deleted and re-created never reuses a version a proxy may still hold in
//! its cache.
//!
//! Create, upload, delete and reads of the same path are serialized through a
//! per-path async mutex. Different paths proceed in parallel.

use std::collections::HashMap;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use common::path::{normalize, PathError};
use common::remote::{RemoteError, RemoteFileInfo, RemoteStatus, RemoteStore, CHUNK_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),
    #[error("no such file: {0}")]
    NotFound(String),
    #[error("is a directory: {0}")]
    IsDirectory(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for RemoteError {
    fn from(e: StoreError) -> Self {
        RemoteError::Server(e.to_string())
    }
}

/// Authoritative file store rooted at a single directory
#[derive(Debug)]
pub struct MasterStore {
    root: PathBuf,
    /// Normalized path → current version
    versions: Mutex<HashMap<String, u64>>,
    /// Normalized path → serialization domain
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MasterStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(root.as_ref()).await?;
        let root = tokio::fs::canonicalize(root.as_ref()).await?;
        tracing::info!(root = %root.display(), "master store opened");

        Ok(Self {
            root,
            versions: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<(String, PathBuf), StoreError> {
        let key = normalize(path)?;
        let full = if key.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&key)
        };
        Ok((key, full))
    }

    /// Serialize mutations of `key`. The lock entry is dropped again once no
    /// task holds or waits for it.
    async fn lock_path(&self, key: &str) -> PathGuard<'_> {
        let lock = self
            .locks
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        PathGuard {
            locks: &self.locks,
            key: key.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    fn current_version(&self, key: &str) -> u64 {
        *self.versions.lock().entry(key.to_string()).or_insert(1)
    }

    fn bump_version(&self, key: &str) -> u64 {
        let mut versions = self.versions.lock();
        let version = versions
            .entry(key.to_string())
            .and_modify(|v| *v += 1)
            .or_insert(1);
        *version
    }

    /// Metadata for `path`. Paths outside the root report `path_valid = false`.
    pub async fn info(&self, path: &str) -> Result<RemoteFileInfo, StoreError> {
        let (key, full) = match self.resolve(path) {
            Ok(resolved) => resolved,
            Err(StoreError::InvalidPath(e)) => {
                tracing::warn!(path, error = %e, "rejecting path outside root");
                return Ok(RemoteFileInfo::invalid());
            }
            Err(e) => return Err(e),
        };

        let version = self.current_version(&key);
        let info = match tokio::fs::metadata(&full).await {
            Ok(meta) => RemoteFileInfo {
                exists: true,
                is_dir: meta.is_dir(),
                version,
                size: if meta.is_dir() { 0 } else { meta.len() },
                path_valid: true,
            },
            Err(e) if e.kind() == ErrorKind::NotFound => RemoteFileInfo {
                exists: false,
                is_dir: false,
                version,
                size: 0,
                path_valid: true,
            },
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %key, ?info, "file info");
        Ok(info)
    }

    /// Whole content of a regular file.
    pub async fn read(&self, path: &str) -> Result<Bytes, StoreError> {
        let (key, full) = self.resolve(path)?;
        let _guard = self.lock_path(&key).await;

        Self::ensure_regular_file(&key, &full).await?;
        let data = tokio::fs::read(&full).await?;
        tracing::debug!(path = %key, size = data.len(), "serving file");
        Ok(Bytes::from(data))
    }

    /// Up to [`CHUNK_SIZE`] bytes starting at `offset`.
    pub async fn read_chunk(&self, path: &str, offset: u64) -> Result<Bytes, StoreError> {
        let (key, full) = self.resolve(path)?;
        let _guard = self.lock_path(&key).await;

        Self::ensure_regular_file(&key, &full).await?;
        let mut file = tokio::fs::File::open(&full).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut data = Vec::with_capacity(CHUNK_SIZE as usize);
        file.take(CHUNK_SIZE).read_to_end(&mut data).await?;
        tracing::debug!(path = %key, offset, size = data.len(), "serving chunk");
        Ok(Bytes::from(data))
    }

    /// Create an empty file. Creating a file that already exists succeeds
    /// without changing its version.
    pub async fn create(&self, path: &str) -> Result<RemoteStatus, StoreError> {
        let (key, full) = self.resolve(path)?;
        if key.is_empty() {
            return Ok(RemoteStatus::PermissionDenied);
        }
        let _guard = self.lock_path(&key).await;

        let result = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await;

        match result {
            Ok(_) => {
                let version = self.bump_version(&key);
                tracing::info!(path = %key, version, "created file");
                Ok(RemoteStatus::Ok)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(path = %key, "create on existing file");
                Ok(RemoteStatus::Ok)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %key, "create failed, parent missing");
                Ok(RemoteStatus::NotFound)
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                tracing::warn!(path = %key, "create failed, permission denied");
                Ok(RemoteStatus::PermissionDenied)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the whole file and return its new version.
    pub async fn write(&self, path: &str, data: Bytes) -> Result<u64, StoreError> {
        let (key, full) = self.resolve(path)?;
        let _guard = self.lock_path(&key).await;

        Self::ensure_not_dir(&key, &full).await?;
        tokio::fs::write(&full, &data).await?;
        let version = self.bump_version(&key);
        tracing::info!(path = %key, size = data.len(), version, "master copy updated");
        Ok(version)
    }

    /// Write one chunk of a large upload.
    pub async fn write_chunk(
        &self,
        path: &str,
        data: Bytes,
        offset: u64,
        finished: bool,
    ) -> Result<Option<u64>, StoreError> {
        let (key, full) = self.resolve(path)?;
        let _guard = self.lock_path(&key).await;

        Self::ensure_not_dir(&key, &full).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(offset == 0)
            .open(&full)
            .await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        if !finished {
            tracing::debug!(path = %key, offset, size = data.len(), "chunk written");
            return Ok(None);
        }

        let version = self.bump_version(&key);
        tracing::info!(path = %key, version, "chunked upload finished");
        Ok(Some(version))
    }

    /// Delete a file or an empty directory.
    pub async fn delete(&self, path: &str) -> Result<RemoteStatus, StoreError> {
        let (key, full) = self.resolve(path)?;
        if key.is_empty() {
            return Ok(RemoteStatus::PermissionDenied);
        }
        let _guard = self.lock_path(&key).await;

        let meta = match tokio::fs::metadata(&full).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RemoteStatus::NotFound),
            Err(e) => return Err(e.into()),
        };

        let result = if meta.is_dir() {
            tokio::fs::remove_dir(&full).await
        } else {
            tokio::fs::remove_file(&full).await
        };

        match result {
            Ok(()) => {
                tracing::info!(path = %key, "deleted");
                Ok(RemoteStatus::Ok)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(RemoteStatus::NotFound),
            Err(e) => {
                tracing::warn!(path = %key, error = %e, "delete refused");
                Ok(RemoteStatus::PermissionDenied)
            }
        }
    }

    async fn ensure_regular_file(key: &str, full: &Path) -> Result<(), StoreError> {
        match tokio::fs::metadata(full).await {
            Ok(meta) if meta.is_dir() => Err(StoreError::IsDirectory(key.to_string())),
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_not_dir(key: &str, full: &Path) -> Result<(), StoreError> {
        match tokio::fs::metadata(full).await {
            Ok(meta) if meta.is_dir() => Err(StoreError::IsDirectory(key.to_string())),
            _ => Ok(()),
        }
    }
}

/// Held for the duration of one mutation of a path
struct PathGuard<'a> {
    locks: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    key: String,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock();
        // only the map's own reference left: nobody holds or waits for it
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

#[async_trait]
impl RemoteStore for MasterStore {
    async fn get_file_info(&self, path: &str) -> Result<RemoteFileInfo, RemoteError> {
        Ok(self.info(path).await?)
    }

    async fn get_file(&self, path: &str) -> Result<Bytes, RemoteError> {
        Ok(self.read(path).await?)
    }

    async fn get_file_chunk(&self, path: &str, offset: u64) -> Result<Bytes, RemoteError> {
        Ok(self.read_chunk(path, offset).await?)
    }

    async fn create_file(&self, path: &str) -> Result<RemoteStatus, RemoteError> {
        Ok(self.create(path).await?)
    }

    async fn upload_file(&self, path: &str, data: Bytes) -> Result<u64, RemoteError> {
        Ok(self.write(path, data).await?)
    }

    async fn upload_file_chunk(
        &self,
        path: &str,
        data: Bytes,
        offset: u64,
        finished: bool,
    ) -> Result<Option<u64>, RemoteError> {
        Ok(self.write_chunk(path, data, offset, finished).await?)
    }

    async fn delete_file(&self, path: &str) -> Result<RemoteStatus, RemoteError> {
        Ok(self.delete(path).await?)
    }
}
