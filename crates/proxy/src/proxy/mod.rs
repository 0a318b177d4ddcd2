//! Open/close consistency protocol
//!
//! Every open asks the server for the current version of the path and serves
//! the handle from a read-only cached copy of exactly that version, fetching
//! it on a miss. Write handles get a private copy; on close the copy is
//! uploaded and becomes the cached copy of the version the server assigned.
//!
//! Open, close and unlink run one at a time per proxy, so two opens can never
//! both decide to fetch the same version. Reads, writes and seeks only lock
//! their own handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::fs::File;

use common::remote::{RemoteFileInfo, RemoteStatus, RemoteStore, HUGE_FILE_SIZE};

use crate::cache::{Cache, CacheError, CacheStats, CachedEntry};

pub mod error;
pub mod handle;
pub mod transfer;

pub use error::ProxyError;
pub use handle::{HandleTable, LseekOption, OpenHandle, OpenOption};

use handle::Backing;

#[derive(Debug)]
pub struct Proxy {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<Cache>,
    handles: HandleTable,
    protocol: tokio::sync::Mutex<()>,
    chunk_threshold: u64,
}

impl Proxy {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<Cache>) -> Self {
        Self {
            remote,
            cache,
            handles: HandleTable::new(),
            protocol: tokio::sync::Mutex::new(()),
            chunk_threshold: HUGE_FILE_SIZE,
        }
    }

    /// Transfer files larger than `threshold` bytes in chunks.
    pub fn with_chunk_threshold(mut self, threshold: u64) -> Self {
        self.chunk_threshold = threshold;
        self
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Open `path` and return a new descriptor.
    #[tracing::instrument(skip(self))]
    pub async fn open(
        &self,
        path: &str,
        option: OpenOption,
        client: Option<String>,
    ) -> Result<u64, ProxyError> {
        let logical = common::normalize(path)?;
        let _protocol = self.protocol.lock().await;

        let mut info = self.remote_info(&logical).await?;
        if info.exists {
            if option == OpenOption::CreateExclusive {
                return Err(ProxyError::AlreadyExists(logical));
            }
            if info.is_dir && option != OpenOption::Read {
                return Err(ProxyError::IsDirectory(logical));
            }
        } else {
            if !option.creates() {
                return Err(ProxyError::NotFound(logical));
            }
            info = self.create_remote(&logical).await?;
        }

        let id = self.handles.allocate();
        if info.is_dir {
            tracing::debug!(fd = id, path = %logical, "directory handle");
            self.handles.insert(OpenHandle::new(
                id,
                logical,
                option,
                client,
                Backing::Directory,
            ));
            return Ok(id);
        }

        let read_only = self.ensure_cached(&logical, &info).await?;
        let backing = if option.is_write() {
            self.carve_write_copy(&logical, &read_only, info.version, id)
                .await?
        } else {
            self.open_read_only(read_only).await?
        };

        tracing::debug!(fd = id, path = %logical, version = info.version, "opened");
        self.handles
            .insert(OpenHandle::new(id, logical, option, client, backing));
        Ok(id)
    }

    /// Close a descriptor, writing back modifications.
    #[tracing::instrument(skip(self))]
    pub async fn close(&self, fd: u64) -> Result<(), ProxyError> {
        let _protocol = self.protocol.lock().await;
        let shared = self.handles.remove(fd)?;
        let mut handle = shared.lock().await;

        let flushed = if matches!(handle.backing, Backing::WriteCopy { .. }) {
            Some(handle.flush().await)
        } else {
            None
        };
        let logical = handle.logical_path.clone();

        match handle.release() {
            Backing::Closed => Err(ProxyError::BadHandle(fd)),
            Backing::Directory => Ok(()),
            Backing::ReadOnly { physical, file } => {
                drop(file);
                self.release_read_only(&logical, &physical);
                Ok(())
            }
            Backing::WriteCopy { physical, file } => {
                drop(file);
                let flushed = flushed.unwrap_or_else(|| {
                    Err(ProxyError::Internal("write copy was not flushed".to_string()))
                });
                self.write_back(&logical, &physical, flushed).await
            }
        }
    }

    pub async fn read(&self, fd: u64, len: usize) -> Result<Vec<u8>, ProxyError> {
        let handle = self.handles.get(fd)?;
        let mut handle = handle.lock().await;
        handle.read(len).await
    }

    pub async fn write(&self, fd: u64, data: &[u8]) -> Result<usize, ProxyError> {
        let handle = self.handles.get(fd)?;
        let mut handle = handle.lock().await;
        handle.write(data).await
    }

    pub async fn lseek(&self, fd: u64, pos: i64, whence: LseekOption) -> Result<u64, ProxyError> {
        let handle = self.handles.get(fd)?;
        let mut handle = handle.lock().await;
        handle.lseek(pos, whence).await
    }

    /// Delete the master copy of `path` and drop its unreferenced cached copies.
    #[tracing::instrument(skip(self))]
    pub async fn unlink(&self, path: &str) -> Result<(), ProxyError> {
        let logical = common::normalize(path)?;
        let _protocol = self.protocol.lock().await;

        match self.remote.delete_file(&logical).await? {
            RemoteStatus::Ok => {
                self.cache.forget(&logical);
                tracing::info!(path = %logical, "unlinked");
                Ok(())
            }
            RemoteStatus::NotFound => Err(ProxyError::NotFound(logical)),
            RemoteStatus::PermissionDenied => Err(ProxyError::PermissionDenied(logical)),
        }
    }

    /// Close every handle still held by `client` and return how many were closed.
    ///
    /// Handles are closed independently; a failed write-back is logged and
    /// does not stop the others.
    #[tracing::instrument(skip(self))]
    pub async fn client_done(&self, client: &str) -> usize {
        let mut owned = Vec::new();
        for (fd, handle) in self.handles.snapshot() {
            if handle.lock().await.client.as_deref() == Some(client) {
                owned.push(fd);
            }
        }

        let mut closed = 0;
        for fd in owned {
            match self.close(fd).await {
                Ok(()) => closed += 1,
                // closed concurrently by the client itself
                Err(ProxyError::BadHandle(_)) => {}
                Err(e) => {
                    tracing::warn!(fd, error = %e, "close on client exit failed");
                    closed += 1;
                }
            }
        }

        tracing::info!(client, closed, "client done");
        closed
    }

    async fn remote_info(&self, logical: &str) -> Result<RemoteFileInfo, ProxyError> {
        let info = self.remote.get_file_info(logical).await?;
        if !info.path_valid {
            return Err(ProxyError::PermissionDenied(logical.to_string()));
        }
        Ok(info)
    }

    async fn create_remote(&self, logical: &str) -> Result<RemoteFileInfo, ProxyError> {
        match self.remote.create_file(logical).await? {
            RemoteStatus::Ok => {}
            RemoteStatus::NotFound => return Err(ProxyError::NotFound(logical.to_string())),
            RemoteStatus::PermissionDenied => {
                return Err(ProxyError::PermissionDenied(logical.to_string()))
            }
        }

        let info = self.remote_info(logical).await?;
        if !info.exists {
            return Err(ProxyError::NotFound(logical.to_string()));
        }
        if info.is_dir {
            return Err(ProxyError::IsDirectory(logical.to_string()));
        }
        tracing::debug!(path = logical, version = info.version, "created on server");
        Ok(info)
    }

    /// Make sure the read-only copy of `info.version` is cached and return its path.
    async fn ensure_cached(
        &self,
        logical: &str,
        info: &RemoteFileInfo,
    ) -> Result<PathBuf, ProxyError> {
        let physical = self.cache.read_only_path(logical, info.version);
        if self.cache.contains(&physical) {
            self.cache.touch(&physical);
            tracing::debug!(path = logical, version = info.version, "cache hit");
            return Ok(physical);
        }

        tracing::debug!(
            path = logical,
            version = info.version,
            local_version = ?self.cache.local_version(logical),
            "cache miss"
        );
        if info.size > self.cache.capacity() {
            return Err(CacheError::Exhausted {
                needed: info.size,
                available: self.cache.remaining_capacity(),
                capacity: self.cache.capacity(),
            }
            .into());
        }
        self.cache.purge_stale_versions(logical, info.version);
        self.cache.reserve(info.size)?;

        let data = transfer::fetch(
            self.remote.as_ref(),
            logical,
            info.size,
            self.chunk_threshold,
        )
        .await?;
        if let Err(e) = tokio::fs::write(&physical, &data).await {
            remove_quietly(&physical).await;
            return Err(e.into());
        }

        let entry = CachedEntry::read_only(logical, physical.clone(), info.version, data.len() as u64);
        if let Err(e) = self.cache.insert(entry) {
            remove_quietly(&physical).await;
            return Err(e.into());
        }

        tracing::info!(
            path = logical,
            version = info.version,
            size = data.len(),
            "fetched into cache"
        );
        Ok(physical)
    }

    async fn open_read_only(&self, physical: PathBuf) -> Result<Backing, ProxyError> {
        if !self.cache.pin(&physical) {
            return Err(ProxyError::Internal(format!(
                "{} vanished from cache",
                physical.display()
            )));
        }
        match File::open(&physical).await {
            Ok(file) => Ok(Backing::ReadOnly { physical, file }),
            Err(e) => {
                self.unpin_logged(&physical);
                Err(e.into())
            }
        }
    }

    /// Duplicate the read-only copy into a write copy owned by handle `id`.
    async fn carve_write_copy(
        &self,
        logical: &str,
        read_only: &Path,
        version: u64,
        id: u64,
    ) -> Result<Backing, ProxyError> {
        if !self.cache.pin(read_only) {
            return Err(ProxyError::Internal(format!(
                "{} vanished from cache",
                read_only.display()
            )));
        }
        let copied = self.copy_pinned(logical, read_only, version, id).await;
        self.unpin_logged(read_only);
        let physical = copied?;

        let opened = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&physical)
            .await;
        match opened {
            Ok(file) => Ok(Backing::WriteCopy { physical, file }),
            Err(e) => {
                if let Err(discard) = self.cache.discard_write(&physical) {
                    tracing::error!(path = %physical.display(), error = %discard, "failed to discard write copy");
                }
                Err(e.into())
            }
        }
    }

    async fn copy_pinned(
        &self,
        logical: &str,
        read_only: &Path,
        version: u64,
        id: u64,
    ) -> Result<PathBuf, ProxyError> {
        let size = self
            .cache
            .lookup(read_only)
            .map(|entry| entry.size)
            .ok_or_else(|| CacheError::UnknownEntry(read_only.to_path_buf()))?;
        self.cache.reserve(size)?;

        let physical = self.cache.write_path(logical, id);
        if let Err(e) = tokio::fs::copy(read_only, &physical).await {
            remove_quietly(&physical).await;
            return Err(e.into());
        }

        let entry = CachedEntry::write_copy(logical, physical.clone(), version, size, id);
        if let Err(e) = self.cache.insert(entry) {
            remove_quietly(&physical).await;
            return Err(e.into());
        }
        tracing::debug!(fd = id, path = logical, version, "write copy created");
        Ok(physical)
    }

    fn release_read_only(&self, logical: &str, physical: &Path) {
        self.cache.touch(physical);
        self.unpin_logged(physical);
        if let Some(newest) = self.cache.local_version(logical) {
            self.cache.purge_stale_versions(logical, newest);
        }
    }

    /// Upload a closed write copy and install it as the new cached version.
    async fn write_back(
        &self,
        logical: &str,
        physical: &Path,
        flushed: Result<u64, ProxyError>,
    ) -> Result<(), ProxyError> {
        let uploaded = match flushed {
            Ok(_) => self.upload_copy(logical, physical).await,
            Err(e) => Err(e),
        };

        let (version, size) = match uploaded {
            Ok(uploaded) => uploaded,
            Err(e) => {
                tracing::warn!(path = logical, error = %e, "write-back failed, discarding write copy");
                if let Err(discard) = self.cache.discard_write(physical) {
                    tracing::error!(path = %physical.display(), error = %discard, "failed to discard write copy");
                }
                return Err(e);
            }
        };

        // The server copy is now the truth; a local failure only loses the cached copy.
        self.cache
            .reconcile_write(physical, version, size)
            .map_err(|e| {
                tracing::error!(path = logical, version, error = %e, "reconcile failed after upload");
                match e {
                    CacheError::Exhausted { .. } => ProxyError::ResourceExhausted(e.to_string()),
                    other => ProxyError::Internal(other.to_string()),
                }
            })?;
        Ok(())
    }

    async fn upload_copy(&self, logical: &str, physical: &Path) -> Result<(u64, u64), ProxyError> {
        let data = Bytes::from(tokio::fs::read(physical).await?);
        let size = data.len() as u64;
        let version =
            transfer::upload(self.remote.as_ref(), logical, data, self.chunk_threshold).await?;
        tracing::info!(path = logical, version, size, "uploaded write copy");
        Ok((version, size))
    }

    fn unpin_logged(&self, physical: &Path) {
        match self.cache.unpin(physical) {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(path = %physical.display(), "unpin of uncached entry");
            }
            Err(e) => {
                tracing::error!(path = %physical.display(), error = %e, "unpin failed");
            }
        }
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove cache file");
        }
    }
}
