//! Capacity-bounded on-disk cache of server files
//!
//! Every physical file in the cache directory is described by one
//! [`CachedEntry`], keyed by its physical path. Entries live in an LRU order
//! and carry a reference count: an entry with open handles is pinned and is
//! never evicted, purged or deleted from disk.
//!
//! Two kinds of copy coexist for the same logical path:
//!
//! - read-only copies, one per server version (`<path>_rdonly_<version>`)
//! - write copies, one per open write handle (`<path>_wr_<handle>`)
//!
//! When a write handle closes, [`Cache::reconcile_write`] turns its write copy
//! into the read-only copy of the version the server assigned on upload and
//! retires the older versions nobody is reading any more.
//!
//! All state sits behind one mutex. Composite operations (reconcile, reserve)
//! hold it for their whole duration so no other caller can observe a
//! half-applied change.

mod entry;
pub mod naming;

pub use entry::{CachedEntry, EntryKind};

use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Versions below the newest that a purge checks on disk for untracked files
const ORPHAN_SCAN_WINDOW: u64 = 8;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache exhausted: {needed} bytes needed, {available} of {capacity} available")]
    Exhausted {
        needed: u64,
        available: u64,
        capacity: u64,
    },
    #[error("no cache entry for {0}")]
    UnknownEntry(PathBuf),
    #[error("reference count underflow on {0}")]
    RefCountUnderflow(PathBuf),
    #[error("not a write copy: {0}")]
    NotWriteCopy(PathBuf),
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Point-in-time cache counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub capacity: u64,
    pub current_size: u64,
    pub entries: usize,
    pub read_only: usize,
    pub write_copies: usize,
    pub pinned: usize,
}

pub struct Cache {
    dir: PathBuf,
    capacity: u64,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    /// Physical path → entry, most recently used first
    entries: LruCache<PathBuf, CachedEntry>,
    current_size: u64,
    /// Logical path → versions with a read-only entry
    versions: HashMap<String, BTreeSet<u64>>,
}

impl Cache {
    /// Create an empty cache over `dir` holding at most `capacity` bytes.
    pub fn new(dir: impl Into<PathBuf>, capacity: u64) -> Self {
        Self {
            dir: dir.into(),
            capacity,
            inner: Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                current_size: 0,
                versions: HashMap::new(),
            }),
        }
    }

    /// Create the cache directory and clear cache files left by an earlier run.
    ///
    /// Cache state is not recovered across restarts, so leftovers would only
    /// ever show up as orphans. Files that do not carry a cache name are left
    /// untouched.
    pub async fn open(dir: impl Into<PathBuf>, capacity: u64) -> Result<Self, CacheError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut removed = 0usize;
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(item) = read_dir.next_entry().await? {
            let name = item.file_name();
            let Some(name) = name.to_str() else { continue };
            if naming::parse(name).is_some() && item.file_type().await?.is_file() {
                tokio::fs::remove_file(item.path()).await?;
                removed += 1;
            }
        }

        tracing::info!(
            dir = %dir.display(),
            capacity,
            stale_files_removed = removed,
            "cache opened"
        );
        Ok(Self::new(dir, capacity))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Physical path of the read-only copy of `logical` at `version`.
    pub fn read_only_path(&self, logical: &str, version: u64) -> PathBuf {
        naming::read_only_path(&self.dir, logical, version)
    }

    /// Physical path of the write copy owned by `handle`.
    pub fn write_path(&self, logical: &str, handle: u64) -> PathBuf {
        naming::write_path(&self.dir, logical, handle)
    }

    pub fn contains(&self, physical: &Path) -> bool {
        self.inner.lock().entries.contains(physical)
    }

    /// Newest version of `logical` with a read-only entry.
    pub fn local_version(&self, logical: &str) -> Option<u64> {
        self.inner
            .lock()
            .versions
            .get(logical)
            .and_then(|versions| versions.last().copied())
    }

    /// Copy of the entry at `physical`, without touching the LRU order.
    pub fn lookup(&self, physical: &Path) -> Option<CachedEntry> {
        self.inner.lock().entries.peek(physical).cloned()
    }

    /// Add an entry, evicting unpinned entries first if it does not fit.
    ///
    /// Inserting a physical path that is already cached is a no-op and returns
    /// `Ok(false)`.
    pub fn insert(&self, entry: CachedEntry) -> Result<bool, CacheError> {
        let mut inner = self.inner.lock();
        if inner.entries.contains(&entry.physical_path) {
            tracing::debug!(path = %entry.physical_path.display(), "already cached");
            return Ok(false);
        }

        self.make_room(&mut inner, entry.size)?;
        tracing::debug!(
            path = %entry.physical_path.display(),
            version = entry.version,
            size = entry.size,
            "cache insert"
        );
        inner.insert_entry(entry);
        Ok(true)
    }

    /// Mark an entry most recently used. Returns false if it is not cached.
    pub fn touch(&self, physical: &Path) -> bool {
        let mut inner = self.inner.lock();
        if !inner.entries.contains(physical) {
            return false;
        }
        inner.entries.promote(physical);
        true
    }

    /// Add one reference. Returns false if the entry is not cached.
    pub fn pin(&self, physical: &Path) -> bool {
        match self.inner.lock().entries.peek_mut(physical) {
            Some(entry) => {
                entry.ref_count += 1;
                true
            }
            None => false,
        }
    }

    /// Drop one reference. Returns `Ok(false)` if the entry is not cached.
    pub fn unpin(&self, physical: &Path) -> Result<bool, CacheError> {
        self.inner.lock().unpin(physical)
    }

    pub fn current_size(&self) -> u64 {
        self.inner.lock().current_size
    }

    pub fn remaining_capacity(&self) -> u64 {
        self.capacity.saturating_sub(self.inner.lock().current_size)
    }

    /// Evict unpinned entries, least recently used first, until `needed`
    /// bytes are free. Returns whether enough space was freed.
    pub fn evict(&self, needed: u64) -> bool {
        self.inner.lock().evict(self.capacity, needed)
    }

    /// Make sure `needed` bytes are free, evicting if necessary.
    pub fn reserve(&self, needed: u64) -> Result<(), CacheError> {
        let mut inner = self.inner.lock();
        self.make_room(&mut inner, needed)
    }

    /// Delete every unpinned read-only copy of `logical` older than
    /// `newest_version`.
    pub fn purge_stale_versions(&self, logical: &str, newest_version: u64) {
        self.inner
            .lock()
            .purge_stale(&self.dir, logical, newest_version);
    }

    /// Delete every unpinned read-only copy of `logical`.
    pub fn forget(&self, logical: &str) {
        let mut inner = self.inner.lock();
        let Some(newest) = inner.versions.get(logical).and_then(|v| v.last().copied()) else {
            return;
        };
        inner.purge_stale(&self.dir, logical, newest.saturating_add(1));
    }

    /// Turn a write copy into the read-only copy of `new_version`.
    ///
    /// The write entry leaves the cache accounting first, then stale versions
    /// are purged and room is made for `new_size` bytes. If room cannot be
    /// made the write file is deleted and [`CacheError::Exhausted`] returned.
    /// Otherwise the file is renamed into place, inserted as most recently
    /// used, and the owning handle's reference is released. Returns the final
    /// physical path.
    pub fn reconcile_write(
        &self,
        write_path: &Path,
        new_version: u64,
        new_size: u64,
    ) -> Result<PathBuf, CacheError> {
        let mut inner = self.inner.lock();

        let write_entry = inner
            .entries
            .peek(write_path)
            .cloned()
            .ok_or_else(|| CacheError::UnknownEntry(write_path.to_path_buf()))?;
        if write_entry.is_read_only() {
            return Err(CacheError::NotWriteCopy(write_path.to_path_buf()));
        }
        inner.remove_entry(write_path);

        let logical = write_entry.logical_path.as_str();
        let final_path = self.read_only_path(logical, new_version);
        inner.purge_stale(&self.dir, logical, new_version);

        if inner.entries.contains(&final_path) {
            tracing::warn!(
                path = %final_path.display(),
                "version already cached, dropping write copy"
            );
            delete_file(write_path);
            inner.entries.promote(&final_path);
            return Ok(final_path);
        }

        if let Err(e) = self.make_room(&mut inner, new_size) {
            tracing::warn!(
                path = %write_path.display(),
                new_version,
                error = %e,
                "no room for reconciled copy"
            );
            delete_file(write_path);
            return Err(e);
        }

        if let Err(e) = std::fs::rename(write_path, &final_path) {
            delete_file(write_path);
            return Err(e.into());
        }

        let mut entry = CachedEntry::read_only(logical, final_path.clone(), new_version, new_size);
        entry.ref_count = write_entry.ref_count;
        inner.insert_entry(entry);

        // The new copy is installed; now release the closing handle's pin.
        if let Err(e) = inner.unpin(&final_path) {
            tracing::error!(path = %final_path.display(), error = %e, "reconciled entry was not pinned");
        }

        tracing::info!(
            logical,
            version = new_version,
            size = new_size,
            "write copy reconciled"
        );
        Ok(final_path)
    }

    /// Release the owning handle's pin on a write copy and delete it.
    ///
    /// Used when a write handle closes without a successful upload.
    pub fn discard_write(&self, write_path: &Path) -> Result<(), CacheError> {
        let mut inner = self.inner.lock();
        match inner.entries.peek(write_path) {
            None => return Err(CacheError::UnknownEntry(write_path.to_path_buf())),
            Some(entry) if entry.is_read_only() => {
                return Err(CacheError::NotWriteCopy(write_path.to_path_buf()))
            }
            Some(_) => {}
        }

        inner.unpin(write_path)?;
        let still_pinned = inner
            .entries
            .peek(write_path)
            .map(CachedEntry::is_pinned)
            .unwrap_or(false);
        if still_pinned {
            tracing::error!(path = %write_path.display(), "write copy pinned by another handle");
            return Ok(());
        }

        inner.remove_entry(write_path);
        delete_file(write_path);
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut stats = CacheStats {
            capacity: self.capacity,
            current_size: inner.current_size,
            entries: inner.entries.len(),
            read_only: 0,
            write_copies: 0,
            pinned: 0,
        };
        for (_, entry) in inner.entries.iter() {
            if entry.is_read_only() {
                stats.read_only += 1;
            } else {
                stats.write_copies += 1;
            }
            if entry.is_pinned() {
                stats.pinned += 1;
            }
        }
        stats
    }

    fn make_room(&self, inner: &mut CacheInner, needed: u64) -> Result<(), CacheError> {
        if needed > self.capacity || !inner.evict(self.capacity, needed) {
            return Err(CacheError::Exhausted {
                needed,
                available: self.capacity.saturating_sub(inner.current_size),
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Cache")
            .field("dir", &self.dir)
            .field("capacity", &self.capacity)
            .field("current_size", &inner.current_size)
            .field("entries", &inner.entries.len())
            .finish()
    }
}

impl CacheInner {
    fn insert_entry(&mut self, entry: CachedEntry) {
        self.current_size += entry.size;
        if entry.is_read_only() {
            self.versions
                .entry(entry.logical_path.clone())
                .or_default()
                .insert(entry.version);
        }
        self.entries.put(entry.physical_path.clone(), entry);
    }

    /// Remove from map, LRU order and accounting. The file stays on disk.
    fn remove_entry(&mut self, physical: &Path) -> Option<CachedEntry> {
        let entry = self.entries.pop(physical)?;

        self.current_size = match self.current_size.checked_sub(entry.size) {
            Some(size) => size,
            None => {
                tracing::error!(
                    path = %physical.display(),
                    size = entry.size,
                    current_size = self.current_size,
                    "cache size accounting underflow"
                );
                0
            }
        };

        if entry.is_read_only() {
            if let Some(versions) = self.versions.get_mut(&entry.logical_path) {
                versions.remove(&entry.version);
                if versions.is_empty() {
                    self.versions.remove(&entry.logical_path);
                }
            }
        }
        Some(entry)
    }

    fn unpin(&mut self, physical: &Path) -> Result<bool, CacheError> {
        let Some(entry) = self.entries.peek_mut(physical) else {
            return Ok(false);
        };
        if entry.ref_count == 0 {
            tracing::error!(path = %physical.display(), "unpin of unreferenced entry");
            return Err(CacheError::RefCountUnderflow(physical.to_path_buf()));
        }
        entry.ref_count -= 1;
        Ok(true)
    }

    fn evict(&mut self, capacity: u64, needed: u64) -> bool {
        let remaining = capacity.saturating_sub(self.current_size);
        if remaining >= needed {
            return true;
        }

        let deficit = needed - remaining;
        let mut freed = 0u64;
        let mut victims = Vec::new();
        for (path, entry) in self.entries.iter().rev() {
            if freed >= deficit {
                break;
            }
            if entry.is_pinned() {
                continue;
            }
            freed += entry.size;
            victims.push(path.clone());
        }

        for path in victims {
            if let Some(entry) = self.remove_entry(&path) {
                delete_file(&path);
                tracing::info!(
                    path = %path.display(),
                    logical = %entry.logical_path,
                    version = entry.version,
                    size = entry.size,
                    "evicted"
                );
            }
        }

        capacity.saturating_sub(self.current_size) >= needed
    }

    fn purge_stale(&mut self, dir: &Path, logical: &str, newest_version: u64) {
        let tracked: Vec<u64> = self
            .versions
            .get(logical)
            .map(|versions| versions.range(..newest_version).copied().collect())
            .unwrap_or_default();

        for version in tracked {
            let path = naming::read_only_path(dir, logical, version);
            match self.entries.peek(&path) {
                Some(entry) if entry.is_pinned() => {
                    tracing::debug!(
                        path = %path.display(),
                        ref_count = entry.ref_count,
                        "stale version still referenced"
                    );
                }
                _ => {
                    self.remove_entry(&path);
                    delete_file(&path);
                    tracing::debug!(logical, version, "purged stale version");
                }
            }
        }

        // orphan check covers only the versions just below the newest
        let window_start = newest_version
            .saturating_sub(ORPHAN_SCAN_WINDOW)
            .max(1);
        for version in window_start..newest_version {
            let path = naming::read_only_path(dir, logical, version);
            if !self.entries.contains(&path) && path.exists() {
                tracing::warn!(path = %path.display(), "orphan cache file, leaving it in place");
            }
        }
    }
}

fn delete_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "cache file already gone");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to delete cache file");
        }
    }
}
