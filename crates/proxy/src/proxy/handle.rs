//! Open file handles and their POSIX-like I/O

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::error::ProxyError;

/// How a client opens a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenOption {
    /// Open for writing, creating the file if missing
    Create,
    /// Create a new file; fails if it exists
    CreateExclusive,
    /// Open an existing file or directory for reading
    Read,
    /// Open an existing file for writing
    Write,
}

impl OpenOption {
    /// Whether the handle gets a private write copy.
    pub fn is_write(self) -> bool {
        !matches!(self, OpenOption::Read)
    }

    pub fn creates(self) -> bool {
        matches!(self, OpenOption::Create | OpenOption::CreateExclusive)
    }
}

/// Origin of an lseek offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LseekOption {
    FromStart,
    FromCurrent,
    /// Offset counted back from the end of the file
    FromEnd,
}

/// Local file behind a handle
#[derive(Debug)]
pub(crate) enum Backing {
    /// Released by close while another task still held the handle
    Closed,
    Directory,
    ReadOnly { physical: PathBuf, file: File },
    WriteCopy { physical: PathBuf, file: File },
}

/// State of one open handle
#[derive(Debug)]
pub struct OpenHandle {
    pub id: u64,
    pub logical_path: String,
    pub option: OpenOption,
    /// Client session the handle belongs to, if the client named one
    pub client: Option<String>,
    pub(crate) backing: Backing,
    position: u64,
}

impl OpenHandle {
    pub(crate) fn new(
        id: u64,
        logical_path: String,
        option: OpenOption,
        client: Option<String>,
        backing: Backing,
    ) -> Self {
        Self {
            id,
            logical_path,
            option,
            client,
            backing,
            position: 0,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.backing, Backing::Directory)
    }

    pub fn physical_path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Closed | Backing::Directory => None,
            Backing::ReadOnly { physical, .. } | Backing::WriteCopy { physical, .. } => {
                Some(physical)
            }
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    fn file_mut(&mut self) -> Result<&mut File, ProxyError> {
        match &mut self.backing {
            Backing::Closed => Err(ProxyError::BadHandle(self.id)),
            Backing::Directory => Err(ProxyError::IsDirectory(self.logical_path.clone())),
            Backing::ReadOnly { file, .. } | Backing::WriteCopy { file, .. } => Ok(file),
        }
    }

    /// Read up to `len` bytes at the current position. An empty result means EOF.
    pub async fn read(&mut self, len: usize) -> Result<Vec<u8>, ProxyError> {
        let position = self.position;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(position)).await?;

        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);

        self.position += filled as u64;
        Ok(buf)
    }

    /// Write `data` at the current position and return the byte count.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, ProxyError> {
        let position = self.position;
        let id = self.id;
        let file = match &mut self.backing {
            Backing::Closed => return Err(ProxyError::BadHandle(id)),
            Backing::Directory => return Err(ProxyError::IsDirectory(self.logical_path.clone())),
            Backing::ReadOnly { .. } => return Err(ProxyError::BadHandle(id)),
            Backing::WriteCopy { file, .. } => file,
        };

        file.seek(SeekFrom::Start(position)).await?;
        file.write_all(data).await?;
        self.position += data.len() as u64;
        Ok(data.len())
    }

    /// Move the position and return the new one.
    ///
    /// `pos` must be non-negative. `FromEnd` places the position `pos` bytes
    /// before the end of the file.
    pub async fn lseek(&mut self, pos: i64, whence: LseekOption) -> Result<u64, ProxyError> {
        if pos < 0 {
            return Err(ProxyError::InvalidArgument(format!("negative offset {}", pos)));
        }
        let pos = pos as u64;
        let current = self.position;
        let file = self.file_mut()?;

        let new_position = match whence {
            LseekOption::FromStart => Some(pos),
            LseekOption::FromCurrent => current.checked_add(pos),
            LseekOption::FromEnd => file.metadata().await?.len().checked_sub(pos),
        }
        .ok_or_else(|| ProxyError::InvalidArgument(format!("offset {} out of range", pos)))?;

        self.position = new_position;
        Ok(new_position)
    }

    /// Take the backing file out of the handle, leaving it closed.
    pub(crate) fn release(&mut self) -> Backing {
        std::mem::replace(&mut self.backing, Backing::Closed)
    }

    /// Flush pending writes and return the file length.
    pub(crate) async fn flush(&mut self) -> Result<u64, ProxyError> {
        let file = self.file_mut()?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(file.metadata().await?.len())
    }
}

pub type SharedHandle = Arc<tokio::sync::Mutex<OpenHandle>>;

/// Table of open handles, keyed by descriptor
///
/// Descriptors start at 1 and are never reused within a proxy's lifetime, so
/// a write path named after a descriptor is unique.
#[derive(Debug)]
pub struct HandleTable {
    handles: Mutex<HashMap<u64, SharedHandle>>,
    next_id: AtomicU64,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Reserve a fresh descriptor.
    pub fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, handle: OpenHandle) -> SharedHandle {
        let id = handle.id;
        let shared = Arc::new(tokio::sync::Mutex::new(handle));
        self.handles.lock().insert(id, shared.clone());
        shared
    }

    pub fn get(&self, id: u64) -> Result<SharedHandle, ProxyError> {
        self.handles
            .lock()
            .get(&id)
            .cloned()
            .ok_or(ProxyError::BadHandle(id))
    }

    pub fn remove(&self, id: u64) -> Result<SharedHandle, ProxyError> {
        self.handles
            .lock()
            .remove(&id)
            .ok_or(ProxyError::BadHandle(id))
    }

    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.handles.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Every open handle, in descriptor order.
    pub fn snapshot(&self) -> Vec<(u64, SharedHandle)> {
        let mut handles: Vec<(u64, SharedHandle)> = self
            .handles
            .lock()
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect();
        handles.sort_unstable_by_key(|(id, _)| *id);
        handles
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_handle(dir: &TempDir, content: &[u8]) -> OpenHandle {
        let physical = dir.path().join("f_wr_1");
        tokio::fs::write(&physical, content).await.unwrap();
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&physical)
            .await
            .unwrap();
        OpenHandle::new(
            1,
            "f".to_string(),
            OpenOption::Write,
            None,
            Backing::WriteCopy { physical, file },
        )
    }

    #[tokio::test]
    async fn test_read_write_seek() {
        let dir = TempDir::new().unwrap();
        let mut handle = write_handle(&dir, b"hello world").await;

        assert_eq!(handle.read(5).await.unwrap(), b"hello");
        assert_eq!(handle.position(), 5);

        assert_eq!(handle.lseek(0, LseekOption::FromStart).await.unwrap(), 0);
        assert_eq!(handle.write(b"HELLO").await.unwrap(), 5);
        assert_eq!(handle.lseek(1, LseekOption::FromCurrent).await.unwrap(), 6);
        assert_eq!(handle.read(100).await.unwrap(), b"world");
        assert!(handle.read(10).await.unwrap().is_empty());

        assert_eq!(handle.lseek(5, LseekOption::FromEnd).await.unwrap(), 6);
        assert_eq!(handle.flush().await.unwrap(), 11);

        handle.lseek(0, LseekOption::FromStart).await.unwrap();
        assert_eq!(handle.read(11).await.unwrap(), b"HELLO world");
    }

    #[tokio::test]
    async fn test_lseek_rejects_bad_offsets() {
        let dir = TempDir::new().unwrap();
        let mut handle = write_handle(&dir, b"abc").await;

        assert!(matches!(
            handle.lseek(-1, LseekOption::FromStart).await,
            Err(ProxyError::InvalidArgument(_))
        ));
        assert!(matches!(
            handle.lseek(4, LseekOption::FromEnd).await,
            Err(ProxyError::InvalidArgument(_))
        ));
        assert_eq!(handle.position(), 0);
    }

    #[tokio::test]
    async fn test_read_only_and_directory_handles() {
        let dir = TempDir::new().unwrap();
        let physical = dir.path().join("f_rdonly_1");
        tokio::fs::write(&physical, b"data").await.unwrap();
        let file = File::open(&physical).await.unwrap();
        let mut read_only = OpenHandle::new(
            2,
            "f".to_string(),
            OpenOption::Read,
            None,
            Backing::ReadOnly { physical, file },
        );
        assert!(matches!(
            read_only.write(b"x").await,
            Err(ProxyError::BadHandle(2))
        ));
        assert_eq!(read_only.read(4).await.unwrap(), b"data");

        let mut directory = OpenHandle::new(
            3,
            "d".to_string(),
            OpenOption::Read,
            None,
            Backing::Directory,
        );
        assert!(directory.is_directory());
        assert!(matches!(
            directory.read(1).await,
            Err(ProxyError::IsDirectory(_))
        ));
        assert!(matches!(
            directory.lseek(0, LseekOption::FromStart).await,
            Err(ProxyError::IsDirectory(_))
        ));
    }

    #[test]
    fn test_handle_table() {
        let table = HandleTable::new();
        let a = table.allocate();
        let b = table.allocate();
        assert_eq!((a, b), (1, 2));

        table.insert(OpenHandle::new(
            b,
            "d".to_string(),
            OpenOption::Read,
            None,
            Backing::Directory,
        ));
        assert_eq!(table.ids(), vec![2]);
        assert!(table.get(2).is_ok());
        assert!(matches!(table.get(1), Err(ProxyError::BadHandle(1))));
        assert!(table.remove(2).is_ok());
        assert!(table.is_empty());
        assert!(matches!(table.remove(2), Err(ProxyError::BadHandle(2))));
    }

    #[test]
    fn test_open_option_wire_names() {
        assert_eq!(
            serde_json::to_string(&OpenOption::CreateExclusive).unwrap(),
            "\"create_exclusive\""
        );
        assert_eq!(
            serde_json::from_str::<LseekOption>("\"from_end\"").unwrap(),
            LseekOption::FromEnd
        );
        assert!(OpenOption::Create.is_write());
        assert!(!OpenOption::Read.is_write());
    }
}
