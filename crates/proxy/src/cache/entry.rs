use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which kind of physical copy an entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Immutable copy of one server version
    ReadOnly,
    /// Private copy being modified through one handle
    WriteCopy { handle: u64 },
}

/// One physical file tracked by the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    /// Client-visible path, normalized
    pub logical_path: String,
    /// Location in the cache directory; the cache's identity key
    pub physical_path: PathBuf,
    /// Server version this copy was taken from (provisional for write copies)
    pub version: u64,
    /// Bytes charged against cache capacity
    pub size: u64,
    /// Open handles depending on this file staying on disk
    pub ref_count: u32,
    pub kind: EntryKind,
}

impl CachedEntry {
    /// An unpinned read-only copy.
    pub fn read_only(
        logical_path: impl Into<String>,
        physical_path: impl Into<PathBuf>,
        version: u64,
        size: u64,
    ) -> Self {
        Self {
            logical_path: logical_path.into(),
            physical_path: physical_path.into(),
            version,
            size,
            ref_count: 0,
            kind: EntryKind::ReadOnly,
        }
    }

    /// A write copy, pinned once by the handle that owns it.
    pub fn write_copy(
        logical_path: impl Into<String>,
        physical_path: impl Into<PathBuf>,
        version: u64,
        size: u64,
        handle: u64,
    ) -> Self {
        Self {
            logical_path: logical_path.into(),
            physical_path: physical_path.into(),
            version,
            size,
            ref_count: 1,
            kind: EntryKind::WriteCopy { handle },
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.ref_count > 0
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.kind, EntryKind::ReadOnly)
    }
}
