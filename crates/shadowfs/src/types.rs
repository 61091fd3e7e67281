//! Value types crossing the cache/backend boundary.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Type of a stored filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file containing data.
    File,
    /// Directory that can contain other entries.
    Directory,
    /// Symbolic link pointing to another path.
    Symlink,
}

impl FileType {
    /// Returns `true` if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns `true` if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Returns `true` if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }
}

/// Entry metadata.
///
/// A plain value record. Metas handed to the backend through
/// [`bulk`](crate::StorageBackend::bulk) are consumed and must not be mutated
/// afterwards; metas returned by read operations are the caller's to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileMeta {
    /// Last modification time, in milliseconds since the Unix epoch (UTC).
    pub mtime: u64,
}

impl FileMeta {
    /// Meta stamped with the current wall-clock time.
    pub fn now() -> Self {
        let mtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        FileMeta { mtime }
    }
}

/// A directory listing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name (final path component; empty for the root).
    pub filename: String,
    /// Absolute path of the entry.
    pub file_path: String,
    /// The stored type of the entry.
    pub file_type: FileType,
    /// Symlink target as stored, not resolved. `None` for non-symlinks.
    pub destination: Option<String>,
    /// Entry metadata.
    pub meta: FileMeta,
}

/// A listing record from a symlink-following lookup.
///
/// Like [`FileEntry`], but produced after symlink resolution, so `file_type`
/// is always `File` or `Directory` and no destination is carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicFileEntry {
    /// Entry name (final path component; empty for the root).
    pub filename: String,
    /// Absolute path of the entry.
    pub file_path: String,
    /// `File` or `Directory`, never `Symlink`.
    pub file_type: FileType,
    /// Entry metadata.
    pub meta: FileMeta,
}
