//! Storage backend contract.
//!
//! The cache drives any store that can read entries and apply one ordered
//! bulk mutation. Backends do not enforce POSIX semantics; the cache layer
//! owns validation and hands the backend pre-ordered work.
//!
//! # Bulk ordering contract
//!
//! [`StorageBackend::bulk`] receives a [`BulkChanges`] whose lists the
//! backend may process in order, relying on these guarantees from the
//! caller:
//!
//! 1. `to_delete` comes first. Deletion is recursive by contract, and no
//!    descendant of a deleted path appears elsewhere in `to_delete`.
//! 2. `folders_to_create` is top-down: a parent directory always precedes
//!    its children.
//! 3. `files_to_write` and `symlinks_to_create` have existing parents
//!    (pre-existing or just created). Existing files are overwritten;
//!    creating a symlink where one exists is an error.
//! 4. `meta_updates` applies last.
//!
//! Metas inside a [`BulkChanges`] are consumed by the backend; metas
//! returned from read operations belong to the caller.

mod memory;

pub use memory::MemoryBackend;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{FileEntry, FileMeta};

/// A directory creation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderCreate {
    /// Absolute path of the directory to create.
    pub path: String,
    /// Metadata to stamp on the new directory.
    pub meta: FileMeta,
}

/// A file write record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    /// Absolute path of the file to write.
    pub path: String,
    /// Full file contents.
    pub data: Vec<u8>,
    /// Metadata to stamp on the file.
    pub meta: FileMeta,
}

/// A symlink creation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkCreate {
    /// Absolute path of the symlink to create.
    pub path: String,
    /// Target path, stored verbatim.
    pub destination: String,
    /// Metadata to stamp on the symlink.
    pub meta: FileMeta,
}

/// A metadata update record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaUpdate {
    /// Absolute path of the entry to update.
    pub path: String,
    /// The new metadata.
    pub meta: FileMeta,
}

/// One ordered bulk transaction, see the [module docs](self) for the
/// ordering contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkChanges {
    /// Paths to delete, recursively.
    pub to_delete: Vec<String>,
    /// Directories to create, top-down.
    pub folders_to_create: Vec<FolderCreate>,
    /// Files to write whole.
    pub files_to_write: Vec<FileWrite>,
    /// Symlinks to create.
    pub symlinks_to_create: Vec<SymlinkCreate>,
    /// Metadata updates, applied last.
    pub meta_updates: Vec<MetaUpdate>,
}

impl BulkChanges {
    /// True when no list carries any work.
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty()
            && self.folders_to_create.is_empty()
            && self.files_to_write.is_empty()
            && self.symlinks_to_create.is_empty()
            && self.meta_updates.is_empty()
    }
}

/// Outcome of a backend mutex acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStatus {
    /// Nothing touched the backend since our last release.
    Clean,
    /// Another holder modified the backend since our last release.
    Stale,
}

/// Process-local mutual exclusion over one backend instance.
///
/// A handle is private to one cache instance; the underlying primitive is
/// shared by every handle the backend hands out, so concurrent cache
/// instances over the same backend serialise their flush windows.
#[async_trait]
pub trait BackendMutex: Send {
    /// Suspends until exclusive access is held.
    ///
    /// Reports [`AcquireStatus::Stale`] when another holder mutated the
    /// backend between our last [`release`](Self::release) and now.
    async fn acquire(&mut self) -> Result<AcquireStatus>;

    /// Releases exclusive access. A no-op when not held.
    fn release(&mut self);
}

/// Async storage backend trait.
///
/// Implementations must be `Send + Sync`; the cache may call from any task.
/// See [`MemoryBackend`] for the reference implementation.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read a file's full contents.
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// List the entries directly under `path`.
    async fn read_dir(&self, path: &str) -> Result<Vec<FileEntry>>;

    /// The entry at `path` itself, without following symlinks.
    ///
    /// Returns `None` when no entry exists.
    async fn linfo(&self, path: &str) -> Result<Option<FileEntry>>;

    /// Apply one ordered bulk transaction.
    async fn bulk(&self, changes: BulkChanges) -> Result<()>;

    /// New mutual-exclusion handle over this backend instance.
    fn create_mutex(&self) -> Box<dyn BackendMutex>;
}
