//! shadowfs - in-memory, write-back virtual filesystem
//!
//! A POSIX-like hierarchical namespace (files, directories, symlinks) served
//! from a cached shadow tree over a pluggable persistent backend. Reads and
//! mutations run against the in-memory tree; pending edits are diffed
//! against the backend and flushed as one ordered bulk transaction, either
//! after a bounded idle period, after a bounded staleness since the last
//! flush, or on demand.
//!
//! # Example
//!
//! ```rust
//! use shadowfs::CacheFs;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> shadowfs::Result<()> {
//!     let fs = CacheFs::new();
//!     fs.mk_dir("/logs", false).await?;
//!     fs.write_file("/logs/today", "started\n").await?;
//!     fs.mk_lnk("/latest", "logs/today").await?;
//!
//!     // Symlinks are followed on read.
//!     assert_eq!(fs.read_text("/latest").await?, "started\n");
//!
//!     // Everything so far lives in the shadow tree; push it down now.
//!     fs.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Custom backends
//!
//! Implement [`StorageBackend`] to persist the tree anywhere that can read
//! entries and apply one ordered bulk mutation; see the trait docs for the
//! ordering contract and [`MemoryBackend`] for the reference implementation.

mod backend;
mod cache;
mod error;
mod facade;
mod observer;
mod path;
mod scheduler;
mod types;

pub use backend::{
    AcquireStatus, BackendMutex, BulkChanges, FileWrite, FolderCreate, MemoryBackend, MetaUpdate,
    StorageBackend, SymlinkCreate,
};
pub use error::{Error, ErrorKind, Result};
pub use facade::{CacheFs, CacheFsBuilder, RmOptions};
pub use observer::CacheObserver;
pub use scheduler::{DEFAULT_ALWAYS_COMMIT_AFTER, DEFAULT_COMMIT_DELAY};
pub use types::{BasicFileEntry, FileEntry, FileMeta, FileType};

/// Path algebra helpers used throughout the crate.
///
/// Pure functions over `/`-separated path strings; exposed for callers that
/// need to pre-process paths the same way the cache does.
pub mod paths {
    pub use crate::path::{
        basename, dirname, extname, is_absolute, is_normalized, join, normalize, relative,
        resolve, split,
    };
}
