//! Volatile in-memory backend.
//!
//! [`MemoryBackend`] stores the whole tree in a `HashMap` keyed by
//! normalised absolute path. It is the default backend, the reference
//! implementation of the bulk ordering contract, and the store the test
//! suite runs against.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{AcquireStatus, BackendMutex, BulkChanges, StorageBackend};
use crate::error::{Error, Result};
use crate::path;
use crate::types::{FileEntry, FileMeta, FileType};

/// In-memory storage backend.
///
/// Holds every entry in a `HashMap` behind an `RwLock`. A fresh backend
/// contains only the root directory `/`.
///
/// # Example
///
/// ```rust
/// use shadowfs::{MemoryBackend, StorageBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> shadowfs::Result<()> {
/// let backend = MemoryBackend::new();
/// backend.add_file("/etc/version", b"1.0.0");
///
/// let data = backend.read_file("/etc/version").await?;
/// assert_eq!(data, b"1.0.0");
/// # Ok(())
/// # }
/// ```
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, StoredEntry>>,
    lock: Arc<Mutex<()>>,
    version: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
enum StoredEntry {
    File { data: Vec<u8>, meta: FileMeta },
    Directory { meta: FileMeta },
    Symlink { destination: String, meta: FileMeta },
}

impl StoredEntry {
    fn meta(&self) -> FileMeta {
        match self {
            StoredEntry::File { meta, .. }
            | StoredEntry::Directory { meta }
            | StoredEntry::Symlink { meta, .. } => *meta,
        }
    }

    fn meta_mut(&mut self) -> &mut FileMeta {
        match self {
            StoredEntry::File { meta, .. }
            | StoredEntry::Directory { meta }
            | StoredEntry::Symlink { meta, .. } => meta,
        }
    }

    fn file_type(&self) -> FileType {
        match self {
            StoredEntry::File { .. } => FileType::File,
            StoredEntry::Directory { .. } => FileType::Directory,
            StoredEntry::Symlink { .. } => FileType::Symlink,
        }
    }

    fn to_entry(&self, path: &str) -> FileEntry {
        FileEntry {
            filename: path::basename(path),
            file_path: path.to_string(),
            file_type: self.file_type(),
            destination: match self {
                StoredEntry::Symlink { destination, .. } => Some(destination.clone()),
                _ => None,
            },
            meta: self.meta(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new backend containing only the root directory.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "/".to_string(),
            StoredEntry::Directory {
                meta: FileMeta::now(),
            },
        );
        MemoryBackend {
            entries: RwLock::new(entries),
            lock: Arc::new(Mutex::new(())),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Seed a file, creating missing parent directories (synchronous, for
    /// initial setup and tests).
    pub fn add_file(&self, path: &str, data: impl AsRef<[u8]>) {
        let path = path::resolve(&[path]);
        let mut entries = self.entries.write().unwrap();
        Self::ensure_parents(&mut entries, &path);
        entries.insert(
            path,
            StoredEntry::File {
                data: data.as_ref().to_vec(),
                meta: FileMeta::now(),
            },
        );
    }

    /// Seed a directory, creating missing parents.
    pub fn add_dir(&self, path: &str) {
        let path = path::resolve(&[path]);
        let mut entries = self.entries.write().unwrap();
        Self::ensure_parents(&mut entries, &path);
        entries.entry(path).or_insert(StoredEntry::Directory {
            meta: FileMeta::now(),
        });
    }

    /// Seed a symlink, creating missing parents.
    pub fn add_symlink(&self, path: &str, destination: &str) {
        let path = path::resolve(&[path]);
        let mut entries = self.entries.write().unwrap();
        Self::ensure_parents(&mut entries, &path);
        entries.insert(
            path,
            StoredEntry::Symlink {
                destination: destination.to_string(),
                meta: FileMeta::now(),
            },
        );
    }

    fn ensure_parents(entries: &mut HashMap<String, StoredEntry>, path: &str) {
        let mut current = path::dirname(path);
        let mut missing = Vec::new();
        while !entries.contains_key(&current) {
            missing.push(current.clone());
            current = path::dirname(&current);
        }
        for dir in missing.into_iter().rev() {
            entries.insert(
                dir,
                StoredEntry::Directory {
                    meta: FileMeta::now(),
                },
            );
        }
    }

    fn delete_recursive(entries: &mut HashMap<String, StoredEntry>, path: &str) {
        entries.remove(path);
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        entries.retain(|key, _| !key.starts_with(&prefix));
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let entries = self.entries.read().unwrap();
        match entries.get(path) {
            Some(StoredEntry::File { data, .. }) => Ok(data.clone()),
            Some(StoredEntry::Directory { .. }) => Err(Error::is_directory(path)),
            Some(StoredEntry::Symlink { .. }) => Err(Error::not_file(path)),
            None => Err(Error::not_found(path)),
        }
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<FileEntry>> {
        let entries = self.entries.read().unwrap();
        match entries.get(path) {
            Some(StoredEntry::Directory { .. }) => {}
            Some(_) => return Err(Error::not_directory(path)),
            None => return Err(Error::not_found(path)),
        }
        let listing = entries
            .iter()
            .filter(|(key, _)| key.as_str() != path && path::dirname(key) == path)
            .map(|(key, entry)| entry.to_entry(key))
            .collect();
        Ok(listing)
    }

    async fn linfo(&self, path: &str) -> Result<Option<FileEntry>> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(path).map(|entry| entry.to_entry(path)))
    }

    async fn bulk(&self, changes: BulkChanges) -> Result<()> {
        let mut entries = self.entries.write().unwrap();

        for target in &changes.to_delete {
            Self::delete_recursive(&mut entries, target);
        }
        for folder in changes.folders_to_create {
            entries.insert(folder.path, StoredEntry::Directory { meta: folder.meta });
        }
        for write in changes.files_to_write {
            let parent = path::dirname(&write.path);
            if !entries.contains_key(&parent) {
                return Err(Error::not_found(parent));
            }
            entries.insert(
                write.path,
                StoredEntry::File {
                    data: write.data,
                    meta: write.meta,
                },
            );
        }
        for link in changes.symlinks_to_create {
            let parent = path::dirname(&link.path);
            if !entries.contains_key(&parent) {
                return Err(Error::not_found(parent));
            }
            if matches!(entries.get(&link.path), Some(StoredEntry::Symlink { .. })) {
                return Err(Error::already_exists(link.path));
            }
            entries.insert(
                link.path,
                StoredEntry::Symlink {
                    destination: link.destination,
                    meta: link.meta,
                },
            );
        }
        for update in changes.meta_updates {
            match entries.get_mut(&update.path) {
                Some(entry) => *entry.meta_mut() = update.meta,
                None => return Err(Error::not_found(update.path)),
            }
        }

        self.version.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_mutex(&self) -> Box<dyn BackendMutex> {
        Box::new(MemoryMutex {
            lock: Arc::clone(&self.lock),
            version: Arc::clone(&self.version),
            guard: None,
            seen: None,
        })
    }
}

/// Mutex handle over a [`MemoryBackend`].
///
/// Staleness is detected through the backend's bulk version counter: a
/// handle remembers the counter at release time and compares on the next
/// acquisition.
struct MemoryMutex {
    lock: Arc<Mutex<()>>,
    version: Arc<AtomicU64>,
    guard: Option<OwnedMutexGuard<()>>,
    seen: Option<u64>,
}

#[async_trait]
impl BackendMutex for MemoryMutex {
    async fn acquire(&mut self) -> Result<AcquireStatus> {
        if self.guard.is_some() {
            return Ok(AcquireStatus::Clean);
        }
        let guard = Arc::clone(&self.lock).lock_owned().await;
        let current = self.version.load(Ordering::SeqCst);
        let status = match self.seen {
            Some(seen) if seen != current => AcquireStatus::Stale,
            _ => AcquireStatus::Clean,
        };
        self.guard = Some(guard);
        Ok(status)
    }

    fn release(&mut self) {
        if self.guard.take().is_some() {
            self.seen = Some(self.version.load(Ordering::SeqCst));
        }
    }
}
