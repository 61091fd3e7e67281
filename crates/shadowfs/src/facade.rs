//! POSIX-style facade over the cached shadow tree.
//!
//! [`CacheFs`] translates user calls into scheduler-serialised operations
//! against the shadow tree and implements the non-atomic helpers (recursive
//! mkdir, rename, copy, du, wipe, for_each) on top of the primitive ones.
//! All paths are resolved to absolute form against the current working
//! directory before use.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use crate::backend::{MemoryBackend, StorageBackend};
use crate::cache::NodeState;
use crate::error::{Error, ErrorKind, Result};
use crate::observer::{CacheObserver, ObserverRegistry};
use crate::path;
use crate::scheduler::{Scheduler, DEFAULT_ALWAYS_COMMIT_AFTER, DEFAULT_COMMIT_DELAY};
use crate::types::{BasicFileEntry, FileEntry, FileType};

/// Options for [`CacheFs::rm`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RmOptions {
    /// Remove directory contents as well.
    pub recursive: bool,
    /// Confirm that removing a directory is intended. Removing a directory
    /// without this fails EISDIR; passing it for a non-directory fails
    /// ENOTDIR.
    pub folder: bool,
}

/// Write-back cached filesystem.
///
/// The main entry point. Operations mutate an in-memory shadow tree and are
/// flushed to the backend as a single bulk transaction after a bounded idle
/// period, after a bounded staleness, or on an explicit [`commit`](Self::commit).
///
/// # Example
///
/// ```rust
/// use shadowfs::CacheFs;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> shadowfs::Result<()> {
/// let fs = CacheFs::new();
/// fs.mk_dir("/project", false).await?;
/// fs.write_file("/project/readme.md", "hello").await?;
/// assert_eq!(fs.read_text("/project/readme.md").await?, "hello");
/// fs.commit().await?;
/// # Ok(())
/// # }
/// ```
pub struct CacheFs {
    scheduler: Arc<Scheduler>,
    cwd: StdMutex<String>,
}

impl Default for CacheFs {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheFs {
    /// New cache over a fresh [`MemoryBackend`] with default settings.
    pub fn new() -> Self {
        CacheFsBuilder::default().build()
    }

    /// New builder for customised configuration.
    pub fn builder() -> CacheFsBuilder {
        CacheFsBuilder::default()
    }

    /// Register a change listener.
    pub fn add_observer(&self, observer: Arc<dyn CacheObserver>) {
        self.scheduler.observers.add(observer);
    }

    /// Unregister a change listener.
    pub fn remove_observer(&self, observer: &Arc<dyn CacheObserver>) {
        self.scheduler.observers.remove(observer);
    }

    /// The current working directory.
    pub fn cwd(&self) -> String {
        self.cwd.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Change the working directory. Relative paths resolve against the
    /// previous working directory.
    pub fn set_cwd(&self, new_cwd: &str) {
        let absolute = self.absolute(new_cwd);
        *self.cwd.lock().unwrap_or_else(|e| e.into_inner()) = absolute;
    }

    fn absolute(&self, input: &str) -> String {
        path::resolve(&[&self.cwd(), input])
    }

    /// Create a directory.
    ///
    /// Non-recursive: the parent must exist and the target must not.
    /// Recursive: every missing ancestor is created; an existing directory
    /// at the target is accepted.
    pub async fn mk_dir(&self, target: &str, recursive: bool) -> Result<()> {
        let abs = self.absolute(target);
        let _op = self.scheduler.begin_op();
        let mut state = self.scheduler.session().await?;

        if recursive {
            let parts = path::split(&abs);
            let mut current = state.cache.ensure_root().await?;
            for (idx, component) in parts[1..].iter().enumerate() {
                let child = state.cache.retrieve_child(current, component).await?;
                let last = idx + 2 == parts.len();
                let (exists, is_dir, child_path) = {
                    let node = state.cache.node(child);
                    (
                        node.state.exists(),
                        node.state.is_dir(),
                        node.file_path.clone(),
                    )
                };
                if !exists {
                    state.cache.mk_dir(child)?;
                    self.scheduler
                        .observers
                        .file_created(&child_path, FileType::Directory);
                } else if !is_dir {
                    return Err(if last {
                        Error::already_exists(child_path)
                    } else {
                        Error::not_directory(child_path)
                    });
                }
                current = child;
            }
        } else {
            let node = state.cache.walk(&abs).await?;
            state.cache.mk_dir(node)?;
            self.scheduler
                .observers
                .file_created(&abs, FileType::Directory);
        }
        Ok(())
    }

    /// Create a symbolic link; the destination is stored verbatim.
    pub async fn mk_lnk(&self, target: &str, destination: &str) -> Result<()> {
        let abs = self.absolute(target);
        let _op = self.scheduler.begin_op();
        let mut state = self.scheduler.session().await?;

        let node = state.cache.walk(&abs).await?;
        state.cache.mk_lnk(node, destination)?;
        self.scheduler
            .observers
            .file_created(&abs, FileType::Symlink);
        Ok(())
    }

    /// Create or overwrite a file, whole. Symlinks are followed; `&str`
    /// content is written as UTF-8.
    pub async fn write_file(&self, target: &str, content: impl AsRef<[u8]>) -> Result<()> {
        let abs = self.absolute(target);
        let _op = self.scheduler.begin_op();
        let mut state = self.scheduler.session().await?;

        let node = state.cache.walk(&abs).await?;
        let node = state.cache.resolve_symlink(node).await?;
        let written_path = state.cache.node(node).file_path.clone();
        let created = state.cache.write_file(node, content.as_ref().to_vec())?;
        if created {
            self.scheduler
                .observers
                .file_created(&written_path, FileType::File);
        } else {
            self.scheduler
                .observers
                .file_contents_changed(&written_path, FileType::File);
        }
        Ok(())
    }

    /// Read a file's full contents. Symlinks are followed.
    pub async fn read_file(&self, target: &str) -> Result<Vec<u8>> {
        let abs = self.absolute(target);
        let _op = self.scheduler.begin_op();
        let mut state = self.scheduler.session().await?;

        let node = state.cache.walk(&abs).await?;
        let node = state.cache.resolve_symlink(node).await?;
        state.cache.read_file(node).await
    }

    /// Read a file as UTF-8 text.
    pub async fn read_text(&self, target: &str) -> Result<String> {
        let bytes = self.read_file(target).await?;
        String::from_utf8(bytes).map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid utf-8 in {}", self.absolute(target)),
            ))
        })
    }

    /// Read a symlink's destination as stored. Fails ENOTLNK on a
    /// non-symlink and ENOENT when nothing exists at the path.
    pub async fn read_link(&self, target: &str) -> Result<String> {
        let abs = self.absolute(target);
        let _op = self.scheduler.begin_op();
        let mut state = self.scheduler.session().await?;

        let node = state.cache.walk(&abs).await?;
        match &state.cache.node(node).state {
            NodeState::Symlink(dest) | NodeState::SymlinkDirty(dest) => Ok(dest.clone()),
            NodeState::Nonexistent => Err(Error::not_found(abs)),
            _ => Err(Error::not_symlink(abs)),
        }
    }

    /// List a directory. Symlinks are followed. Returns entry names, or
    /// full paths with `full_paths`. Order is unspecified.
    pub async fn read_dir(&self, target: &str, full_paths: bool) -> Result<Vec<String>> {
        let abs = self.absolute(target);
        let _op = self.scheduler.begin_op();
        let mut state = self.scheduler.session().await?;

        let node = state.cache.walk(&abs).await?;
        let node = state.cache.resolve_symlink(node).await?;
        let dir = state.cache.node(node);
        if !dir.state.exists() {
            return Err(Error::not_found(&dir.file_path));
        }
        if !dir.state.is_dir() {
            return Err(Error::not_directory(&dir.file_path));
        }

        let children = state.cache.existing_children(node).await?;
        Ok(children
            .into_iter()
            .map(|child| {
                let node = state.cache.node(child);
                if full_paths {
                    node.file_path.clone()
                } else {
                    node.filename.clone()
                }
            })
            .collect())
    }

    /// Remove a file, symlink, or directory. See [`RmOptions`].
    pub async fn rm(&self, target: &str, opts: RmOptions) -> Result<()> {
        let abs = self.absolute(target);
        let _op = self.scheduler.begin_op();
        let mut state = self.scheduler.session().await?;

        if abs == "/" {
            // The root is the tree anchor; wipe() empties it instead.
            return Err(Error::not_empty(abs));
        }

        let node = state.cache.walk(&abs).await?;
        if !state.cache.node(node).state.exists() {
            return Err(Error::not_found(abs));
        }

        if state.cache.node(node).state.is_dir() {
            if !opts.folder {
                return Err(Error::is_directory(abs));
            }
            let children = state.cache.existing_children(node).await?;
            if !children.is_empty() && !opts.recursive {
                return Err(Error::not_empty(abs));
            }
            state.cache.delete(node)?;
        } else {
            if opts.folder {
                return Err(Error::not_directory(abs));
            }
            state.cache.delete(node)?;
        }
        self.scheduler.observers.file_deleted(&abs);
        Ok(())
    }

    /// The entry at the path itself, lstat-style; symlinks not followed.
    ///
    /// Returns `None` when nothing exists there (including a missing
    /// ancestor).
    pub async fn linfo(&self, target: &str) -> Result<Option<FileEntry>> {
        let abs = self.absolute(target);
        let _op = self.scheduler.begin_op();
        let mut state = self.scheduler.session().await?;

        let node = match state.cache.walk(&abs).await {
            Ok(node) => node,
            Err(err) if err.kind() == Some(ErrorKind::NotFound) => return Ok(None),
            Err(err) => return Err(err),
        };
        Ok(state.cache.node(node).entry())
    }

    /// The entry at the path, stat-style; symlinks followed, so the result
    /// is always a file or directory.
    pub async fn info(&self, target: &str) -> Result<BasicFileEntry> {
        let abs = self.absolute(target);
        let _op = self.scheduler.begin_op();
        let mut state = self.scheduler.session().await?;

        let node = state.cache.walk(&abs).await?;
        let node = state.cache.resolve_symlink(node).await?;
        let resolved = state.cache.node(node);
        let file_type = match resolved.state.file_type() {
            Some(file_type) => file_type,
            None => return Err(Error::not_found(abs)),
        };
        Ok(BasicFileEntry {
            filename: resolved.filename.clone(),
            file_path: resolved.file_path.clone(),
            file_type,
            meta: resolved.meta,
        })
    }

    /// Total size in bytes of the file(s) under a path.
    ///
    /// Directories are traversed breadth-first without following symlinks;
    /// symlink entries contribute 0.
    pub async fn du(&self, target: &str) -> Result<u64> {
        let abs = self.absolute(target);
        let entry = self
            .linfo(&abs)
            .await?
            .ok_or_else(|| Error::not_found(&abs))?;

        match entry.file_type {
            FileType::Symlink => Ok(0),
            FileType::File => Ok(self.read_file(&abs).await?.len() as u64),
            FileType::Directory => {
                let mut total = 0u64;
                let mut queue = VecDeque::from([abs]);
                while let Some(dir) = queue.pop_front() {
                    for child in self.read_dir(&dir, true).await? {
                        let Some(entry) = self.linfo(&child).await? else {
                            continue;
                        };
                        match entry.file_type {
                            FileType::File => {
                                total += self.read_file(&child).await?.len() as u64;
                            }
                            FileType::Directory => queue.push_back(child),
                            FileType::Symlink => {}
                        }
                    }
                }
                Ok(total)
            }
        }
    }

    /// Copy an entry recursively.
    ///
    /// Symlinks are copied as symlinks, not followed. A target nested
    /// inside the source is rejected. An existing file target is
    /// overwritten; an existing directory target fails EEXIST.
    pub async fn copy(&self, source: &str, target: &str) -> Result<()> {
        let src = self.absolute(source);
        let dst = self.absolute(target);
        let src_prefix = if src == "/" {
            "/".to_string()
        } else {
            format!("{src}/")
        };
        if dst == src || dst.starts_with(&src_prefix) {
            return Err(Error::CopyIntoSelf {
                from: src,
                target: dst,
            });
        }
        self.copy_entry(src, dst).await
    }

    fn copy_entry<'a>(
        &'a self,
        src: String,
        dst: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let entry = self
                .linfo(&src)
                .await?
                .ok_or_else(|| Error::not_found(&src))?;
            match entry.file_type {
                FileType::File => {
                    let data = self.read_file(&src).await?;
                    self.write_file(&dst, data).await
                }
                FileType::Symlink => {
                    self.mk_lnk(&dst, entry.destination.as_deref().unwrap_or_default())
                        .await
                }
                FileType::Directory => {
                    self.mk_dir(&dst, false).await?;
                    for name in self.read_dir(&src, false).await? {
                        self.copy_entry(path::join(&[&src, &name]), path::join(&[&dst, &name]))
                            .await?;
                    }
                    Ok(())
                }
            }
        })
    }

    /// Move an entry: copy to the target, then remove the source.
    pub async fn rename(&self, source: &str, target: &str) -> Result<()> {
        let src = self.absolute(source);
        let entry = self
            .linfo(&src)
            .await?
            .ok_or_else(|| Error::not_found(&src))?;
        self.copy(&src, target).await?;
        self.rm(
            &src,
            RmOptions {
                recursive: true,
                folder: entry.file_type.is_dir(),
            },
        )
        .await
    }

    /// Breadth-first traversal under a path.
    ///
    /// The callback receives each entry and returns whether to continue.
    /// Traversal runs outside the operation wrap, so the callback may itself
    /// invoke cache operations without deadlocking.
    pub async fn for_each<F, Fut>(&self, target: &str, mut callback: F) -> Result<()>
    where
        F: FnMut(FileEntry) -> Fut,
        Fut: Future<Output = bool>,
    {
        let abs = self.absolute(target);
        let mut queue = VecDeque::from([abs]);
        while let Some(dir) = queue.pop_front() {
            for child in self.read_dir(&dir, true).await? {
                let Some(entry) = self.linfo(&child).await? else {
                    continue;
                };
                let descend = entry.file_type.is_dir();
                if !callback(entry).await {
                    return Ok(());
                }
                if descend {
                    queue.push_back(child);
                }
            }
        }
        Ok(())
    }

    /// Remove every entry under `/`.
    pub async fn wipe(&self) -> Result<()> {
        let _op = self.scheduler.begin_op();
        let mut state = self.scheduler.session().await?;

        let root = state.cache.ensure_root().await?;
        let children = state.cache.existing_children(root).await?;
        let mut deleted = Vec::with_capacity(children.len());
        for child in children {
            deleted.push(state.cache.node(child).file_path.clone());
            state.cache.delete(child)?;
        }
        for gone in deleted {
            self.scheduler.observers.file_deleted(&gone);
        }
        Ok(())
    }

    /// Flush all pending mutations to the backend now.
    ///
    /// Cancels any armed idle commit, performs the bulk flush, releases the
    /// backend mutex, and drops the shadow tree.
    pub async fn commit(&self) -> Result<()> {
        self.scheduler.commit().await
    }
}

/// Builder for customised [`CacheFs`] configuration.
pub struct CacheFsBuilder {
    backend: Option<Arc<dyn StorageBackend>>,
    cwd: String,
    commit_delay: Option<Duration>,
    always_commit_after: Option<Duration>,
    observers: Vec<Arc<dyn CacheObserver>>,
}

impl Default for CacheFsBuilder {
    fn default() -> Self {
        CacheFsBuilder {
            backend: None,
            cwd: "/".to_string(),
            commit_delay: Some(DEFAULT_COMMIT_DELAY),
            always_commit_after: Some(DEFAULT_ALWAYS_COMMIT_AFTER),
            observers: Vec::new(),
        }
    }
}

impl CacheFsBuilder {
    /// Set the storage backend. Defaults to a fresh [`MemoryBackend`].
    pub fn backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the initial working directory.
    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        let cwd: String = cwd.into();
        self.cwd = path::resolve(&[&cwd]);
        self
    }

    /// Idle window before an automatic flush; `None` disables the idle
    /// trigger.
    pub fn commit_delay(mut self, delay: Option<Duration>) -> Self {
        self.commit_delay = delay;
        self
    }

    /// Staleness bound forcing a flush after the next quiet moment; `None`
    /// disables the staleness trigger.
    pub fn always_commit_after(mut self, bound: Option<Duration>) -> Self {
        self.always_commit_after = bound;
        self
    }

    /// Pre-register a change listener.
    pub fn observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Build the cache.
    pub fn build(self) -> CacheFs {
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));
        let observers = ObserverRegistry::new(self.observers);
        let scheduler = Scheduler::new(
            backend,
            observers,
            self.commit_delay,
            self.always_commit_after,
        );
        CacheFs {
            scheduler,
            cwd: StdMutex::new(self.cwd),
        }
    }
}
