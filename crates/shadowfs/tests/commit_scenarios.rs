//! End-to-end commit scenarios.
//!
//! Each test drives the facade against a backend that records every bulk
//! transaction, then asserts the exact payload the commit walk produced.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use shadowfs::{
    BackendMutex, BulkChanges, CacheFs, CacheObserver, Error, ErrorKind, FileEntry, FileType,
    MemoryBackend, Result, RmOptions, StorageBackend,
};

/// Backend wrapper that keeps a copy of every bulk payload it applies.
struct RecordingBackend {
    inner: MemoryBackend,
    bulks: Mutex<Vec<BulkChanges>>,
}

impl RecordingBackend {
    fn new(inner: MemoryBackend) -> Arc<Self> {
        Arc::new(RecordingBackend {
            inner,
            bulks: Mutex::new(Vec::new()),
        })
    }

    fn bulks(&self) -> Vec<BulkChanges> {
        self.bulks.lock().unwrap().clone()
    }

    fn last_bulk(&self) -> BulkChanges {
        self.bulks.lock().unwrap().last().cloned().expect("no bulk recorded")
    }
}

#[async_trait]
impl StorageBackend for RecordingBackend {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.inner.read_file(path).await
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<FileEntry>> {
        self.inner.read_dir(path).await
    }

    async fn linfo(&self, path: &str) -> Result<Option<FileEntry>> {
        self.inner.linfo(path).await
    }

    async fn bulk(&self, changes: BulkChanges) -> Result<()> {
        self.bulks.lock().unwrap().push(changes.clone());
        self.inner.bulk(changes).await
    }

    fn create_mutex(&self) -> Box<dyn BackendMutex> {
        self.inner.create_mutex()
    }
}

#[derive(Default)]
struct EventCounter {
    created: AtomicUsize,
    deleted: AtomicUsize,
}

impl CacheObserver for EventCounter {
    fn on_file_created(&self, _path: &str, _file_type: FileType) {
        self.created.fetch_add(1, Ordering::SeqCst);
    }
    fn on_file_deleted(&self, _path: &str) {
        self.deleted.fetch_add(1, Ordering::SeqCst);
    }
}

/// Cache with automatic commits disabled; flushes happen only on commit().
fn manual_fs(backend: Arc<RecordingBackend>) -> CacheFs {
    CacheFs::builder()
        .backend(backend)
        .commit_delay(None)
        .always_commit_after(None)
        .build()
}

#[tokio::test]
async fn fresh_tree_flushes_folders_top_down_and_file_bytes() {
    let backend = RecordingBackend::new(MemoryBackend::new());
    let fs = manual_fs(backend.clone());

    fs.mk_dir("/a", false).await.unwrap();
    fs.mk_dir("/a/b", false).await.unwrap();
    fs.write_file("/a/b/c", [0xDE, 0xAD]).await.unwrap();
    fs.commit().await.unwrap();

    let bulk = backend.last_bulk();
    assert!(bulk.to_delete.is_empty());
    let folders: Vec<&str> = bulk.folders_to_create.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(folders, vec!["/a", "/a/b"]);
    assert_eq!(bulk.files_to_write.len(), 1);
    assert_eq!(bulk.files_to_write[0].path, "/a/b/c");
    assert_eq!(bulk.files_to_write[0].data, vec![0xDE, 0xAD]);

    // The backend now serves the flushed state to a fresh tree.
    assert_eq!(fs.read_file("/a/b/c").await.unwrap(), vec![0xDE, 0xAD]);
}

#[tokio::test]
async fn overwriting_backend_file_writes_without_delete() {
    let store = MemoryBackend::new();
    store.add_file("/x", b"old");
    let backend = RecordingBackend::new(store);
    let fs = manual_fs(backend.clone());

    fs.write_file("/x", [0x00]).await.unwrap();
    fs.commit().await.unwrap();

    let bulk = backend.last_bulk();
    assert!(bulk.to_delete.is_empty());
    assert_eq!(bulk.files_to_write.len(), 1);
    assert_eq!(bulk.files_to_write[0].path, "/x");
    assert_eq!(bulk.files_to_write[0].data, vec![0x00]);
}

#[tokio::test]
async fn replacing_file_with_directory_deletes_then_creates() {
    let store = MemoryBackend::new();
    store.add_file("/x", b"old");
    let backend = RecordingBackend::new(store);
    let fs = manual_fs(backend.clone());

    fs.rm("/x", RmOptions::default()).await.unwrap();
    fs.mk_dir("/x", false).await.unwrap();
    fs.commit().await.unwrap();

    let bulk = backend.last_bulk();
    assert_eq!(bulk.to_delete, vec!["/x".to_string()]);
    let folders: Vec<&str> = bulk.folders_to_create.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(folders, vec!["/x"]);
}

#[tokio::test]
async fn read_dir_is_a_pure_read() {
    let store = MemoryBackend::new();
    store.add_file("/d/a", b"1");
    store.add_file("/d/b", b"2");
    store.add_file("/d/c", b"3");
    let backend = RecordingBackend::new(store);
    let fs = manual_fs(backend.clone());

    let counter = Arc::new(EventCounter::default());
    fs.add_observer(counter.clone());

    let mut names = fs.read_dir("/d", false).await.unwrap();
    names.sort();
    assert_eq!(names, vec!["a", "b", "c"]);

    assert_eq!(counter.created.load(Ordering::SeqCst), 0);
    fs.commit().await.unwrap();
    assert!(backend.bulks().is_empty(), "pure reads must not flush");
}

#[tokio::test]
async fn symlink_loop_fails_with_chain_error() {
    let store = MemoryBackend::new();
    store.add_symlink("/a", "/b");
    store.add_symlink("/b", "/a");
    let backend = RecordingBackend::new(store);
    let fs = manual_fs(backend);

    let err = fs.read_file("/a").await.unwrap_err();
    assert!(matches!(err, Error::SymlinkChain { ref path } if path == "/a"));
}

#[tokio::test]
async fn non_empty_directory_removal_needs_recursive() {
    let store = MemoryBackend::new();
    store.add_file("/d/inner/file", b"x");
    let backend = RecordingBackend::new(store);
    let fs = manual_fs(backend.clone());

    let err = fs
        .rm("/d", RmOptions { recursive: false, folder: true })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotEmpty));

    fs.rm("/d", RmOptions { recursive: true, folder: true })
        .await
        .unwrap();
    fs.commit().await.unwrap();

    let bulk = backend.last_bulk();
    // One recursive delete entry; the backend removes the subtree itself.
    assert_eq!(bulk.to_delete, vec!["/d".to_string()]);
    assert!(fs.linfo("/d/inner/file").await.unwrap().is_none());
}

#[tokio::test]
async fn symlink_only_change_still_flushes() {
    let backend = RecordingBackend::new(MemoryBackend::new());
    let fs = manual_fs(backend.clone());

    fs.mk_lnk("/l", "/elsewhere").await.unwrap();
    fs.commit().await.unwrap();

    let bulk = backend.last_bulk();
    assert_eq!(bulk.symlinks_to_create.len(), 1);
    assert_eq!(bulk.symlinks_to_create[0].path, "/l");
    assert_eq!(bulk.symlinks_to_create[0].destination, "/elsewhere");
}

#[tokio::test]
async fn empty_commit_skips_bulk_entirely() {
    let backend = RecordingBackend::new(MemoryBackend::new());
    let fs = manual_fs(backend.clone());

    // Nothing ever touched the tree: commit is a no-op.
    fs.commit().await.unwrap();
    // A pure read materialises the tree but changes nothing.
    assert_eq!(fs.read_dir("/", false).await.unwrap().len(), 0);
    fs.commit().await.unwrap();

    assert!(backend.bulks().is_empty());
}

#[tokio::test]
async fn create_then_delete_is_net_zero() {
    let backend = RecordingBackend::new(MemoryBackend::new());
    let fs = manual_fs(backend.clone());

    fs.mk_dir("/ephemeral", false).await.unwrap();
    fs.rm("/ephemeral", RmOptions { recursive: false, folder: true })
        .await
        .unwrap();
    fs.commit().await.unwrap();

    for bulk in backend.bulks() {
        assert!(bulk.to_delete.is_empty());
        assert!(bulk.folders_to_create.is_empty());
        assert!(bulk.files_to_write.is_empty());
    }
}

#[tokio::test]
async fn commit_failure_still_drops_the_tree() {
    /// Backend whose bulk always fails.
    struct FailingBackend {
        inner: MemoryBackend,
    }

    #[async_trait]
    impl StorageBackend for FailingBackend {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.inner.read_file(path).await
        }
        async fn read_dir(&self, path: &str) -> Result<Vec<FileEntry>> {
            self.inner.read_dir(path).await
        }
        async fn linfo(&self, path: &str) -> Result<Option<FileEntry>> {
            self.inner.linfo(path).await
        }
        async fn bulk(&self, _changes: BulkChanges) -> Result<()> {
            Err(std::io::Error::other("store offline").into())
        }
        fn create_mutex(&self) -> Box<dyn BackendMutex> {
            self.inner.create_mutex()
        }
    }

    let fs = CacheFs::builder()
        .backend(Arc::new(FailingBackend { inner: MemoryBackend::new() }))
        .commit_delay(None)
        .always_commit_after(None)
        .build();

    fs.write_file("/doomed", b"bytes").await.unwrap();
    assert!(fs.commit().await.is_err());

    // The shadow tree was dropped with the failed flush: the write is gone
    // and the next operation sees the backend's state again.
    assert!(fs.linfo("/doomed").await.unwrap().is_none());
}
