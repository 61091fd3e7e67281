//! Change notification listeners.
//!
//! Listeners are dispatched synchronously from within the operation that
//! caused the change, before that operation completes. Dispatch iterates a
//! snapshot of the listener set, so a callback may unregister listeners
//! without upsetting the iteration, and a panicking callback is contained
//! rather than aborting the operation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::types::FileType;

/// Receiver of filesystem change notifications.
///
/// All methods have empty default bodies; implement the ones you care about.
/// Callbacks run on the operation's task while cache state is held, so they
/// must be quick and must not block on further cache operations.
pub trait CacheObserver: Send + Sync {
    /// An entry was created at `path`.
    fn on_file_created(&self, path: &str, file_type: FileType) {
        let _ = (path, file_type);
    }

    /// An existing file's contents were overwritten.
    fn on_file_contents_changed(&self, path: &str, file_type: FileType) {
        let _ = (path, file_type);
    }

    /// The entry at `path` was removed.
    fn on_file_deleted(&self, path: &str) {
        let _ = path;
    }

    /// Another holder of the backend mutex modified the backend since our
    /// last flush. Advisory only; the cache keeps serving its current state.
    fn on_possible_unknown_changes(&self) {}
}

/// Registered listener set with snapshot dispatch.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    listeners: RwLock<Vec<Arc<dyn CacheObserver>>>,
}

impl ObserverRegistry {
    pub fn new(initial: Vec<Arc<dyn CacheObserver>>) -> Self {
        ObserverRegistry {
            listeners: RwLock::new(initial),
        }
    }

    pub fn add(&self, observer: Arc<dyn CacheObserver>) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    pub fn remove(&self, observer: &Arc<dyn CacheObserver>) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|l| !Arc::ptr_eq(l, observer));
    }

    fn snapshot(&self) -> Vec<Arc<dyn CacheObserver>> {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn dispatch(&self, call: impl Fn(&dyn CacheObserver)) {
        for listener in self.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| call(listener.as_ref()))).is_err() {
                warn!("filesystem observer panicked during dispatch");
            }
        }
    }

    pub fn file_created(&self, path: &str, file_type: FileType) {
        self.dispatch(|l| l.on_file_created(path, file_type));
    }

    pub fn file_contents_changed(&self, path: &str, file_type: FileType) {
        self.dispatch(|l| l.on_file_contents_changed(path, file_type));
    }

    pub fn file_deleted(&self, path: &str) {
        self.dispatch(|l| l.on_file_deleted(path));
    }

    pub fn possible_unknown_changes(&self) {
        self.dispatch(|l| l.on_possible_unknown_changes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        created: AtomicUsize,
        deleted: AtomicUsize,
    }

    impl CacheObserver for Counter {
        fn on_file_created(&self, _path: &str, _file_type: FileType) {
            self.created.fetch_add(1, Ordering::SeqCst);
        }
        fn on_file_deleted(&self, _path: &str) {
            self.deleted.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicker;

    impl CacheObserver for Panicker {
        fn on_file_created(&self, _path: &str, _file_type: FileType) {
            panic!("listener bug");
        }
    }

    #[test]
    fn dispatches_to_all_listeners() {
        let registry = ObserverRegistry::default();
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());
        registry.add(a.clone());
        registry.add(b.clone());

        registry.file_created("/x", FileType::File);
        registry.file_deleted("/x");

        assert_eq!(a.created.load(Ordering::SeqCst), 1);
        assert_eq!(b.created.load(Ordering::SeqCst), 1);
        assert_eq!(a.deleted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_listener_no_longer_fires() {
        let registry = ObserverRegistry::default();
        let a = Arc::new(Counter::default());
        registry.add(a.clone());
        let handle: Arc<dyn CacheObserver> = a.clone();
        registry.remove(&handle);

        registry.file_created("/x", FileType::File);
        assert_eq!(a.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_listener_does_not_stop_dispatch() {
        let registry = ObserverRegistry::default();
        let counter = Arc::new(Counter::default());
        registry.add(Arc::new(Panicker));
        registry.add(counter.clone());

        registry.file_created("/x", FileType::File);
        assert_eq!(counter.created.load(Ordering::SeqCst), 1);
    }
}
