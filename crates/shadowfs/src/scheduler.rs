//! Operation serialisation and commit scheduling.
//!
//! Every facade call runs as one operation: it bumps the in-flight counter,
//! cancels any armed idle-commit timer, then locks the cache state. The
//! state lock is a fair async mutex, so operations run strictly in enqueue
//! order and no two operations' tree mutations interleave. When the counter
//! drains to zero the scheduler decides between the two commit triggers:
//! an immediate flush once `always_commit_after` has elapsed since the last
//! commit, or a one-shot idle timer of `commit_delay` otherwise.
//!
//! The backend mutex is acquired by the first operation after a commit and
//! held until the next commit releases it, so the cache is the backend's
//! exclusive writer for the whole span. A stale acquisition (someone else
//! flushed in between) surfaces as `on_possible_unknown_changes`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::backend::{AcquireStatus, BackendMutex, StorageBackend};
use crate::cache::{build_changes, FileCache};
use crate::error::Result;
use crate::observer::ObserverRegistry;

/// Idle window after the last operation before an automatic flush.
pub const DEFAULT_COMMIT_DELAY: Duration = Duration::from_millis(500);

/// Absolute bound on staleness since the last flush.
pub const DEFAULT_ALWAYS_COMMIT_AFTER: Duration = Duration::from_millis(5000);

/// Cache state guarded by the operation lock.
pub(crate) struct CoreState {
    pub cache: FileCache,
    mutex: Box<dyn BackendMutex>,
    lock_held: bool,
}

pub(crate) struct Scheduler {
    backend: Arc<dyn StorageBackend>,
    pub observers: ObserverRegistry,
    state: AsyncMutex<CoreState>,
    in_flight: AtomicUsize,
    timer: StdMutex<Option<JoinHandle<()>>>,
    last_commit: StdMutex<Instant>,
    commit_delay: Option<Duration>,
    always_commit_after: Option<Duration>,
}

impl Scheduler {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        observers: ObserverRegistry,
        commit_delay: Option<Duration>,
        always_commit_after: Option<Duration>,
    ) -> Arc<Self> {
        let state = CoreState {
            cache: FileCache::new(Arc::clone(&backend)),
            mutex: backend.create_mutex(),
            lock_held: false,
        };
        Arc::new(Scheduler {
            backend,
            observers,
            state: AsyncMutex::new(state),
            in_flight: AtomicUsize::new(0),
            timer: StdMutex::new(None),
            last_commit: StdMutex::new(Instant::now()),
            commit_delay,
            always_commit_after,
        })
    }

    /// Begin an operation: bump the in-flight counter and disarm any pending
    /// idle commit. The returned guard finishes the operation on drop.
    pub fn begin_op(self: &Arc<Self>) -> OpGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.cancel_timer();
        OpGuard {
            scheduler: Arc::clone(self),
        }
    }

    /// Lock the cache state and make sure the backend mutex is held.
    ///
    /// The mutex stays held across operations until the next commit; a stale
    /// acquisition notifies the observers, but the current tree stays valid.
    pub async fn session(&self) -> Result<MutexGuard<'_, CoreState>> {
        let mut state = self.state.lock().await;
        if !state.lock_held {
            let status = state.mutex.acquire().await?;
            state.lock_held = true;
            if status == AcquireStatus::Stale {
                self.observers.possible_unknown_changes();
            }
        }
        Ok(state)
    }

    fn cancel_timer(&self) {
        if let Some(handle) = self
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }

    /// Take the armed timer handle without aborting it. Used by the timer
    /// task itself so an explicit commit cannot abort a flush in progress.
    fn disarm_timer(&self) {
        self.timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    fn op_finished(self: &Arc<Self>) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }
        let elapsed = self
            .last_commit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed();
        if self
            .always_commit_after
            .is_some_and(|bound| elapsed >= bound)
        {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.background_commit().await;
            });
        } else if let Some(delay) = self.commit_delay {
            let scheduler = Arc::clone(self);
            let handle = tokio::spawn(async move {
                sleep(delay).await;
                scheduler.disarm_timer();
                scheduler.background_commit().await;
            });
            *self.timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        }
    }

    async fn background_commit(&self) {
        if let Err(err) = self.locked_commit().await {
            warn!(error = %err, "background commit failed");
        }
    }

    /// Cancel any pending idle commit and flush immediately.
    pub async fn commit(&self) -> Result<()> {
        self.cancel_timer();
        self.locked_commit().await
    }

    async fn locked_commit(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.perform_commit(&mut state).await
    }

    async fn perform_commit(&self, state: &mut CoreState) -> Result<()> {
        let result = if state.cache.has_root() {
            let changes = build_changes(&state.cache);
            if changes.is_empty() {
                debug!("commit skipped, no pending changes");
                Ok(())
            } else {
                debug!(
                    deletes = changes.to_delete.len(),
                    folders = changes.folders_to_create.len(),
                    files = changes.files_to_write.len(),
                    symlinks = changes.symlinks_to_create.len(),
                    metas = changes.meta_updates.len(),
                    "flushing bulk changes"
                );
                self.backend.bulk(changes).await
            }
        } else {
            Ok(())
        };

        // Even a failed bulk releases the mutex and drops the tree, so the
        // next operation starts fresh against the backend.
        if state.lock_held {
            state.mutex.release();
            state.lock_held = false;
        }
        state.cache.dismantle();
        *self.last_commit.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
        result
    }
}

/// In-flight marker for one operation.
pub(crate) struct OpGuard {
    scheduler: Arc<Scheduler>,
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        self.scheduler.op_finished();
    }
}
