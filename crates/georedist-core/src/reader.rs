//! Reader handles that survive database updates.
//!
//! [`open`] returns a [`ReaderHandle`] wrapping a reader built by the
//! caller's factory. Whenever the handle's updater publishes a new copy of
//! the database, the factory builds a fresh reader and the handle swaps it in.
//! Callers keep the same handle throughout; each call to
//! [`ReaderHandle::current`] or [`ReaderHandle::with`] sees the reader that is
//! active at that moment.
//!
//! A new reader is swapped in only once the factory has fully built it. If the
//! factory fails, the previous reader stays active and the failure is logged
//! and broadcast as [`UpdateEvent::Failed`].

use crate::config::UpdaterConfig;
use crate::db::{DbName, DbPaths};
use crate::error::UpdateError;
use crate::updater::{AutoUpdater, CheckOutcome, FailureSource, UpdateEvent};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// A reader over one database file.
pub trait DbReader: Send + Sync + 'static {
    /// Release the reader's resources. Called once when its handle is closed.
    fn close(&self) {}
}

struct Slot<R> {
    current: RwLock<Arc<R>>,
    closed: AtomicBool,
}

impl<R: DbReader> Slot<R> {
    fn get(&self) -> Arc<R> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Install `fresh` unless the handle was closed meanwhile.
    fn swap(&self, fresh: R) -> bool {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::Acquire) {
            drop(current);
            fresh.close();
            return false;
        }
        *current = Arc::new(fresh);
        true
    }
}

/// Stable handle to the current reader for one database.
pub struct ReaderHandle<R: DbReader> {
    db: DbName,
    slot: Arc<Slot<R>>,
    updater: Arc<AutoUpdater>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<R: DbReader> ReaderHandle<R> {
    /// Wrap `first` and follow `updater`'s `Updated` events, rebuilding with `factory`.
    pub(crate) fn attach<F, Fut>(
        db: DbName,
        updater: Arc<AutoUpdater>,
        first: R,
        factory: F,
    ) -> Self
    where
        F: Fn(PathBuf) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        let slot = Arc::new(Slot {
            current: RwLock::new(Arc::new(first)),
            closed: AtomicBool::new(false),
        });
        let events = updater.subscribe();
        let listener = tokio::spawn(follow_updates(
            db,
            events,
            factory,
            Arc::clone(&slot),
            Arc::clone(&updater),
        ));
        Self {
            db,
            slot,
            updater,
            listener: Mutex::new(Some(listener)),
        }
    }

    pub fn db(&self) -> DbName {
        self.db
    }

    /// The reader active right now. Holding the `Arc` keeps that reader alive
    /// across a swap; call again to pick up newer copies.
    pub fn current(&self) -> Arc<R> {
        self.slot.get()
    }

    /// Run `f` against the reader active right now.
    pub fn with<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        let reader = self.current();
        f(&reader)
    }

    /// The updater driving this handle, e.g. to subscribe to its events or force a check.
    pub fn updater(&self) -> &Arc<AutoUpdater> {
        &self.updater
    }

    /// Stop the updater and close the active reader. Idempotent.
    pub fn close(&self) {
        if self.slot.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.updater.close();
        if let Some(listener) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            listener.abort();
        }
        // Taken under the write lock so a concurrent swap either lands first or is refused.
        let last = Arc::clone(&self.slot.current.write().unwrap_or_else(PoisonError::into_inner));
        last.close();
        tracing::debug!(db = %self.db, "reader handle closed");
    }
}

impl<R: DbReader> Drop for ReaderHandle<R> {
    fn drop(&mut self) {
        self.close();
    }
}

async fn build<R, F, Fut>(factory: &F, path: &Path) -> Result<R, UpdateError>
where
    F: Fn(PathBuf) -> Fut,
    Fut: Future<Output = anyhow::Result<R>>,
{
    factory(path.to_path_buf())
        .await
        .map_err(|cause| UpdateError::Factory {
            path: path.to_path_buf(),
            cause,
        })
}

async fn follow_updates<R, F, Fut>(
    db: DbName,
    mut events: broadcast::Receiver<UpdateEvent>,
    factory: F,
    slot: Arc<Slot<R>>,
    updater: Arc<AutoUpdater>,
) where
    R: DbReader,
    F: Fn(PathBuf) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    loop {
        let path = match events.recv().await {
            Ok(UpdateEvent::Updated(paths)) => match paths.get(&db) {
                Some(path) => path.clone(),
                None => continue,
            },
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                // An `Updated` may be among the skipped events; the canonical path never changes.
                tracing::warn!(db = %db, skipped, "event receiver lagged, rebuilding reader");
                db.path_in(&updater.config().storage_dir)
            }
            Err(RecvError::Closed) => break,
        };

        match build(&factory, &path).await {
            Ok(fresh) => {
                if !slot.swap(fresh) {
                    break;
                }
                tracing::info!(db = %db, path = %path.display(), "reader swapped to updated database");
            }
            Err(e) => {
                tracing::warn!(db = %db, "keeping previous reader: {}", e);
                updater.emit(UpdateEvent::Failed {
                    source: FailureSource::Reader,
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Wait for the next `CheckOk` on `events`.
async fn next_check_ok(
    events: &mut broadcast::Receiver<UpdateEvent>,
    updater: &AutoUpdater,
) -> Result<DbPaths, UpdateError> {
    loop {
        match events.recv().await {
            Ok(UpdateEvent::CheckOk(paths)) => return Ok(paths),
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => {
                return Err(UpdateError::network(
                    &updater.config().mirror_url,
                    "updater closed before the first check completed",
                ))
            }
        }
    }
}

/// Open `db`: download or verify it, build the first reader, and keep it updated.
///
/// Resolves once a verified copy (new or already present) has been loaded.
/// Any failure before that point is returned and no handle is created.
pub async fn open<R, F, Fut>(
    db: DbName,
    factory: F,
    config: &UpdaterConfig,
) -> Result<ReaderHandle<R>, UpdateError>
where
    R: DbReader,
    F: Fn(PathBuf) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    let updater = AutoUpdater::new_async(config.for_dbs(&[db])).await?;
    let mut events = updater.subscribe();

    let first = async {
        let paths = match updater.check_for_updates(false).await? {
            CheckOutcome::UpToDate(paths) | CheckOutcome::Updated(paths) => paths,
            CheckOutcome::InFlight => next_check_ok(&mut events, &updater).await?,
        };
        let path = paths
            .get(&db)
            .cloned()
            .unwrap_or_else(|| db.path_in(&updater.config().storage_dir));
        tracing::debug!(db = %db, path = %path.display(), "building first reader");
        build(&factory, &path).await
    }
    .await;

    let first = match first {
        Ok(reader) => reader,
        Err(e) => {
            updater.close();
            return Err(e);
        }
    };
    drop(events);

    let handle = ReaderHandle::attach(db, Arc::clone(&updater), first, factory);
    updater.start_periodic();
    Ok(handle)
}
