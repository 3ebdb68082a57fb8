//! Background updater.
//!
//! Keeps the databases in one storage directory in sync with the mirror:
//! check → (download → re-check) → publish, on a fixed timer and on demand.
//! Checks and downloads are each single-flight per updater. Progress is
//! broadcast as [`UpdateEvent`]s.
//!
//! Two-strike policy: a stale or missing local copy triggers one download,
//! but a copy that still fails verification right after being downloaded is
//! reported as an error rather than downloaded again.

mod event;
mod guard;

pub use event::{CheckOutcome, FailureSource, UpdateEvent};

use crate::checksum;
use crate::config::UpdaterConfig;
use crate::db::DbPaths;
use crate::downloader;
use crate::error::UpdateError;
use crate::mirror::Mirror;
use guard::FlightGuard;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterState {
    Idle,
    Checking,
    Downloading,
}

pub struct AutoUpdater {
    config: UpdaterConfig,
    mirror: Mirror,
    checking: AtomicBool,
    /// Signalled each time `checking` clears.
    check_released: Notify,
    downloading: AtomicBool,
    /// `None` once closed; dropping the sender detaches every subscriber.
    events: Mutex<Option<broadcast::Sender<UpdateEvent>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl AutoUpdater {
    /// Create an updater for `config`. Removes any staging directory left by an
    /// interrupted run. The timer is not started; call [`AutoUpdater::start`].
    ///
    /// The cleanup blocks the calling thread; async callers use [`AutoUpdater::new_async`].
    pub fn new(config: UpdaterConfig) -> Result<Arc<Self>, UpdateError> {
        let updater = Self::build(config)?;
        if let Err(e) = downloader::cleanup_staging_dir_blocking(&updater.config.staging_dir()) {
            tracing::warn!("could not remove leftover staging dir: {}", e);
        }
        Ok(updater)
    }

    /// [`AutoUpdater::new`] with the staging cleanup run off the async worker.
    pub async fn new_async(config: UpdaterConfig) -> Result<Arc<Self>, UpdateError> {
        let updater = Self::build(config)?;
        if let Err(e) = downloader::cleanup_staging_dir(&updater.config.staging_dir()).await {
            tracing::warn!("could not remove leftover staging dir: {}", e);
        }
        Ok(updater)
    }

    fn build(mut config: UpdaterConfig) -> Result<Arc<Self>, UpdateError> {
        let mirror = Mirror::new(&config.mirror_url)?;
        if config.storage_dir.is_relative() {
            if let Ok(cwd) = std::env::current_dir() {
                config.storage_dir = cwd.join(&config.storage_dir);
            }
        }
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Arc::new(Self {
            config,
            mirror,
            checking: AtomicBool::new(false),
            check_released: Notify::new(),
            downloading: AtomicBool::new(false),
            events: Mutex::new(Some(tx)),
            timer: Mutex::new(None),
        }))
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn state(&self) -> UpdaterState {
        if self.downloading.load(Ordering::Acquire) {
            UpdaterState::Downloading
        } else if self.checking.load(Ordering::Acquire) {
            UpdaterState::Checking
        } else {
            UpdaterState::Idle
        }
    }

    /// Receive every event emitted from now on. After `close` the receiver is already closed.
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        match self.events.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    pub(crate) fn emit(&self, event: UpdateEvent) {
        if let Some(tx) = self.events.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            // No subscribers is not an error.
            let _ = tx.send(event);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Compare local copies with the mirror; download when they are stale or missing.
    ///
    /// With `is_retry`, an integrity failure is returned instead of triggering
    /// another download. Other error classes never trigger a download.
    pub async fn check_for_updates(&self, is_retry: bool) -> Result<CheckOutcome, UpdateError> {
        match self.verify_single_flight().await {
            None => {
                tracing::debug!("check already in progress, skipping");
                Ok(CheckOutcome::InFlight)
            }
            Some(Ok(paths)) => Ok(CheckOutcome::UpToDate(paths)),
            Some(Err(e)) if e.is_integrity() && !is_retry => {
                tracing::info!("{}; downloading fresh copies", e);
                self.update().await
            }
            Some(Err(e)) => Err(e),
        }
    }

    /// Download every tracked database, re-verify, and emit `Updated` on success.
    pub async fn update(&self) -> Result<CheckOutcome, UpdateError> {
        let Some(_guard) = FlightGuard::try_acquire(&self.downloading) else {
            tracing::debug!("download already in progress, skipping");
            return Ok(CheckOutcome::InFlight);
        };
        self.emit(UpdateEvent::Downloading);

        let result = self.download_and_confirm().await;

        if let Err(e) = downloader::cleanup_staging_dir(&self.config.staging_dir()).await {
            tracing::warn!("{}", e);
        }
        let paths = result?;
        tracing::info!(count = paths.len(), "databases updated");
        self.emit(UpdateEvent::Updated(paths.clone()));
        Ok(CheckOutcome::Updated(paths))
    }

    async fn download_and_confirm(&self) -> Result<DbPaths, UpdateError> {
        let paths =
            downloader::download(&self.mirror, &self.config.dbs, &self.config.storage_dir).await?;
        self.confirm().await?;
        Ok(paths)
    }

    /// Verify the freshly published copies. A check already running may have
    /// read the files before the publish, so wait for it to finish and run a
    /// separate pass.
    async fn confirm(&self) -> Result<DbPaths, UpdateError> {
        loop {
            let released = self.check_released.notified();
            tokio::pin!(released);
            // Registered before trying the flag, so a release in between is not missed.
            released.as_mut().enable();
            if let Some(res) = self.verify_single_flight().await {
                return res;
            }
            tracing::debug!("waiting for the running check before confirming the download");
            released.await;
        }
    }

    /// One guarded checksum comparison. `None` when a check is already running.
    /// The checking flag is released before this returns, so a follow-up
    /// download can run its own confirmation check.
    async fn verify_single_flight(&self) -> Option<Result<DbPaths, UpdateError>> {
        let _guard = FlightGuard::try_acquire_notifying(&self.checking, &self.check_released)?;
        self.emit(UpdateEvent::Checking);
        let res =
            checksum::verify(&self.mirror, &self.config.dbs, &self.config.storage_dir).await;
        if let Ok(paths) = &res {
            self.emit(UpdateEvent::CheckOk(paths.clone()));
        }
        self.emit(UpdateEvent::DoneChecking);
        Some(res)
    }

    /// Start the timer: one check after `initial_check_delay`, then one every `update_period`.
    pub fn start(self: &Arc<Self>) {
        self.spawn_timer(self.config.initial_check_delay);
    }

    /// Start the timer without the initial check; the first one runs after `update_period`.
    pub fn start_periodic(self: &Arc<Self>) {
        self.spawn_timer(self.config.update_period);
    }

    fn spawn_timer(self: &Arc<Self>, first_delay: Duration) {
        if self.is_closed() {
            return;
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.update_period;
        let handle = tokio::spawn(async move {
            let mut next = tokio::time::Instant::now() + first_delay;
            loop {
                tokio::time::sleep_until(next).await;
                next += period;
                let Some(updater) = weak.upgrade() else {
                    break;
                };
                // Own task, so aborting the timer never cuts a check or download short.
                tokio::spawn(async move { updater.run_scheduled_check().await });
            }
        });
        let previous = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    async fn run_scheduled_check(&self) {
        if let Err(e) = self.check_for_updates(false).await {
            tracing::warn!("scheduled update check failed: {}", e);
            self.emit(UpdateEvent::Failed {
                source: FailureSource::Updater,
                message: e.to_string(),
            });
        }
    }

    /// Stop the timer and detach all subscribers. Work already running finishes. Idempotent.
    pub fn close(&self) {
        if let Some(timer) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            timer.abort();
        }
        let sender = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            tracing::debug!(dir = %self.config.storage_dir.display(), "updater closed");
        }
    }
}

impl Drop for AutoUpdater {
    fn drop(&mut self) {
        if let Some(timer) = self
            .timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            timer.abort();
        }
    }
}
