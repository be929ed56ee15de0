//! A single remote resource: its in-memory value, its cache file, and the
//! single-flight fetch that fills both.
//!
//! Status transitions:
//!
//! ```text
//! Ready ──fetch──▶ InProgress ──ok──▶ Loaded(Network)
//!   │                  └─────err────▶ Failed
//!   └──disk hit──▶ Loaded(Disk) ──refresh──▶ InProgress
//! ```
//!
//! `Loaded(Network)` and `Failed` are final for the box; `retry()` is the only
//! way back from `Failed`. A fetch task that disappears without a result (its
//! runtime shut down, or the decoder panicked) leaves the box `Failed` with
//! [`ResourceError::Interrupted`] once anyone awaits it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use super::disk;
use crate::api::Fetch;
use crate::decode::DecodeFn;
use crate::error::{ResourceError, Result};

type SharedFetch<V> = Shared<BoxFuture<'static, Result<Arc<V>>>>;

/// Where the current in-memory value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Disk,
    Network,
}

/// Snapshot of a box's status, safe to hand out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Ready,
    InProgress,
    Loaded(Origin),
    Failed(ResourceError),
}

enum Status<V> {
    Ready,
    /// The fetch id tells a stale handle apart from the current one.
    InProgress(u64, SharedFetch<V>),
    Loaded(Origin),
    Failed(ResourceError),
}

struct State<V> {
    value: Option<Arc<V>>,
    status: Status<V>,
    fetches: u64,
}

enum FetchStep<V> {
    Done(Result<Arc<V>>),
    Join(SharedFetch<V>),
}

/// Owns the lifecycle of one remote resource.
///
/// All mutation goes through the box's own methods; callers only ever see
/// `Arc<V>` snapshots of the value.
pub struct ResourceBox<V> {
    remote_url: Url,
    cache_file: PathBuf,
    decode: DecodeFn<V>,
    fetcher: Arc<dyn Fetch>,
    state: Mutex<State<V>>,
    changes: watch::Sender<Option<Arc<V>>>,
}

impl<V: Send + Sync + 'static> ResourceBox<V> {
    pub fn new(
        remote_url: Url,
        cache_file: PathBuf,
        decode: DecodeFn<V>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            remote_url,
            cache_file,
            decode,
            fetcher,
            state: Mutex::new(State {
                value: None,
                status: Status::Ready,
                fetches: 0,
            }),
            changes,
        }
    }

    pub fn remote_url(&self) -> &Url {
        &self.remote_url
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// The current in-memory value, without any I/O.
    pub fn value(&self) -> Option<Arc<V>> {
        self.state.lock().value.clone()
    }

    pub fn status(&self) -> LoadStatus {
        match &self.state.lock().status {
            Status::Ready => LoadStatus::Ready,
            Status::InProgress(..) => LoadStatus::InProgress,
            Status::Loaded(origin) => LoadStatus::Loaded(*origin),
            Status::Failed(e) => LoadStatus::Failed(e.clone()),
        }
    }

    /// Whether a cache file for this resource exists on disk.
    pub fn is_cached(&self) -> bool {
        disk::is_file(&self.cache_file)
    }

    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        disk::modified_at(&self.cache_file)
    }

    /// Age of the cache file for display, `None` if nothing is cached.
    pub fn age_display(&self) -> Option<String> {
        self.cached_at()
            .map(|cached_at| disk::age_display(cached_at, Utc::now()))
    }

    /// Value-changed notifications. Every value stored in the box is published.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<V>>> {
        self.changes.subscribe()
    }

    /// Reset a failed box so the next request fetches again.
    ///
    /// Returns `false` (and changes nothing) unless the box is `Failed`.
    pub fn retry(&self) -> bool {
        let mut state = self.state.lock();
        if matches!(state.status, Status::Failed(_)) {
            debug!(url = %self.remote_url, "Resetting failed resource");
            state.status = Status::Ready;
            true
        } else {
            false
        }
    }

    /// Best-effort, non-blocking read of the value.
    ///
    /// Memory first, then the cache file. If `refresh` is set, or nothing
    /// could be produced, a background fetch is started; its errors are
    /// logged and swallowed.
    pub fn load(self: &Arc<Self>, refresh: bool) -> Option<Arc<V>> {
        if let Some(value) = self.value() {
            return Some(value);
        }

        let value = self.load_from_disk();
        if refresh || value.is_none() {
            self.fetch_in_background();
        }
        value
    }

    /// Produce the value, fetching it if needed, and surface any error.
    pub async fn await_value(self: &Arc<Self>) -> Result<Arc<V>> {
        if let Some(value) = self.value() {
            return Ok(value);
        }
        if let Some(value) = self.load_from_disk() {
            return Ok(value);
        }
        self.fetch().await
    }

    /// Fetch the resource over the network.
    ///
    /// Single-flight: while a fetch is in progress every caller awaits that
    /// same fetch. A box already loaded from the network returns its value,
    /// and a failed box returns its error until [`retry`](Self::retry).
    pub async fn fetch(self: &Arc<Self>) -> Result<Arc<V>> {
        match self.begin_fetch() {
            FetchStep::Done(result) => result,
            FetchStep::Join(fetch) => fetch.await,
        }
    }

    /// Read and decode the cache file.
    ///
    /// A file that can't be read or decoded is deleted before the error is
    /// returned, so the next attempt goes to the network.
    pub fn read(&self) -> Result<V> {
        let result = disk::read(&self.cache_file)
            .map_err(|e| ResourceError::persistence(&self.cache_file, e))
            .and_then(|data| (self.decode)(&data).map_err(ResourceError::from));

        if let Err(e) = &result {
            debug!(path = ?self.cache_file, error = %e, "Discarding unreadable cache file");
            if let Err(e) = disk::remove(&self.cache_file) {
                warn!(path = ?self.cache_file, error = %e, "Failed to remove cache file");
            }
        }
        result
    }

    fn load_from_disk(&self) -> Option<Arc<V>> {
        if !matches!(self.state.lock().status, Status::Ready) || !self.is_cached() {
            return None;
        }

        let value = Arc::new(self.read().ok()?);
        let mut state = self.state.lock();
        if let Some(existing) = &state.value {
            // A fetch finished while we were reading; it wins.
            return Some(existing.clone());
        }
        state.value = Some(value.clone());
        if matches!(state.status, Status::Ready) {
            state.status = Status::Loaded(Origin::Disk);
        }
        drop(state);

        debug!(url = %self.remote_url, path = ?self.cache_file, "Loaded resource from cache file");
        self.changes.send_replace(Some(value.clone()));
        Some(value)
    }

    fn fetch_in_background(self: &Arc<Self>) {
        if Handle::try_current().is_err() {
            warn!(url = %self.remote_url, "No async runtime, skipping background fetch");
            return;
        }
        // The fetch task is spawned eagerly, so dropping the handle is fine.
        if let FetchStep::Done(Err(e)) = self.begin_fetch() {
            debug!(url = %self.remote_url, error = %e, "Background fetch not started");
        }
    }

    fn begin_fetch(self: &Arc<Self>) -> FetchStep<V> {
        let mut state = self.state.lock();

        if let Status::InProgress(_, fetch) = &state.status {
            return FetchStep::Join(fetch.clone());
        }
        if let Status::Failed(e) = &state.status {
            return FetchStep::Done(Err(e.clone()));
        }
        if let (Status::Loaded(Origin::Network), Some(value)) = (&state.status, &state.value) {
            return FetchStep::Done(Ok(value.clone()));
        }

        state.fetches += 1;
        let id = state.fetches;
        let fetch = self.spawn_fetch(id);
        state.status = Status::InProgress(id, fetch.clone());
        FetchStep::Join(fetch)
    }

    /// Start the network fetch and return a handle every caller can await.
    ///
    /// On a tokio runtime the fetch runs as its own task and completes even if
    /// every caller stops waiting. Without one, the first caller to poll the
    /// handle drives it.
    fn spawn_fetch(self: &Arc<Self>, id: u64) -> SharedFetch<V> {
        let this = Arc::clone(self);
        let Ok(handle) = Handle::try_current() else {
            return async move {
                let result = this.run_fetch().await;
                this.settle(&result);
                result
            }
            .boxed()
            .shared();
        };

        let (sender, receiver) = oneshot::channel();
        handle.spawn(async move {
            let result = this.run_fetch().await;
            this.settle(&result);
            sender.send(result).ok();
        });

        // Weak: the handle lives inside the box's own state.
        let owner = Arc::downgrade(self);
        receiver
            .map(move |result| match result {
                Ok(result) => result,
                Err(_canceled) => {
                    if let Some(owner) = Weak::upgrade(&owner) {
                        owner.interrupt(id);
                    }
                    Err(ResourceError::Interrupted)
                }
            })
            .boxed()
            .shared()
    }

    /// Mark fetch `id` as lost, unless a newer fetch already replaced it.
    fn interrupt(&self, id: u64) {
        let mut state = self.state.lock();
        if !matches!(state.status, Status::InProgress(current, _) if current == id) {
            return;
        }
        state.status = Status::Failed(ResourceError::Interrupted);
        drop(state);
        warn!(url = %self.remote_url, "Fetch task ended without a result");
    }

    async fn run_fetch(&self) -> Result<Arc<V>> {
        info!(url = %self.remote_url, "Fetching resource");
        let data = self.fetcher.get(&self.remote_url).await?;

        if let Err(e) = disk::persist(&self.cache_file, &data) {
            warn!(url = %self.remote_url, error = %e, "Failed to cache resource, keeping it in memory only");
        }

        match (self.decode)(&data) {
            Ok(value) => Ok(Arc::new(value)),
            Err(e) => {
                // Don't leave bytes on disk that we already know are bad
                disk::remove(&self.cache_file).ok();
                Err(e.into())
            }
        }
    }

    fn settle(&self, result: &Result<Arc<V>>) {
        let mut state = self.state.lock();
        match result {
            Ok(value) => {
                state.value = Some(value.clone());
                state.status = Status::Loaded(Origin::Network);
                drop(state);
                debug!(url = %self.remote_url, "Resource loaded");
                self.changes.send_replace(Some(value.clone()));
            }
            Err(e) => {
                state.status = Status::Failed(e.clone());
                drop(state);
                warn!(url = %self.remote_url, error = %e, "Failed to fetch resource");
            }
        }
    }
}

impl<V> fmt::Debug for ResourceBox<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBox")
            .field("remote_url", &self.remote_url.as_str())
            .field("cache_file", &self.cache_file)
            .field("value", &std::any::type_name::<V>())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
