//! The notification-driven synchronization engine.
//!
//! ## Key Responsibilities
//! - Serves reads from the in-memory [`NamespaceCache`], blocking exactly
//!   once per namespace to populate it on first access
//! - Runs the background long-poll loop against the remote service
//! - Reconciles with the disk fallback store when connectivity is lost
//! - Dispatches the registered change callback after every refresh
//!
//! ## Example Usage
//! ```ignore
//! let engine = EngineBuilder::new(settings).build()?;
//! engine.start().await?;
//! let timeout = engine.get_value("application", "timeout", "30", false).await;
//! engine.stop();
//! ```

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::cache::NamespaceCache;
use crate::cache::NamespaceEntry;
use crate::cache::NotificationTracker;
use crate::metrics::FALLBACK_LOAD_TOTAL;
use crate::metrics::NAMESPACE_REFRESH_TOTAL;
use crate::metrics::REFRESH_DURATION_METRIC;
use crate::metrics::SYNC_CYCLE_TOTAL;
use crate::network::LongPollOutcome;
use crate::network::NotificationChange;
use crate::network::RemoteConfigSource;
use crate::storage::FallbackStore;
use crate::utils::async_task::retry_with_timeout;
use crate::ConfigSnapshot;
use crate::Error;
use crate::NetworkError;
use crate::Result;
use crate::Settings;

/// Callback invoked with `(namespace, new_snapshot)` after a detected
/// change.
pub type ChangeListener = Arc<dyn Fn(&str, &ConfigSnapshot) + Send + Sync>;

/// Main entry point of the crate.
///
/// Cheap to clone; every clone shares the same cache, tracker and lifecycle
/// state. Construct through [`EngineBuilder`](super::EngineBuilder).
#[derive(Clone)]
pub struct SyncEngine {
    pub(crate) inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    pub(crate) settings: Settings,
    pub(crate) source: Arc<dyn RemoteConfigSource>,
    pub(crate) store: Arc<dyn FallbackStore>,
    pub(crate) cache: NamespaceCache,
    pub(crate) tracker: NotificationTracker,
    listener: Option<ChangeListener>,

    // Shutdown signal: `stop()` flips `stopping` and wakes the loop; only
    // the loop itself sets `stopped`, after it observed the flag and exited.
    shutdown_tx: watch::Sender<()>,
    shutdown_rx: watch::Receiver<()>,
    started: AtomicBool,
    stopping: AtomicBool,
    stopped: AtomicBool,
}

impl SyncEngine {
    pub(crate) fn new(
        settings: Settings,
        source: Arc<dyn RemoteConfigSource>,
        store: Arc<dyn FallbackStore>,
        listener: Option<ChangeListener>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        Self {
            inner: Arc::new(EngineInner {
                settings,
                source,
                store,
                cache: NamespaceCache::new(),
                tracker: NotificationTracker::new(),
                listener,
                shutdown_tx,
                shutdown_rx,
                started: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Registers the preload namespaces, runs one synchronous
    /// synchronization pass so no caller races a cold cache, then launches
    /// the background long-poll task.
    pub async fn start(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(Error::StartFailed("engine already started".to_string()));
        }

        for namespace in &self.inner.settings.sync.namespaces {
            self.inner.cache.entry_or_register(namespace, &self.inner.tracker);
        }

        if let Err(e) = self.inner.poll_once().await {
            warn!("initial synchronization failed: {}", e);
            if e.is_connectivity() {
                self.inner.seed_all_from_disk();
            }
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.run_loop().await;
        });
        info!("synchronization engine started");
        Ok(())
    }

    /// Signals the background loop to exit. Returns immediately; poll
    /// [`is_stopped`](SyncEngine::is_stopped) to confirm completion.
    pub fn stop(&self) {
        info!("Stopping sync listener...");
        self.inner.stopping.store(true, Ordering::SeqCst);
        let _ = self.inner.shutdown_tx.send(());
    }

    pub fn is_stopping(&self) -> bool {
        self.inner.stopping.load(Ordering::SeqCst)
    }

    /// True once the background loop has observed the stop signal and
    /// exited. An in-flight poll is not interrupted, so completion can lag
    /// `stop()` by up to one long-poll window.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Value for `key` in `namespace`.
    ///
    /// The very first read of a namespace performs one blocking long-poll +
    /// fetch cycle before returning, so it never silently reports
    /// `default_val` just because the background loop has not caught up yet.
    /// With `auto_fetch_on_miss`, a key absent from the snapshot triggers a
    /// single cached fetch; any failure there falls back to the disk record,
    /// then to `default_val`.
    pub async fn get_value(
        &self,
        namespace: &str,
        key: &str,
        default_val: &str,
        auto_fetch_on_miss: bool,
    ) -> String {
        let entry = self.ensure_namespace(namespace).await;
        if let Some(value) = entry.load().get(key) {
            return value.to_string();
        }
        if auto_fetch_on_miss {
            return self.fetch_on_miss(namespace, key, default_val).await;
        }
        default_val.to_string()
    }

    /// Value for `key` in `namespace`, without fetch-on-miss or default
    /// handling.
    pub async fn get(&self, namespace: &str, key: &str) -> Option<String> {
        let entry = self.ensure_namespace(namespace).await;
        entry.load().get(key).map(str::to_string)
    }

    /// Current snapshot of `namespace`, populating it on first access.
    /// Payload decoding (YAML/JSON blobs and the like) is the caller's
    /// concern; the engine only tracks keys and values.
    pub async fn snapshot(&self, namespace: &str) -> Arc<ConfigSnapshot> {
        self.ensure_namespace(namespace).await.load()
    }

    /// Resolves the namespace entry, performing the one-time blocking
    /// populate when this is the first access. Concurrent first reads are
    /// serialized by the per-namespace guard; whichever caller wins runs the
    /// cycle, the rest observe `Synced` and return.
    async fn ensure_namespace(&self, namespace: &str) -> Arc<NamespaceEntry> {
        let entry = self.inner.cache.entry_or_register(namespace, &self.inner.tracker);
        if entry.is_synced() {
            return entry;
        }

        let _guard = entry.populate_guard.lock().await;
        if entry.is_synced() {
            return entry.clone();
        }

        if let Err(e) = self.inner.poll_once().await {
            warn!("blocking populate for namespace '{}' failed: {}", namespace, e);
            if e.is_connectivity() {
                self.inner.seed_from_disk(namespace);
            }
        }
        // One attempt is enough: repeating the blocking fetch on every read
        // of an unreachable namespace would be worse than serving defaults.
        entry.mark_synced();
        entry.clone()
    }

    async fn fetch_on_miss(&self, namespace: &str, key: &str, default_val: &str) -> String {
        match self.inner.source.fetch_cached(namespace).await {
            Ok(snapshot) => {
                let value = snapshot.get(key).map(str::to_string);
                let snapshot = Arc::new(snapshot);
                let entry = self.inner.cache.entry_or_register(namespace, &self.inner.tracker);
                entry.install(snapshot.clone());
                self.inner.persist(namespace, &snapshot);
                value.unwrap_or_else(|| default_val.to_string())
            }
            Err(e) => {
                warn!("fetch-on-miss for namespace '{}' failed: {}", namespace, e);
                match self.inner.store.read(namespace) {
                    Ok(Some(snapshot)) => snapshot
                        .get(key)
                        .map(str::to_string)
                        .unwrap_or_else(|| default_val.to_string()),
                    Ok(None) => default_val.to_string(),
                    Err(storage_err) => {
                        warn!(
                            "disk read for namespace '{}' failed: {}",
                            namespace, storage_err
                        );
                        default_val.to_string()
                    }
                }
            }
        }
    }
}

impl EngineInner {
    /// One long-poll cycle: ask the server for changes against the full
    /// tracker snapshot, then refresh every changed namespace.
    pub(crate) async fn poll_once(&self) -> std::result::Result<(), NetworkError> {
        let notifications = self.tracker.snapshot();
        match self.source.long_poll(&notifications).await {
            Ok(LongPollOutcome::NoChange) => {
                SYNC_CYCLE_TOTAL.with_label_values(&["no_change"]).inc();
                debug!("no change, loop...");
                Ok(())
            }
            Ok(LongPollOutcome::Changed(changes)) => {
                SYNC_CYCLE_TOTAL.with_label_values(&["changed"]).inc();
                for change in changes {
                    self.refresh_namespace(&change).await;
                }
                Ok(())
            }
            Err(e) => {
                SYNC_CYCLE_TOTAL.with_label_values(&["error"]).inc();
                Err(e)
            }
        }
    }

    /// Re-fetches one namespace the server reported as changed, publishes
    /// the new snapshot and acknowledges the notification id. A refresh
    /// that fails after the retry budget leaves the tracker untouched, so
    /// the next cycle re-delivers the change.
    async fn refresh_namespace(&self, change: &NotificationChange) {
        let namespace = change.namespace.as_str();
        info!(
            "namespace '{}' has changes: notification_id={}",
            namespace, change.notification_id
        );

        let started_at = Instant::now();
        let policy = self.settings.retry.fetch;
        match retry_with_timeout(|| self.source.fetch_uncached(namespace), &policy).await {
            Ok(snapshot) => {
                info!(
                    "updated namespace '{}' release key '{}'",
                    namespace, snapshot.release_key
                );
                let snapshot = Arc::new(snapshot);
                let entry = self.cache.entry_or_register(namespace, &self.tracker);
                entry.install(snapshot.clone());
                entry.mark_synced();
                self.tracker.set(namespace, change.notification_id);
                self.persist(namespace, &snapshot);

                NAMESPACE_REFRESH_TOTAL.with_label_values(&[namespace]).inc();
                REFRESH_DURATION_METRIC
                    .with_label_values(&[namespace])
                    .observe(started_at.elapsed().as_millis() as f64);

                if let Some(listener) = &self.listener {
                    listener(namespace, &snapshot);
                }
            }
            Err(e) => {
                warn!("refresh of namespace '{}' failed: {}", namespace, e);
                let entry = self.cache.entry_or_register(namespace, &self.tracker);
                if !entry.is_synced() {
                    // Nothing live to serve yet; fall back to the last
                    // persisted record until the next cycle retries.
                    self.seed_from_disk(namespace);
                }
            }
        }
    }

    /// Installs the last persisted snapshot for `namespace`, if any.
    pub(crate) fn seed_from_disk(&self, namespace: &str) {
        match self.store.read(namespace) {
            Ok(Some(snapshot)) => {
                info!("serving namespace '{}' from disk fallback", namespace);
                FALLBACK_LOAD_TOTAL.inc();
                let entry = self.cache.entry_or_register(namespace, &self.tracker);
                entry.install(Arc::new(snapshot));
                entry.mark_synced();
            }
            Ok(None) => {
                debug!("no disk record for namespace '{}'", namespace);
            }
            Err(e) => {
                warn!("disk read for namespace '{}' failed: {}", namespace, e);
            }
        }
    }

    /// Seeds every namespace without a live snapshot from disk. Only used
    /// while the remote is unreachable; a namespace the loop has already
    /// refreshed is never regressed to its persisted state.
    pub(crate) fn seed_all_from_disk(&self) {
        let records = match self.store.load_all() {
            Ok(records) => records,
            Err(e) => {
                warn!("disk fallback scan failed: {}", e);
                return;
            }
        };
        for (namespace, snapshot) in records {
            let entry = self.cache.entry_or_register(&namespace, &self.tracker);
            if entry.is_synced() {
                continue;
            }
            info!("seeded namespace '{}' from disk fallback", namespace);
            FALLBACK_LOAD_TOTAL.inc();
            entry.install(Arc::new(snapshot));
            entry.mark_synced();
        }
    }

    fn persist(&self, namespace: &str, snapshot: &ConfigSnapshot) {
        // Disk persistence is advisory; a failed write never disturbs the
        // live cache.
        if let Err(e) = self.store.write(namespace, snapshot) {
            warn!("failed to persist namespace '{}': {}", namespace, e);
        }
    }

    /// The background listener: long-poll until told to stop. An in-flight
    /// poll is never cancelled; the `stopping` flag is checked between
    /// cycles and the error backoff is cut short by the shutdown signal.
    pub(crate) async fn run_loop(&self) {
        info!("Entering sync listener loop...");
        let mut shutdown = self.shutdown_rx.clone();
        let retry_delay = Duration::from_secs(self.settings.sync.long_poll_timeout_in_secs);

        loop {
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.poll_once().await {
                if self.stopping.load(Ordering::SeqCst) {
                    break;
                }
                warn!("long poll failed: {}", e);
                if e.is_connectivity() {
                    self.seed_all_from_disk();
                }
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = sleep(retry_delay) => {}
                }
            }
        }

        info!("Sync listener stopped!");
        self.stopped.store(true, Ordering::SeqCst);
    }
}
