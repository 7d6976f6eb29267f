use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use super::ConfigSnapshot;
use super::NotificationTracker;

const STATE_POPULATING: u8 = 0;
const STATE_SYNCED: u8 = 1;

/// Synchronization state of one namespace.
///
/// `Populating` covers the window between registration and the first
/// completed populate attempt. `Synced` means at least one attempt finished,
/// successfully or not, so reads no longer block on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncState {
    Populating,
    Synced,
}

pub(crate) struct NamespaceEntry {
    snapshot: ArcSwap<ConfigSnapshot>,
    state: AtomicU8,

    /// Serializes concurrent first reads of the same namespace: two callers
    /// observing an unpopulated entry must not both issue a blocking
    /// populate.
    pub(crate) populate_guard: Mutex<()>,
}

impl NamespaceEntry {
    fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(ConfigSnapshot::default()),
            state: AtomicU8::new(STATE_POPULATING),
            populate_guard: Mutex::new(()),
        }
    }

    pub(crate) fn load(&self) -> Arc<ConfigSnapshot> {
        self.snapshot.load_full()
    }

    /// Publishes a fresh snapshot. Updates replace the whole mapping, never
    /// mutate it, so concurrent readers keep a consistent release.
    pub(crate) fn install(&self, snapshot: Arc<ConfigSnapshot>) {
        self.snapshot.store(snapshot);
    }

    pub(crate) fn state(&self) -> SyncState {
        if self.state.load(Ordering::Acquire) == STATE_SYNCED {
            SyncState::Synced
        } else {
            SyncState::Populating
        }
    }

    pub(crate) fn is_synced(&self) -> bool {
        self.state() == SyncState::Synced
    }

    pub(crate) fn mark_synced(&self) {
        self.state.store(STATE_SYNCED, Ordering::Release);
    }
}

/// In-memory namespace → snapshot mapping; the single source of truth for
/// reads.
#[derive(Default)]
pub struct NamespaceCache {
    inner: DashMap<String, Arc<NamespaceEntry>>,
}

impl NamespaceCache {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Returns the entry for `namespace`, creating it on first access.
    /// The cache entry and the tracker registration happen together, under
    /// the map shard lock, so no reader can observe one without the other.
    pub(crate) fn entry_or_register(
        &self,
        namespace: &str,
        tracker: &NotificationTracker,
    ) -> Arc<NamespaceEntry> {
        self.inner
            .entry(namespace.to_string())
            .or_insert_with(|| {
                tracker.register(namespace);
                info!("add namespace '{}' to local cache", namespace);
                Arc::new(NamespaceEntry::new())
            })
            .clone()
    }

    pub(crate) fn entry(&self, namespace: &str) -> Option<Arc<NamespaceEntry>> {
        self.inner.get(namespace).map(|entry| entry.clone())
    }

    /// Current snapshot for `namespace`, or `None` when it was never
    /// registered.
    pub fn get(&self, namespace: &str) -> Option<Arc<ConfigSnapshot>> {
        self.entry(namespace).map(|entry| entry.load())
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.inner.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
