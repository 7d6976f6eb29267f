use dashmap::DashMap;
use tracing::info;

use crate::constants::NOTIFICATION_ID_NONE;

/// Server-assigned version counter per namespace. `-1` means the namespace
/// has never been synchronized.
pub type NotificationId = i64;

/// Last-seen notification id per namespace.
///
/// The full snapshot of this map is the payload of every long-poll request;
/// whatever id the server reports back is stored as-is (the client does not
/// enforce monotonicity).
#[derive(Debug, Default)]
pub struct NotificationTracker {
    inner: DashMap<String, NotificationId>,
}

impl NotificationTracker {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Returns the last seen id for `namespace`, registering it with the
    /// never-synchronized sentinel on first access.
    pub fn get_or_register(&self, namespace: &str) -> NotificationId {
        *self
            .inner
            .entry(namespace.to_string())
            .or_insert_with(|| {
                info!("add namespace '{}' to local notification map", namespace);
                NOTIFICATION_ID_NONE
            })
            .value()
    }

    pub(crate) fn register(&self, namespace: &str) {
        self.get_or_register(namespace);
    }

    pub fn get(&self, namespace: &str) -> Option<NotificationId> {
        self.inner.get(namespace).map(|entry| *entry.value())
    }

    pub fn set(&self, namespace: &str, id: NotificationId) {
        self.inner.insert(namespace.to_string(), id);
    }

    /// Builds the long-poll request payload: every tracked namespace with
    /// its last known id.
    pub fn snapshot(&self) -> Vec<(String, NotificationId)> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
