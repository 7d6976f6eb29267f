mod disk_store;
pub use disk_store::*;


use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;

use crate::ConfigSnapshot;
use crate::StorageError;

/// Local persistence seam for last-known-good snapshots.
///
/// The store is a pure cache of the in-memory state: it only ever holds
/// snapshots that were successfully fetched at least once, and every failure
/// is recoverable (callers log and move on).
#[cfg_attr(test, automock)]
pub trait FallbackStore: Send + Sync + 'static {
    /// Persists `snapshot` as the last good state of `namespace`.
    /// A write whose content matches the previously written record is a
    /// no-op.
    fn write(&self, namespace: &str, snapshot: &ConfigSnapshot) -> Result<(), StorageError>;

    /// Last persisted snapshot for `namespace`, or `None` when no record
    /// exists.
    fn read(&self, namespace: &str) -> Result<Option<ConfigSnapshot>, StorageError>;

    /// Every persisted snapshot, keyed by namespace. Used to seed the live
    /// cache while the remote service is unreachable.
    fn load_all(&self) -> Result<HashMap<String, ConfigSnapshot>, StorageError>;
}
