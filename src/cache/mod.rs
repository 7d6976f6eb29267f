mod namespace_cache;
mod notification;
mod snapshot;

pub use namespace_cache::NamespaceCache;
pub(crate) use namespace_cache::NamespaceEntry;
pub use notification::NotificationId;
pub use notification::NotificationTracker;
pub use snapshot::ConfigSnapshot;
