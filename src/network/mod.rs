mod http_source;
pub use http_source::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::ConfigSnapshot;
use crate::NetworkError;
use crate::NotificationId;

/// A namespace the server reports as changed, carrying the id to
/// acknowledge on the next poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChange {
    pub namespace: String,
    pub notification_id: NotificationId,
}

/// Outcome of one notification long poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LongPollOutcome {
    /// The server held the request for the full window without a change
    NoChange,
    /// One or more namespaces have a newer release
    Changed(Vec<NotificationChange>),
}

/// Remote configuration service seam.
///
/// The engine depends on exactly three remote operations; everything about
/// the wire (verbs, URLs, encodings) stays behind this trait.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteConfigSource: Send + Sync + 'static {
    /// Cached namespace fetch. Plain key/value payload without a release
    /// key; used for foreground fetch-on-miss.
    async fn fetch_cached(&self, namespace: &str) -> Result<ConfigSnapshot, NetworkError>;

    /// Authoritative namespace fetch, used after a change notification.
    async fn fetch_uncached(&self, namespace: &str) -> Result<ConfigSnapshot, NetworkError>;

    /// Blocks until the server reports a change for one of `notifications`
    /// or its hold window elapses.
    async fn long_poll(
        &self,
        notifications: &[(String, NotificationId)],
    ) -> Result<LongPollOutcome, NetworkError>;
}
