// -
// Notification protocol

/// Notification id the server has never acknowledged for a namespace.
pub(crate) const NOTIFICATION_ID_NONE: i64 = -1;

// -
// Disk fallback layout

/// Suffix of one persisted namespace record under the cache directory.
pub(crate) const DISK_RECORD_SUFFIX: &str = ".cache";

// -
// Long polling

/// Client-side headroom on top of the server hold window, so a healthy
/// long poll is never cut off by our own request timeout.
pub(crate) const LONG_POLL_SLACK_SECS: u64 = 10;
