//! Key change notification.
//!
//! Watches are long-poll loops against a distributed store, one task per
//! (source, key). Each loop delivers changes to a [`WatchCallback`] in order; a
//! [`Subscription`] groups the tasks started for one key and can stop them.

pub mod subscription;
pub mod watch;

use std::sync::Arc;

pub use subscription::Subscription;
pub use watch::Backoff;

/// Callback invoked with `(key, new_value)` when a watched key changes.
///
/// A removed key is reported with an empty value.
pub type WatchCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// A single observed change, as delivered by [`ConfigClient::watch`](crate::core::ConfigClient::watch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    /// The dotted configuration key.
    pub key: String,
    /// The new raw value, empty if the key was removed.
    pub value: String,
}

impl ConfigChange {
    /// Create a change event.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
