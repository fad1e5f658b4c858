//! Configuration source trait.

use crate::core::RawValue;
use crate::notify::WatchCallback;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Trait for configuration sources.
///
/// Implement this trait to plug additional backends into a
/// [`ConfigClient`](crate::core::ConfigClient). A source answers single-key
/// lookups and may optionally keep a key under watch.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Get a human-readable name for this source (for logging/debugging).
    fn name(&self) -> String;

    /// Get the priority of this source (higher = takes precedence).
    ///
    /// Built-in priorities:
    /// - Environment variables: 300
    /// - Distributed key-value store: 150
    /// - Configuration file: 100
    fn priority(&self) -> i32 {
        100
    }

    /// Look up the raw value stored under a dotted key.
    ///
    /// Failures to reach a backing store are logged by the source and reported
    /// as `None`, so resolution can fall through to lower-priority sources.
    async fn get(&self, key: &str) -> Option<RawValue>;

    /// Start watching `key`, invoking `callback` whenever its value changes.
    ///
    /// Returns the handle of the spawned watch task, or `None` when the source
    /// is static. The task must stop once `cancel` is cancelled.
    fn subscribe(
        &self,
        key: &str,
        callback: WatchCallback,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let _ = (key, callback, cancel);
        None
    }
}
