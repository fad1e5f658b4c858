//! Ordered source registry and key resolution.

use crate::core::RawValue;
use crate::notify::WatchCallback;
use crate::sources::ConfigSource;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Resolves keys against a set of sources in priority order.
///
/// Sources are kept sorted from highest to lowest priority. A lookup returns
/// the value from the first source that has the key; values are never merged
/// across sources. Sources with equal priority keep the order they were added in.
#[derive(Default)]
pub struct Registry {
    sources: Vec<Arc<dyn ConfigSource>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source and restore priority order.
    pub fn push(&mut self, source: Arc<dyn ConfigSource>) {
        self.sources.push(source);

        // Stable insertion sort, descending. Strict comparison keeps ties in
        // insertion order.
        for i in 1..self.sources.len() {
            let mut j = i;
            while j > 0 && self.sources[j].priority() > self.sources[j - 1].priority() {
                self.sources.swap(j, j - 1);
                j -= 1;
            }
        }
    }

    /// Number of active sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is active.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Source names in resolution order.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Raw value of `key` from the highest-priority source that has it.
    pub async fn get(&self, key: &str) -> Option<RawValue> {
        for source in &self.sources {
            if let Some(value) = source.get(key).await {
                return Some(value);
            }
        }
        None
    }

    /// `key` as a bool, see [`RawValue::as_bool`].
    pub async fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).await?.as_bool()
    }

    /// `key` as an integer, see [`RawValue::as_int`].
    pub async fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).await?.as_int()
    }

    /// `key` as a float, see [`RawValue::as_float`].
    pub async fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).await?.as_float()
    }

    /// `key` as a string, see [`RawValue::as_string`].
    pub async fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).await?.as_string()
    }

    /// Start a watch on `key` in every source that supports it.
    ///
    /// Each watch runs until `cancel` (or one of its parents) is cancelled.
    pub fn subscribe(
        &self,
        key: &str,
        callback: WatchCallback,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        self.sources
            .iter()
            .filter_map(|source| source.subscribe(key, Arc::clone(&callback), cancel.clone()))
            .collect()
    }
}
