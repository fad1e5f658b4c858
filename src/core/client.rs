//! The configuration client handle.

use crate::core::{ClientBuilder, RawValue, Registry};
use crate::error::Result;
use crate::notify::{ConfigChange, Subscription, WatchCallback};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug};

/// Client construction options.
///
/// All fields are optional; the default reads `config.yaml` from the working
/// directory, uses no distributed store and installs no log output.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Path to the YAML configuration file. `None` means `config.yaml`.
    pub config_path: Option<PathBuf>,
    /// Distributed store to use: `""` (none), `"consul"` or `"etcd"`.
    pub extension: String,
    /// Key-value namespace override for the distributed store.
    pub extension_namespace: Option<String>,
    /// When set, print this crate's diagnostics at this level and above.
    pub log_level: Option<Level>,
}

/// Handle to a resolved set of configuration sources.
///
/// Lookups go through the sources in priority order (environment, then the
/// distributed store, then the file) and return the first value found. The
/// handle is cheap to clone; clones share sources and watches.
///
/// # Examples
///
/// ```rust,no_run
/// use tiered_config::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let client = ConfigClient::builder()
///     .with_config_path("config/config.yaml")
///     .with_extension("consul")
///     .build()
///     .await?;
///
/// let port = client.get_int("server.port").await.unwrap_or(8080);
///
/// let subscription = client.subscribe("server.maintenance", |key, value| {
///     println!("{key} is now {value}");
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConfigClient {
    registry: Arc<Registry>,
    shutdown: CancellationToken,
}

impl ConfigClient {
    /// Start configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Build a client from `options`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoSources`](crate::error::ConfigError::NoSources)
    /// if no source could be activated. Individual sources that fail to
    /// initialize are logged and skipped.
    pub async fn new(options: Options) -> Result<Self> {
        ClientBuilder::from(options).build().await
    }

    pub(crate) fn from_registry(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
            shutdown: CancellationToken::new(),
        }
    }

    /// The underlying source registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Source names in resolution order.
    pub fn source_names(&self) -> Vec<String> {
        self.registry.source_names()
    }

    /// Raw value of `key` from the first source that has it.
    pub async fn get(&self, key: &str) -> Option<RawValue> {
        self.registry.get(key).await
    }

    /// `key` as a bool.
    pub async fn get_bool(&self, key: &str) -> Option<bool> {
        self.registry.get_bool(key).await
    }

    /// `key` as an integer. Floats are truncated toward zero.
    pub async fn get_int(&self, key: &str) -> Option<i64> {
        self.registry.get_int(key).await
    }

    /// `key` as a float.
    pub async fn get_float(&self, key: &str) -> Option<f64> {
        self.registry.get_float(key).await
    }

    /// `key` as a string. Only values that are strings at the source qualify.
    pub async fn get_string(&self, key: &str) -> Option<String> {
        self.registry.get_string(key).await
    }

    /// Call `callback` with `(key, value)` whenever `key` changes in a source
    /// that supports watching.
    ///
    /// Must be called from within a Tokio runtime. The watch runs until the
    /// returned [`Subscription`] is cancelled or the client is shut down.
    pub fn subscribe<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.subscribe_with(key, Arc::new(callback), self.shutdown.child_token())
    }

    /// Like [`subscribe`](Self::subscribe), but delivers changes as a stream.
    ///
    /// Changes for the key arrive in the order they were observed. Dropping
    /// the receiver cancels the watch at its next change.
    pub fn watch(&self, key: &str) -> (Subscription, mpsc::UnboundedReceiver<ConfigChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = self.shutdown.child_token();
        let on_closed = token.clone();
        let subscription = self.subscribe_with(
            key,
            Arc::new(move |key: &str, value: &str| {
                if tx.send(ConfigChange::new(key, value)).is_err() && !on_closed.is_cancelled() {
                    debug!("Change receiver for {} dropped, cancelling watch", key);
                    on_closed.cancel();
                }
            }),
            token,
        );
        (subscription, rx)
    }

    fn subscribe_with(
        &self,
        key: &str,
        callback: WatchCallback,
        token: CancellationToken,
    ) -> Subscription {
        let tasks = self.registry.subscribe(key, callback, &token);
        if tasks.is_empty() {
            debug!("No active source can watch {}", key);
        }
        Subscription::new(key, token, tasks)
    }

    /// Stop every watch started through this client or its clones.
    pub fn shutdown(&self) {
        debug!("Shutting down configuration watches");
        self.shutdown.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::WatchCallback;
    use crate::sources::ConfigSource;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::task::JoinHandle;

    /// Emits one change per subscription, then waits for cancellation.
    struct TickingSource;

    #[async_trait]
    impl ConfigSource for TickingSource {
        fn name(&self) -> String {
            "ticking".into()
        }

        async fn get(&self, key: &str) -> Option<RawValue> {
            (key == "app.mode").then(|| RawValue::from("live"))
        }

        fn subscribe(
            &self,
            key: &str,
            callback: WatchCallback,
            cancel: CancellationToken,
        ) -> Option<JoinHandle<()>> {
            let key = key.to_string();
            Some(tokio::spawn(async move {
                callback(&key, "changed");
                cancel.cancelled().await;
            }))
        }
    }

    /// Fires every few milliseconds until cancelled.
    struct RepeatingSource;

    #[async_trait]
    impl ConfigSource for RepeatingSource {
        fn name(&self) -> String {
            "repeating".into()
        }

        async fn get(&self, _key: &str) -> Option<RawValue> {
            None
        }

        fn subscribe(
            &self,
            key: &str,
            callback: WatchCallback,
            cancel: CancellationToken,
        ) -> Option<JoinHandle<()>> {
            let key = key.to_string();
            Some(tokio::spawn(async move {
                let mut tick = 0u64;
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(Duration::from_millis(5)) => {
                            tick += 1;
                            callback(&key, &tick.to_string());
                        }
                    }
                }
            }))
        }
    }

    fn client() -> ConfigClient {
        let mut registry = Registry::new();
        registry.push(Arc::new(TickingSource));
        ConfigClient::from_registry(registry)
    }

    #[tokio::test]
    async fn test_getters_delegate() {
        let client = client();
        assert_eq!(client.get_string("app.mode").await, Some("live".into()));
        assert_eq!(client.get_int("app.mode").await, None);
        assert_eq!(client.source_names(), vec!["ticking"]);
    }

    #[tokio::test]
    async fn test_watch_stream() {
        let client = client();
        let (subscription, mut changes) = client.watch("app.mode");
        assert_eq!(subscription.watch_count(), 1);

        let change = tokio::time::timeout(Duration::from_secs(1), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change, ConfigChange::new("app.mode", "changed"));

        subscription.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels_watch() {
        let mut registry = Registry::new();
        registry.push(Arc::new(RepeatingSource));
        let client = ConfigClient::from_registry(registry);

        let (subscription, changes) = client.watch("k");
        drop(changes);

        tokio::time::timeout(Duration::from_secs(1), async {
            while !subscription.is_cancelled() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("watch should stop once nobody reads its changes");
        assert!(!client.is_shut_down());
        subscription.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_cancels_all_subscriptions() {
        let client = client();
        let first = client.subscribe("a", |_, _| {});
        let second = client.clone().subscribe("b", |_, _| {});

        client.shutdown();
        assert!(client.is_shut_down());
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());

        tokio::time::timeout(Duration::from_secs(1), async {
            first.shutdown().await;
            second.shutdown().await;
        })
        .await
        .expect("watch tasks should exit after shutdown");
    }
}
