//! Distributed key-value store sources (Consul, etcd).
//!
//! Both backends share [`KvSource`], which owns key translation, namespacing
//! and the watch loop; they differ only in the [`KvClient`] that performs the
//! actual HTTP calls.

#[cfg(feature = "consul")]
mod consul;
#[cfg(feature = "etcd")]
mod etcd;

#[cfg(feature = "consul")]
pub use consul::ConsulClient;
#[cfg(feature = "etcd")]
pub use etcd::EtcdClient;

use super::ConfigSource;
use crate::core::settings::{ServiceSettings, keys};
use crate::core::{RawValue, Registry};
use crate::error::{ConfigError, Result};
use crate::notify::WatchCallback;
use crate::notify::watch::{Backoff, WatchState, watch_key};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Longest a single long-poll request may block.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(10 * 60);

/// Value of a key at a point in the store's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvSnapshot {
    /// The value, or `None` if the key does not exist.
    pub value: Option<String>,
    /// Store change index to resume long-polling from.
    pub index: u64,
}

/// Wire client for a hierarchical key-value store.
#[async_trait]
pub trait KvClient: Send + Sync {
    /// Short backend name, used as the source name.
    fn backend(&self) -> &'static str;

    /// Read the value at `path`.
    async fn get(&self, path: &str) -> Result<Option<String>>;

    /// Block until `path` changes after change index `index`, or `timeout`
    /// elapses, and return its state at that point.
    ///
    /// An index of 0 returns the current state immediately.
    async fn wait(&self, path: &str, index: u64, timeout: Duration) -> Result<KvSnapshot>;
}

/// Supported distributed backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// HashiCorp Consul KV.
    Consul,
    /// etcd (v2 keys API).
    Etcd,
}

impl Backend {
    /// Parse an extension discriminant; the empty string selects no backend.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidExtension`] for unknown names.
    pub fn from_extension(extension: &str) -> Result<Option<Self>> {
        if extension.is_empty() {
            return Ok(None);
        }
        extension.parse().map(Some)
    }

    /// Configuration key holding the store address.
    pub fn address_key(self) -> &'static str {
        match self {
            Backend::Consul => keys::CONSUL_HOSTS,
            Backend::Etcd => keys::ETCD_HOSTS,
        }
    }

    /// Address used when none is configured.
    pub fn default_address(self) -> &'static str {
        match self {
            Backend::Consul => "http://localhost:8500",
            Backend::Etcd => "http://localhost:2379",
        }
    }

    /// Build the wire client for this backend.
    ///
    /// # Errors
    ///
    /// Fails if the address is invalid, the HTTP client cannot be built, or
    /// support for the backend was not compiled in.
    #[allow(unused_variables)]
    pub fn client(self, address: &str) -> Result<Arc<dyn KvClient>> {
        match self {
            #[cfg(feature = "consul")]
            Backend::Consul => Ok(Arc::new(ConsulClient::new(address)?)),
            #[cfg(feature = "etcd")]
            Backend::Etcd => Ok(Arc::new(EtcdClient::new(address)?)),
            #[allow(unreachable_patterns)]
            other => Err(ConfigError::Other(format!(
                "{} support is not enabled, rebuild with the `{}` feature",
                other, other
            ))),
        }
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "consul" => Ok(Backend::Consul),
            "etcd" => Ok(Backend::Etcd),
            other => Err(ConfigError::InvalidExtension(other.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Consul => "consul",
            Backend::Etcd => "etcd",
        })
    }
}

/// Configuration source backed by a distributed key-value store.
///
/// Keys are looked up under a namespace, with dots translated to path
/// separators: `server.port` in namespace `environments/dev/services/api/1.0.0/config`
/// reads `environments/dev/services/api/1.0.0/config/server/port`. Values are
/// always strings.
///
/// Read failures are logged and reported as absent. Watches keep a
/// long-poll open per key and retry failed polls with exponential backoff.
pub struct KvSource {
    client: Arc<dyn KvClient>,
    namespace: String,
    start_retry_delay: Duration,
    max_retry_delay: Duration,
    wait_time: Duration,
}

impl KvSource {
    /// Create a source reading keys under `namespace`.
    pub fn new(client: Arc<dyn KvClient>, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            start_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_millis(900_000),
            wait_time: DEFAULT_WAIT_TIME,
        }
    }

    /// Set the watch retry schedule.
    pub fn with_retry_delays(mut self, start: Duration, max: Duration) -> Self {
        self.start_retry_delay = start;
        self.max_retry_delay = max;
        self
    }

    /// Set how long a single long-poll may block.
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    /// The key namespace (path prefix).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Store path for a dotted key.
    pub fn path_for(&self, key: &str) -> String {
        self.namespace
            .split('/')
            .chain(key.split('.'))
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[async_trait]
impl ConfigSource for KvSource {
    fn name(&self) -> String {
        self.client.backend().to_string()
    }

    fn priority(&self) -> i32 {
        150
    }

    async fn get(&self, key: &str) -> Option<RawValue> {
        match self.client.get(&self.path_for(key)).await {
            Ok(value) => value.map(RawValue::String),
            Err(e) => {
                warn!("Error getting value for {} from {}: {}", key, self.name(), e);
                None
            }
        }
    }

    fn subscribe(
        &self,
        key: &str,
        callback: WatchCallback,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("Cannot watch {}: no Tokio runtime is running", key);
            return None;
        };

        info!(
            "Creating a watch: key={} namespace={} source={}",
            key,
            self.namespace,
            self.name()
        );

        let state = WatchState::new(
            key,
            self.path_for(key),
            Backoff::new(self.start_retry_delay, self.max_retry_delay),
        );
        Some(runtime.spawn(watch_key(
            Arc::clone(&self.client),
            state,
            self.wait_time,
            callback,
            cancel,
        )))
    }
}

/// Normalize a store address into a base URL without a trailing slash.
#[cfg(any(feature = "consul", feature = "etcd"))]
fn http_base_url(address: &str) -> Result<String> {
    let address = address.trim();
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    let url = reqwest::Url::parse(&candidate)
        .map_err(|e| ConfigError::ClientError(format!("Invalid address {:?}: {}", address, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::ClientError(format!(
            "Unsupported scheme {:?} in address {:?}",
            url.scheme(),
            address
        )));
    }

    Ok(candidate.trim_end_matches('/').to_string())
}

/// Activate a distributed source, reading its own settings from `registry`.
///
/// Returns `None` (after logging) when the client cannot be created.
pub(crate) async fn connect(
    backend: Backend,
    registry: &Registry,
    namespace_override: Option<&str>,
) -> Option<KvSource> {
    debug!("Initializing {} config source", backend);

    let address = registry
        .get_string(backend.address_key())
        .await
        .unwrap_or_else(|| backend.default_address().to_string());

    let client = match backend.client(&address) {
        Ok(client) => {
            info!("{} client address set to {}", backend, address);
            client
        }
        Err(e) => {
            error!("Failed to create {} client: {}", backend, e);
            return None;
        }
    };

    let settings = ServiceSettings::resolve(registry).await;
    debug!(
        "start-retry-delay-ms={}, max-retry-delay-ms={}",
        settings.start_retry_delay.as_millis(),
        settings.max_retry_delay.as_millis()
    );

    let configured = registry.get_string(keys::NAMESPACE).await;
    let namespace = settings.namespace(configured.as_deref(), namespace_override);
    info!("{} key-value namespace: {}", backend, namespace);

    let source = KvSource::new(client, namespace)
        .with_retry_delays(settings.start_retry_delay, settings.max_retry_delay);
    debug!("Initialized {} config source", backend);
    Some(source)
}
