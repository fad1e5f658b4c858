//! Service identity and watch settings read at startup.

use crate::core::Registry;
use std::time::Duration;
use tracing::warn;

/// Well-known configuration keys read while the client bootstraps.
pub mod keys {
    /// Deployment environment name.
    pub const ENV_NAME: &str = "kumuluzee.env.name";
    /// Service name.
    pub const NAME: &str = "kumuluzee.name";
    /// Service version.
    pub const VERSION: &str = "kumuluzee.version";
    /// First watch retry delay, in milliseconds.
    pub const START_RETRY_DELAY: &str = "kumuluzee.config.start-retry-delay-ms";
    /// Upper bound for the watch retry delay, in milliseconds.
    pub const MAX_RETRY_DELAY: &str = "kumuluzee.config.max-retry-delay-ms";
    /// Consul agent address.
    pub const CONSUL_HOSTS: &str = "kumuluzee.config.consul.hosts";
    /// etcd member address.
    pub const ETCD_HOSTS: &str = "kumuluzee.config.etcd.hosts";
    /// Explicit key-value namespace.
    pub const NAMESPACE: &str = "kumuluzee.config.namespace";
}

const DEFAULT_ENV_NAME: &str = "dev";
const DEFAULT_VERSION: &str = "1.0.0";
const DEFAULT_START_RETRY_DELAY_MS: u64 = 500;
const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 900_000;

/// Identity of the running service plus its watch retry schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Environment name, `dev` unless configured.
    pub env_name: String,
    /// Service name, empty unless configured.
    pub name: String,
    /// Service version, `1.0.0` unless configured.
    pub version: String,
    /// First retry delay for failed watches.
    pub start_retry_delay: Duration,
    /// Retry delay cap.
    pub max_retry_delay: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            env_name: DEFAULT_ENV_NAME.to_string(),
            name: String::new(),
            version: DEFAULT_VERSION.to_string(),
            start_retry_delay: Duration::from_millis(DEFAULT_START_RETRY_DELAY_MS),
            max_retry_delay: Duration::from_millis(DEFAULT_MAX_RETRY_DELAY_MS),
        }
    }
}

impl ServiceSettings {
    /// Read the settings from `registry`, falling back to defaults per key.
    pub async fn resolve(registry: &Registry) -> Self {
        let defaults = Self::default();
        Self {
            env_name: registry
                .get_string(keys::ENV_NAME)
                .await
                .unwrap_or(defaults.env_name),
            name: registry.get_string(keys::NAME).await.unwrap_or(defaults.name),
            version: registry
                .get_string(keys::VERSION)
                .await
                .unwrap_or(defaults.version),
            start_retry_delay: delay(
                registry,
                keys::START_RETRY_DELAY,
                defaults.start_retry_delay,
            )
            .await,
            max_retry_delay: delay(registry, keys::MAX_RETRY_DELAY, defaults.max_retry_delay)
                .await,
        }
    }

    /// Default key-value namespace derived from the service identity.
    pub fn default_namespace(&self) -> String {
        format!(
            "environments/{}/services/{}/{}/config",
            self.env_name, self.name, self.version
        )
    }

    /// Effective namespace: a non-empty programmatic value wins over a
    /// non-empty configured one, which wins over the derived default.
    pub fn namespace(&self, configured: Option<&str>, programmatic: Option<&str>) -> String {
        programmatic
            .filter(|ns| !ns.is_empty())
            .or(configured.filter(|ns| !ns.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| self.default_namespace())
    }
}

async fn delay(registry: &Registry, key: &str, default: Duration) -> Duration {
    match registry.get_int(key).await {
        Some(ms) => match u64::try_from(ms) {
            Ok(0) => {
                warn!("{}=0 would retry without pause, using 1 ms", key);
                Duration::from_millis(1)
            }
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    "Ignoring negative {}={}, using {} ms",
                    key,
                    ms,
                    default.as_millis()
                );
                default
            }
        },
        None => default,
    }
}
