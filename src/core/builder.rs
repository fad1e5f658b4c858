//! Builder for constructing ConfigClient instances.

use crate::core::{ConfigClient, Options, Registry};
use crate::error::{ConfigError, Result};
use crate::logging;
use crate::sources::{Backend, ConfigSource, DEFAULT_CONFIG_PATH, EnvSource, FileSource, kv};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, debug, error, info};

/// Builder for a [`ConfigClient`].
///
/// Sources are activated in a fixed order: the environment, the YAML file, then
/// the distributed store selected by [`with_extension`](Self::with_extension).
/// The distributed store reads its own address, namespace and retry settings
/// from the environment and the file, so it is always set up last.
///
/// # Examples
///
/// ```rust,no_run
/// use tiered_config::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let client = ConfigClient::builder()
///     .with_config_path("config/config.yaml")
///     .with_extension("etcd")
///     .with_extension_namespace("environments/prod/services/api/2.0.0/config")
///     .with_log_level(tracing::Level::INFO)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    options: Options,
    custom_sources: Vec<Arc<dyn ConfigSource>>,
}

impl ClientBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the YAML file at `path` instead of `config.yaml`.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    /// Select the distributed store: `"consul"`, `"etcd"` or `""` for none.
    ///
    /// Unknown names are logged at build time and no store is used.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.options.extension = extension.into();
        self
    }

    /// Override the key-value namespace of the distributed store.
    pub fn with_extension_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.options.extension_namespace = Some(namespace.into());
        self
    }

    /// Print this crate's diagnostics at `level` and above.
    pub fn with_log_level(mut self, level: Level) -> Self {
        self.options.log_level = Some(level);
        self
    }

    /// Add a custom configuration source.
    ///
    /// It is ranked among the built-in sources by its priority; on a tie the
    /// built-in source wins.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use tiered_config::prelude::*;
    /// use tiered_config::sources::FileSource;
    ///
    /// # async fn example() -> Result<()> {
    /// let overrides = FileSource::load("config/overrides.yaml")?.with_priority(200);
    ///
    /// let client = ConfigClient::builder()
    ///     .with_source(overrides)
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
        self.custom_sources.push(Arc::new(source));
        self
    }

    /// Activate the sources and build the client.
    ///
    /// A file or distributed store that fails to initialize is logged and left
    /// out.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoSources`] if no source ended up active.
    pub async fn build(self) -> Result<ConfigClient> {
        let Self {
            options,
            custom_sources,
        } = self;

        if let Some(level) = options.log_level {
            logging::init(level);
        }

        debug!("Initializing configuration sources");
        let mut registry = Registry::new();

        registry.push(Arc::new(EnvSource::new()));
        debug!("Initialized environment config source");

        let path = options
            .config_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        match FileSource::load(path.clone()) {
            Ok(source) => {
                info!("Loaded configuration file {}", path.display());
                registry.push(Arc::new(source));
            }
            Err(e) => error!(
                "File configuration source failed to load! {}: {}",
                path.display(),
                e
            ),
        }

        match Backend::from_extension(&options.extension) {
            Ok(Some(backend)) => {
                let namespace = options.extension_namespace.as_deref();
                if let Some(source) = kv::connect(backend, &registry, namespace).await {
                    registry.push(Arc::new(source));
                }
            }
            Ok(None) => {}
            Err(e) => error!(
                "{}, extension configuration source will not be available",
                e
            ),
        }

        for source in custom_sources {
            debug!("Adding custom config source {}", source.name());
            registry.push(source);
        }

        if registry.is_empty() {
            return Err(ConfigError::NoSources);
        }

        info!(
            "Configuration sources in resolution order: {}",
            registry.source_names().join(", ")
        );
        Ok(ConfigClient::from_registry(registry))
    }
}

impl From<Options> for ClientBuilder {
    fn from(options: Options) -> Self {
        Self {
            options,
            custom_sources: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    // building reads bootstrap keys from the environment, which env tests mutate
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_file_is_skipped() {
        let client = ClientBuilder::new()
            .with_config_path("/nonexistent/tiered-config/config.yaml")
            .build()
            .await
            .unwrap();

        assert_eq!(client.source_names(), vec!["env"]);
    }

    #[tokio::test]
    #[serial]
    async fn test_file_source_is_loaded() {
        let file = yaml_file("server:\n  port: 8080\n");
        let client = ClientBuilder::new()
            .with_config_path(file.path())
            .build()
            .await
            .unwrap();

        assert_eq!(client.source_names().len(), 2);
        assert_eq!(client.get_int("server.port").await, Some(8080));
    }

    #[tokio::test]
    #[serial]
    async fn test_unknown_extension_is_skipped() {
        let file = yaml_file("a: 1\n");
        let client = ClientBuilder::new()
            .with_config_path(file.path())
            .with_extension("zookeeper")
            .build()
            .await
            .unwrap();

        assert_eq!(client.source_names().len(), 2);
    }

    #[tokio::test]
    #[serial]
    async fn test_from_options() {
        let file = yaml_file("a: 1\n");
        let options = Options {
            config_path: Some(file.path().to_path_buf()),
            ..Options::default()
        };

        let client = ConfigClient::new(options).await.unwrap();
        assert_eq!(client.get_int("a").await, Some(1));
    }
}
