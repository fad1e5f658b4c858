//! File-based configuration source.

use super::ConfigSource;
use crate::core::RawValue;
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File used when no configuration path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// YAML file configuration source.
///
/// The document is read and parsed once, at construction. Lookups walk the
/// nested mappings one dot-separated segment at a time, so `server.http.port`
/// reads
///
/// ```yaml
/// server:
///   http:
///     port: 8080
/// ```
///
/// Scalars keep their YAML type. The file is not watched for changes.
///
/// # Examples
///
/// ```rust,no_run
/// use tiered_config::sources::FileSource;
///
/// let source = FileSource::load("config/config.yaml").expect("readable config");
/// ```
pub struct FileSource {
    path: PathBuf,
    root: BTreeMap<String, RawValue>,
    priority: i32,
}

impl FileSource {
    /// Read and parse the YAML document at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or its
    /// top level is not a mapping.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!("Config file path: {}", path.display());

        let contents = std::fs::read_to_string(&path)?;
        Self::from_yaml_str(&contents).map(|mut source| {
            source.path = path;
            source
        })
    }

    /// Parse a YAML document held in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML or its top level is not a
    /// mapping. An empty document yields an empty source.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(contents)?;

        let root = match RawValue::from_yaml(document) {
            Some(RawValue::Map(map)) => map,
            None => BTreeMap::new(),
            Some(other) => {
                return Err(ConfigError::ParseError(format!(
                    "expected a mapping at the document root, found {}",
                    other
                )));
            }
        };

        Ok(Self {
            path: PathBuf::new(),
            root,
            priority: 100,
        })
    }

    /// Set the priority for this source.
    ///
    /// Higher priority sources override lower priority ones.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Path the document was read from (empty for in-memory documents).
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lookup(&self, key: &str) -> Option<&RawValue> {
        let mut segments = key.split('.');
        let last = segments.next_back()?;

        let mut node = &self.root;
        for segment in segments {
            match node.get(segment)? {
                RawValue::Map(child) => node = child,
                _ => return None,
            }
        }
        node.get(last)
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn get(&self, key: &str) -> Option<RawValue> {
        self.lookup(key).cloned()
    }
}
