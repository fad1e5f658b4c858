//! Environment variable configuration source.

use super::ConfigSource;
use crate::core::RawValue;
use async_trait::async_trait;
use std::env;

/// Environment variable configuration source.
///
/// A dotted key is looked up under several spellings, so that shell-safe names
/// and older naming schemes resolve to the same logical key. For
/// `server.http-port` the candidates are, in order:
///
/// 1. `server.http-port` (the raw key)
/// 2. `server_http_port` (every non-alphanumeric character replaced with `_`)
/// 3. `SERVER_HTTP_PORT` (the same, upper-cased)
/// 4. `SERVER_HTTPPORT` (legacy: `[`, `]` and `-` removed, dots to `_`)
/// 5. `SERVER_HTTP-PORT` (legacy: dots to `_` only)
///
/// Values are always returned as strings. The environment is static, so this
/// source never starts watches.
///
/// # Examples
///
/// ```rust
/// use tiered_config::sources::EnvSource;
///
/// let names = EnvSource::candidate_names("lev1.lev2[5].LEV3");
/// assert_eq!(names[1], "lev1_lev2_5__LEV3");
/// ```
pub struct EnvSource {
    priority: i32,
}

impl EnvSource {
    /// Create a new environment variable source.
    pub fn new() -> Self {
        Self {
            priority: 300, // Env vars have highest priority by default
        }
    }

    /// Set the priority for this source.
    ///
    /// Higher priority sources override lower priority ones.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// All spellings tried for `key`, in lookup order.
    pub fn candidate_names(key: &str) -> [String; 5] {
        [
            key.to_string(),
            normalize_key(key),
            normalize_key(key).to_uppercase(),
            legacy_stripped(key),
            legacy_dotted(key),
        ]
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigSource for EnvSource {
    fn name(&self) -> String {
        "env".to_string()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn get(&self, key: &str) -> Option<RawValue> {
        Self::candidate_names(key)
            .iter()
            .filter(|name| !name.is_empty() && !name.contains(['=', '\0']))
            .find_map(|name| env::var(name).ok())
            .map(RawValue::String)
    }
}

/// Replace every character that is not an ASCII letter or digit with `_`.
fn normalize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn legacy_stripped(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '[' | ']' | '-'))
        .map(|c| if c == '.' { '_' } else { c })
        .collect::<String>()
        .to_uppercase()
}

fn legacy_dotted(key: &str) -> String {
    key.replace('.', "_").to_uppercase()
}
