//! Consul KV client over the HTTP API.

use super::{KvClient, KvSnapshot};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const INDEX_HEADER: &str = "X-Consul-Index";
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Consul key-value client.
///
/// Reads use `GET /v1/kv/<path>`; watches use Consul blocking queries
/// (`?index=<n>&wait=<seconds>s`), resuming from the `X-Consul-Index` of the
/// previous response.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tiered_config::sources::kv::{ConsulClient, KvSource};
///
/// # fn example() -> tiered_config::error::Result<()> {
/// let client = ConsulClient::new("http://localhost:8500")?;
/// let source = KvSource::new(Arc::new(client), "environments/dev/services/api/1.0.0/config");
/// # Ok(())
/// # }
/// ```
pub struct ConsulClient {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct KvPair {
    #[serde(rename = "Value")]
    value: Option<String>,
}

impl ConsulClient {
    /// Create a client for the agent at `address`.
    ///
    /// An address without a scheme is treated as plain HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a valid HTTP(S) URL or the HTTP
    /// client cannot be constructed.
    pub fn new(address: &str) -> Result<Self> {
        Ok(Self {
            http: Client::builder().connect_timeout(READ_TIMEOUT).build()?,
            base_url: super::http_base_url(address)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/kv/{}", self.base_url, path)
    }

    async fn fetch(&self, path: &str, blocking: Option<(u64, Duration)>) -> Result<KvSnapshot> {
        let request = match blocking {
            Some((index, wait)) => self
                .http
                .get(self.url(path))
                .query(&[
                    ("index", index.to_string()),
                    ("wait", format!("{}s", wait.as_secs().max(1))),
                ])
                // Consul adds up to wait/16 of jitter to blocking queries
                .timeout(wait + wait / 16 + READ_TIMEOUT),
            None => self.http.get(self.url(path)).timeout(READ_TIMEOUT),
        };

        let response = request.send().await?;
        let index = response
            .headers()
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        match response.status() {
            StatusCode::NOT_FOUND => Ok(KvSnapshot { value: None, index }),
            status if status.is_success() => {
                let pairs: Vec<KvPair> = response.json().await?;
                let value = match pairs.into_iter().next() {
                    Some(pair) => Some(decode(pair.value.as_deref())?),
                    None => None,
                };
                Ok(KvSnapshot { value, index })
            }
            status => Err(ConfigError::ClientError(format!(
                "Consul responded with status {} for {}",
                status, path
            ))),
        }
    }
}

/// Consul returns values base64-encoded; a key without a value reads as "".
fn decode(value: Option<&str>) -> Result<String> {
    let Some(encoded) = value else {
        return Ok(String::new());
    };
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ConfigError::ClientError(format!("Invalid base64 value from Consul: {}", e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[async_trait]
impl KvClient for ConsulClient {
    fn backend(&self) -> &'static str {
        "consul"
    }

    async fn get(&self, path: &str) -> Result<Option<String>> {
        self.fetch(path, None).await.map(|snapshot| snapshot.value)
    }

    async fn wait(&self, path: &str, index: u64, timeout: Duration) -> Result<KvSnapshot> {
        self.fetch(path, Some((index, timeout))).await
    }
}
