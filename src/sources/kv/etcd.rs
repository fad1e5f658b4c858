//! etcd client over the v2 keys HTTP API.

use super::{KvClient, KvSnapshot};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const INDEX_HEADER: &str = "X-Etcd-Index";
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// etcd key-value client.
///
/// Reads use `GET /v2/keys/<path>`. Watches use `?wait=true&waitIndex=<n+1>`
/// to block until the key changes after index `n`; a watch that reaches its
/// timeout without an event falls back to a plain read.
pub struct EtcdClient {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct KeysResponse {
    action: String,
    node: Option<Node>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Node {
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    modified_index: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error_code: u32,
    #[serde(default)]
    message: String,
    #[serde(default)]
    index: u64,
}

/// etcd error code for a missing key.
const KEY_NOT_FOUND: u32 = 100;

impl EtcdClient {
    /// Create a client for the member at `address`.
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
        format!("{}/v2/keys/{}", self.base_url, path)
    }

    async fn read(&self, path: &str) -> Result<KvSnapshot> {
        let response = self
            .http
            .get(self.url(path))
            .timeout(READ_TIMEOUT)
            .send()
            .await?;
        parse(response, path).await
    }
}

fn header_index(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(INDEX_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

async fn parse(response: Response, path: &str) -> Result<KvSnapshot> {
    let status = response.status();
    let header = header_index(&response);

    if status.is_success() {
        let body: KeysResponse = response.json().await?;
        let Some(node) = body.node else {
            return Err(ConfigError::ClientError(format!(
                "etcd response for {} has no node",
                path
            )));
        };

        let value = match body.action.as_str() {
            "delete" | "expire" | "compareAndDelete" => None,
            _ if node.dir => Some(String::new()),
            _ => Some(node.value.unwrap_or_default()),
        };
        return Ok(KvSnapshot {
            value,
            index: header.unwrap_or(node.modified_index).max(node.modified_index),
        });
    }

    let error: Option<ErrorResponse> = response.json().await.ok();
    match (status, error) {
        (StatusCode::NOT_FOUND, Some(e)) if e.error_code == KEY_NOT_FOUND => Ok(KvSnapshot {
            value: None,
            index: header.unwrap_or(e.index),
        }),
        (_, Some(e)) => Err(ConfigError::ClientError(format!(
            "etcd error {} for {}: {}",
            e.error_code, path, e.message
        ))),
        (status, None) => Err(ConfigError::ClientError(format!(
            "etcd responded with status {} for {}",
            status, path
        ))),
    }
}

#[async_trait]
impl KvClient for EtcdClient {
    fn backend(&self) -> &'static str {
        "etcd"
    }

    async fn get(&self, path: &str) -> Result<Option<String>> {
        self.read(path).await.map(|snapshot| snapshot.value)
    }

    async fn wait(&self, path: &str, index: u64, timeout: Duration) -> Result<KvSnapshot> {
        if index == 0 {
            return self.read(path).await;
        }

        let result = self
            .http
            .get(self.url(path))
            .query(&[("wait", "true".to_string()), ("waitIndex", (index + 1).to_string())])
            .timeout(timeout)
            .send()
            .await;

        match result {
            Ok(response) => {
                let mut snapshot = parse(response, path).await?;
                // the event index can be older than the store index we resumed from
                snapshot.index = snapshot.index.max(index);
                Ok(snapshot)
            }
            Err(e) if e.is_timeout() => self.read(path).await,
            Err(e) => Err(e.into()),
        }
    }
}
