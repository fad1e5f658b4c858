//! Consul source against a mock HTTP agent.

#![cfg(feature = "consul")]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tiered_config::core::RawValue;
use tiered_config::sources::kv::ConsulClient;
use tiered_config::sources::{ConfigSource, KvSource};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NAMESPACE: &str = "environments/dev/services/customer-service/1.0.0/config";

fn kv_path(key: &str) -> String {
    format!("/v1/kv/{}/{}", NAMESPACE, key.replace('.', "/"))
}

fn pair(key: &str, value: &str) -> serde_json::Value {
    json!([{
        "Key": format!("{}/{}", NAMESPACE, key.replace('.', "/")),
        "Value": STANDARD.encode(value),
        "Flags": 0,
        "CreateIndex": 1,
        "ModifyIndex": 1,
    }])
}

fn source(server: &MockServer) -> KvSource {
    let client = ConsulClient::new(&server.uri()).unwrap();
    KvSource::new(Arc::new(client), NAMESPACE)
        .with_retry_delays(Duration::from_millis(10), Duration::from_millis(40))
        .with_wait_time(Duration::from_secs(1))
}

#[tokio::test]
async fn test_get_decodes_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(kv_path("integer-value")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Consul-Index", "12")
                .set_body_json(pair("integer-value", "36")),
        )
        .mount(&server)
        .await;

    let source = source(&server);
    assert_eq!(source.get("integer-value").await, Some(RawValue::from("36")));
    assert_eq!(source.name(), "consul");
}

#[tokio::test]
async fn test_missing_key_is_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert_eq!(source(&server).get("missing").await, None);
}

#[tokio::test]
async fn test_key_without_value_is_empty_string() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(kv_path("flag")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "Key": "flag", "Value": null }])))
        .mount(&server)
        .await;

    assert_eq!(source(&server).get("flag").await, Some(RawValue::from("")));
}

#[tokio::test]
async fn test_server_error_is_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert_eq!(source(&server).get("integer-value").await, None);
}

#[tokio::test]
async fn test_unreachable_agent_is_absent() {
    let client = ConsulClient::new("http://127.0.0.1:1").unwrap();
    let source = KvSource::new(Arc::new(client), NAMESPACE);
    assert_eq!(source.get("integer-value").await, None);
}

#[tokio::test]
async fn test_watch_follows_index() {
    let server = MockServer::start().await;
    let key_path = kv_path("some-config.mode");

    Mock::given(method("GET"))
        .and(path(key_path.clone()))
        .and(query_param("index", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Consul-Index", "5")
                .set_body_json(pair("some-config.mode", "blue")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(key_path.clone()))
        .and(query_param("index", "5"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Consul-Index", "6")
                .set_body_json(pair("some-config.mode", "green")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(key_path.clone()))
        .and(query_param("index", "6"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("X-Consul-Index", "7"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(key_path))
        .and(query_param("index", "7"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let handle = source(&server)
        .subscribe(
            "some-config.mode",
            Arc::new(move |key: &str, value: &str| {
                let _ = tx.send((key.to_string(), value.to_string()));
            }),
            cancel.clone(),
        )
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let change = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("change should arrive")
            .unwrap();
        seen.push(change);
    }

    assert_eq!(
        seen,
        vec![
            ("some-config.mode".to_string(), "blue".to_string()),
            ("some-config.mode".to_string(), "green".to_string()),
            ("some-config.mode".to_string(), String::new()),
        ]
    );

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("watch should stop on cancel")
        .unwrap();
}

#[tokio::test]
async fn test_watch_recovers_after_errors() {
    let server = MockServer::start().await;
    let key_path = kv_path("retry");

    Mock::given(method("GET"))
        .and(path(key_path.clone()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(key_path.clone()))
        .and(query_param("index", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Consul-Index", "9")
                .set_body_json(pair("retry", "up")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(key_path))
        .and(query_param("index", "9"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    source(&server).subscribe(
        "retry",
        Arc::new(move |_: &str, value: &str| {
            let _ = tx.send(value.to_string());
        }),
        cancel.clone(),
    );

    let value = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("watch should recover")
        .unwrap();
    assert_eq!(value, "up");

    cancel.cancel();
}
