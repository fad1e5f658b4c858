//! End-to-end tests: environment, file and Consul resolved through one client.

#![cfg(feature = "consul")]
#![allow(unsafe_code)] // For env var manipulation in tests

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use serial_test::serial;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tiered_config::prelude::*;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NAMESPACE: &str = "environments/test/services/customer-service/2.0.0/config";

fn write_config(dir: &TempDir, consul: &str) -> PathBuf {
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        format!(
            r#"
kumuluzee:
  name: customer-service
  version: 2.0.0
  env:
    name: test
  config:
    start-retry-delay-ms: 10
    max-retry-delay-ms: 100
    consul:
      hosts: {consul}

rest-config:
  string-property: from-file
  integer-property: 1
  boolean-property: false
"#
        ),
    )
    .unwrap();
    path
}

fn value(key: &str, value: &str, index: u64) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("X-Consul-Index", index.to_string().as_str())
        .set_body_json(json!([{
            "Key": format!("{}/{}", NAMESPACE, key.replace('.', "/")),
            "Value": STANDARD.encode(value),
        }]))
}

fn kv_path(key: &str) -> String {
    format!("/v1/kv/{}/{}", NAMESPACE, key.replace('.', "/"))
}

async fn client(dir: &TempDir, server: &MockServer) -> ConfigClient {
    ConfigClient::builder()
        .with_config_path(write_config(dir, &server.uri()))
        .with_extension("consul")
        .build()
        .await
        .unwrap()
}

#[derive(Debug, Default, Clone, PartialEq)]
struct RestConfig {
    string_property: String,
    integer_property: i32,
    boolean_property: bool,
}

impl Bind for RestConfig {
    fn bind(schema: &mut Schema<Self>) {
        schema
            .field("StringProperty", "string-property", |c: &mut RestConfig| &mut c.string_property)
            .field("IntegerProperty", "integer-property,watch", |c: &mut RestConfig| {
                &mut c.integer_property
            })
            .field("BooleanProperty", "boolean-property", |c: &mut RestConfig| {
                &mut c.boolean_property
            });
    }
}

#[tokio::test]
#[serial]
async fn test_source_order() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let client = client(&dir, &server).await;

    let names = client.source_names();
    assert_eq!(names.len(), 3);
    assert_eq!(names[0], "env");
    assert_eq!(names[1], "consul");
    assert!(names[2].starts_with("file:"));
}

#[tokio::test]
#[serial]
async fn test_consul_overrides_file_and_env_overrides_consul() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(kv_path("rest-config.string-property")))
        .respond_with(value("rest-config.string-property", "from-consul", 3))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(kv_path("rest-config.integer-property")))
        .respond_with(value("rest-config.integer-property", "36", 3))
        .mount(&server)
        .await;

    unsafe {
        std::env::set_var("REST_CONFIG_INTEGER_PROPERTY", "99");
    }

    let client = client(&dir, &server).await;
    assert_eq!(
        client.get_string("rest-config.string-property").await.as_deref(),
        Some("from-consul")
    );
    assert_eq!(client.get_int("rest-config.integer-property").await, Some(99));
    // consul has no value, so the file answers
    assert_eq!(client.get_bool("rest-config.boolean-property").await, Some(false));

    unsafe {
        std::env::remove_var("REST_CONFIG_INTEGER_PROPERTY");
    }
}

#[tokio::test]
#[serial]
async fn test_namespace_override() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/custom/ns/rest-config/string-property"))
        .respond_with(value("rest-config.string-property", "from-custom-namespace", 1))
        .mount(&server)
        .await;

    let client = ConfigClient::builder()
        .with_config_path(write_config(&dir, &server.uri()))
        .with_extension("consul")
        .with_extension_namespace("custom/ns")
        .build()
        .await
        .unwrap();

    assert_eq!(
        client.get_string("rest-config.string-property").await.as_deref(),
        Some("from-custom-namespace")
    );
}

#[tokio::test]
#[serial]
async fn test_unreachable_consul_falls_through_to_file() {
    let dir = TempDir::new().unwrap();
    let client = ConfigClient::builder()
        .with_config_path(write_config(&dir, "http://127.0.0.1:1"))
        .with_extension("consul")
        .build()
        .await
        .unwrap();

    assert_eq!(
        client.get_string("rest-config.string-property").await.as_deref(),
        Some("from-file")
    );
}

#[tokio::test]
#[serial]
async fn test_subscription_and_watch_stream() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let key = "rest-config.maintenance";

    Mock::given(method("GET"))
        .and(path(kv_path(key)))
        .and(query_param("index", "0"))
        .respond_with(value(key, "true", 4))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(kv_path(key)))
        .and(query_param("index", "4"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let client = client(&dir, &server).await;
    let (subscription, mut changes) = client.watch(key);
    assert_eq!(subscription.watch_count(), 1);

    let change = tokio::time::timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("change should arrive")
        .unwrap();
    assert_eq!(change, ConfigChange::new(key, "true"));

    client.shutdown();
    assert!(subscription.is_cancelled());
    tokio::time::timeout(Duration::from_secs(1), subscription.shutdown())
        .await
        .expect("watches should stop after client shutdown");
}

#[tokio::test]
#[serial]
async fn test_bundle_refreshes_watched_field() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let key = "rest-config.integer-property";

    // plain reads: the initial fill sees 36, later refreshes see 37
    Mock::given(method("GET"))
        .and(path(kv_path(key)))
        .and(wiremock::matchers::query_param_is_missing("index"))
        .respond_with(value(key, "36", 1))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(kv_path(key)))
        .and(wiremock::matchers::query_param_is_missing("index"))
        .respond_with(value(key, "37", 2))
        .mount(&server)
        .await;
    // watch: the first poll reports the new value, later polls block
    Mock::given(method("GET"))
        .and(path(kv_path(key)))
        .and(query_param("index", "0"))
        .respond_with(value(key, "37", 2))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(kv_path(key)))
        .and(query_param("index", "2"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let client = client(&dir, &server).await;
    let mut bundle = Bundle::<RestConfig>::with_client("rest-config", client).await;
    assert_eq!(bundle.get().integer_property, 36);
    assert_eq!(bundle.get().string_property, "from-file");

    tokio::time::timeout(Duration::from_secs(5), async {
        while bundle.get().integer_property != 37 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("watched field should refresh");

    bundle.client().shutdown();
    bundle.shutdown().await;
    assert_eq!(bundle.get().integer_property, 37);
}
