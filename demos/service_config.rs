//! A service reading its settings from a YAML file with environment overrides.
//!
//! This example demonstrates:
//! - Typed lookups with coercion (`get_int`, `get_bool`, ...)
//! - Binding a nested struct with `Bind` and `Bundle`
//! - Environment variables taking precedence over the file
//!
//! Run with: cargo run --example service_config
//!
//! Try overriding a value: SERVER_HTTP_PORT=9000 cargo run --example service_config

use std::fs;
use tiered_config::prelude::*;

const CONFIG: &str = r#"
kumuluzee:
  name: customer-service
  version: 1.2.0
  env:
    name: staging

server:
  http:
    port: 8080
    host: 0.0.0.0
  request-timeout: "2.5"
  debug: false

database:
  url: postgres://localhost/customers
  max-connections: 20
"#;

#[derive(Debug, Default, Clone)]
struct HttpConfig {
    port: u16,
    host: String,
}

impl Bind for HttpConfig {
    fn bind(schema: &mut Schema<Self>) {
        schema
            .field("Port", "", |c: &mut HttpConfig| &mut c.port)
            .field("Host", "", |c: &mut HttpConfig| &mut c.host);
    }
}

#[derive(Debug, Default, Clone)]
struct ServerConfig {
    http: HttpConfig,
    request_timeout: f64,
    debug: bool,
    allowed_origins: Vec<String>,
}

impl Bind for ServerConfig {
    fn bind(schema: &mut Schema<Self>) {
        schema
            .nested("Http", "", |c: &mut ServerConfig| &mut c.http)
            .field("RequestTimeout", "request-timeout", |c: &mut ServerConfig| {
                &mut c.request_timeout
            })
            .field("Debug", "", |c: &mut ServerConfig| &mut c.debug)
            // lists are not bindable; this field keeps its default
            .unsupported("AllowedOrigins", "allowed-origins", "Vec<String>");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.yaml");
    fs::write(&path, CONFIG)?;

    let client = ConfigClient::builder()
        .with_config_path(&path)
        .with_log_level(tracing::Level::INFO)
        .build()
        .await?;

    println!("Sources: {}", client.source_names().join(" > "));

    let service = client.get_string("kumuluzee.name").await.unwrap_or_default();
    let environment = client
        .get_string("kumuluzee.env.name")
        .await
        .unwrap_or_else(|| "dev".to_string());
    println!("Service {service} in {environment}");

    let url = client.get_string("database.url").await;
    let pool = client.get_int("database.max-connections").await.unwrap_or(10);
    println!("Database: {:?} (pool size {pool})", url);

    let server = Bundle::<ServerConfig>::with_client("server", client.clone()).await;
    let config = server.get();
    println!(
        "Listening on {}:{} (timeout {}s, debug {}, origins {:?})",
        config.http.host,
        config.http.port,
        config.request_timeout,
        config.debug,
        config.allowed_origins
    );

    Ok(())
}
