//! Watching keys in Consul or etcd for live changes.
//!
//! This example demonstrates:
//! - Selecting a distributed store with `with_extension`
//! - Callback subscriptions and the `watch` event stream
//! - A bound struct whose `watch` fields refresh automatically
//! - Stopping every watch with `shutdown`
//!
//! Start a local Consul agent (`consul agent -dev`), then run:
//!
//!   cargo run --example live_watch
//!
//! and change a key while it runs:
//!
//!   consul kv put environments/dev/services/live-watch/1.0.0/config/app/maintenance true
//!
//! Set `KUMULUZEE_CONFIG_CONSUL_HOSTS` to point at another agent, or pass
//! `etcd` as the first argument to use etcd instead.

use std::time::Duration;
use tiered_config::prelude::*;

#[derive(Debug, Default, Clone)]
struct AppConfig {
    maintenance: bool,
    banner: String,
    rate_limit: u32,
}

impl Bind for AppConfig {
    fn bind(schema: &mut Schema<Self>) {
        schema
            .field("Maintenance", ",watch", |c: &mut AppConfig| &mut c.maintenance)
            .field("Banner", ",watch", |c: &mut AppConfig| &mut c.banner)
            .field("RateLimit", "rate-limit", |c: &mut AppConfig| &mut c.rate_limit);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let extension = std::env::args().nth(1).unwrap_or_else(|| "consul".to_string());

    // the namespace is given here, so the config file is optional
    let client = ConfigClient::builder()
        .with_config_path("live-watch.yaml")
        .with_extension(extension)
        .with_extension_namespace("environments/dev/services/live-watch/1.0.0/config")
        .with_log_level(tracing::Level::DEBUG)
        .build()
        .await?;

    println!("Sources: {}", client.source_names().join(" > "));

    let callback = client.subscribe("app.maintenance", |key, value| {
        println!("[callback] {key} = {value:?}");
    });
    println!("Watching app.maintenance in {} source(s)", callback.watch_count());

    let (stream, mut changes) = client.watch("app.banner");
    tokio::spawn(async move {
        while let Some(change) = changes.recv().await {
            println!("[stream] {} = {:?}", change.key, change.value);
        }
    });

    let app = Bundle::<AppConfig>::with_client("app", client.clone()).await;

    for _ in 0..12 {
        println!("Current: {:?}", app.get());
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    client.shutdown();
    callback.shutdown().await;
    stream.shutdown().await;
    println!("All watches stopped");

    Ok(())
}
