//! # tiered-config
//!
//! Layered configuration for services, resolved from the environment, a YAML
//! file and an optional Consul or etcd key-value store, with live key watches.
//!
//! ## Overview
//!
//! A [`ConfigClient`](core::ConfigClient) holds an ordered set of sources and
//! answers each lookup from the first source that has the key:
//!
//! | Source | Priority | Watchable |
//! |---|---|---|
//! | Environment variables | 300 | no |
//! | Consul / etcd | 150 | yes |
//! | YAML file | 100 | no |
//!
//! Values are coerced on read (`get_int`, `get_bool`, ...) and a missing or
//! mistyped key is simply `None`. Keys in a distributed store can be watched
//! with long-polling; failed polls back off exponentially.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tiered_config::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let client = ConfigClient::builder()
//!     .with_config_path("config/config.yaml")
//!     .with_extension("consul")
//!     .build()
//!     .await?;
//!
//! let port = client.get_int("server.port").await.unwrap_or(8080);
//! println!("Listening on {port}");
//!
//! client.subscribe("server.maintenance", |key, value| {
//!     println!("{key} changed to {value}");
//! });
//! # Ok(())
//! # }
//! ```
//!
//! ## Binding structs
//!
//! Implement [`Bind`](core::Bind) to describe a struct's fields and load it
//! with [`Bundle`](core::Bundle). Fields tagged `watch` are refreshed when
//! their key changes.
//!
//! ## Environment variables
//!
//! A key such as `lev1.lev2[5].LEV3` is looked up under several spellings, in
//! order: the key itself, `lev1_lev2_5__LEV3`, `LEV1_LEV2_5__LEV3`,
//! `LEV1_LEV25_LEV3` and `LEV1_LEV2[5]_LEV3`.
//!
//! ## Feature Flags
//!
//! - `consul` (default): Consul KV backend
//! - `etcd` (default): etcd v2 backend

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
mod logging;
pub mod notify;
pub mod sources;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{Bind, Bundle, ClientBuilder, ConfigClient, Options, RawValue, Schema};
    pub use crate::error::{ConfigError, Result};
    pub use crate::notify::{ConfigChange, Subscription};
    pub use crate::sources::ConfigSource;
}
