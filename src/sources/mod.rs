//! Configuration source implementations.

mod config_source;
mod env;
mod file;
pub mod kv;

pub use config_source::ConfigSource;
pub use env::EnvSource;
pub use file::{DEFAULT_CONFIG_PATH, FileSource};
pub use kv::{Backend, KvClient, KvSource};
