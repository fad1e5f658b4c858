//! Core resolution types: the client, its registry and the struct binder.

mod builder;
mod bundle;
mod client;
mod registry;
mod schema;
pub mod settings;
mod value;

pub use builder::ClientBuilder;
pub use bundle::Bundle;
pub use client::{ConfigClient, Options};
pub use registry::Registry;
pub use schema::{Bind, FieldDescriptor, FieldKind, Leaf, LeafValue, Schema};
pub use value::RawValue;
