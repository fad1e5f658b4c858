//! Performance benchmarks for tiered-config.
//!
//! Measures key resolution through the source registry, value coercion, and
//! snapshot reads of a bound struct.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tiered_config::core::Registry;
use tiered_config::prelude::*;
use tiered_config::sources::{EnvSource, FileSource};
use tokio::runtime::Runtime;

const DOCUMENT: &str = r#"
server:
  port: 8080
  host: localhost
  timeout: "2.5"
  tls: "true"
deep:
  a:
    b:
      c:
        d:
          e: 6
"#;

#[derive(Debug, Default, Clone)]
struct Server {
    port: u16,
    host: String,
    timeout: f64,
    tls: bool,
}

impl Bind for Server {
    fn bind(schema: &mut Schema<Self>) {
        schema
            .field("Port", "", |s: &mut Server| &mut s.port)
            .field("Host", "", |s: &mut Server| &mut s.host)
            .field("Timeout", ",watch", |s: &mut Server| &mut s.timeout)
            .field("TLS", "tls", |s: &mut Server| &mut s.tls);
    }
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.push(Arc::new(EnvSource::new()));
    registry.push(Arc::new(FileSource::from_yaml_str(DOCUMENT).unwrap()));
    registry
}

/// Benchmark lookups that fall through the environment to the file
fn benchmark_resolve(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let registry = registry();

    let mut group = c.benchmark_group("resolve");
    for key in ["server.port", "deep.a.b.c.d.e", "missing.key"] {
        group.bench_with_input(BenchmarkId::from_parameter(key), &key, |b, key| {
            b.iter(|| rt.block_on(async { black_box(registry.get_int(key).await) }));
        });
    }
    group.finish();
}

/// Benchmark raw value coercion
fn benchmark_coercion(c: &mut Criterion) {
    let values = [
        ("native_int", RawValue::from(8080i64)),
        ("decimal_string", RawValue::from("8080")),
        ("hex_string", RawValue::from("0x1F90")),
        ("float_string", RawValue::from("8080.75")),
    ];

    let mut group = c.benchmark_group("coercion");
    for (name, value) in &values {
        group.bench_with_input(BenchmarkId::new("as_int", name), value, |b, value| {
            b.iter(|| black_box(value.as_int()));
        });
    }
    group.bench_function("as_bool", |b| {
        let value = RawValue::from("TRUE");
        b.iter(|| black_box(value.as_bool()));
    });
    group.finish();
}

/// Benchmark snapshot reads of a bound struct
fn benchmark_bundle_read(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, DOCUMENT).unwrap();

    let bundle = rt.block_on(async {
        let options = Options {
            config_path: Some(path),
            ..Options::default()
        };
        Bundle::<Server>::new("server", options).await.unwrap()
    });

    let mut group = c.benchmark_group("bundle");
    group.bench_function("get", |b| {
        b.iter(|| {
            let server = bundle.get();
            black_box(server.port);
        });
    });
    group.bench_function("bind", |b| {
        b.iter(|| {
            let client = bundle.client().clone();
            rt.block_on(async { black_box(Bundle::<Server>::with_client("server", client).await) })
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_resolve,
    benchmark_coercion,
    benchmark_bundle_read
);
criterion_main!(benches);
