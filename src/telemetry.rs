//! Tracing/logging bootstrap.
//!
//! A subscriber that reads `RUST_LOG` and emits structured fields, with no
//! OTLP/Jaeger/Zipkin export — this service only needs span-per-operation
//! observability, since every network and cache call the spec calls out as
//! a suspension point (spec §5) should also be a span.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global `tracing` subscriber from `RUST_LOG`, defaulting to
/// `info` when unset.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
