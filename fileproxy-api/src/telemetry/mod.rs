//! File Proxy Telemetry - Observability Infrastructure
//!
//! Structured JSON logging through `tracing` and Prometheus metrics for the
//! proxy. Nothing here needs an external collector.

pub mod metrics;
pub mod tracer;

pub use metrics::{metrics_handler, ProxyMetrics, METRICS};
pub use tracer::init_tracing;
