//! Observability Module
//!
//! Provides observability for the meshlb daemon:
//! - `metrics`: Prometheus metrics for table builds and publication
//! - `tracing`: tracing-subscriber setup with optional OpenTelemetry export

pub mod metrics;
pub mod tracing;

pub use metrics::{init_metrics, MetricsState};
pub use tracing::{init_tracing, shutdown_tracing, TracingConfig};
