//! Prometheus Metrics
//!
//! Defines and initializes all Prometheus metrics for the meshlb daemon.
//!
//! Metrics tracked:
//! - `meshlb_table_builds_total` - counter of successful table builds
//! - `meshlb_table_build_duration_seconds` - histogram of build+publish times
//! - `meshlb_publish_failures_total` - counter of failed publishes by kind
//! - `meshlb_cluster_backends` - gauge of backends per cluster
//! - `meshlb_published_clusters` - gauge of clusters with a published table
//! - `meshlb_sync_events_total` - counter of cluster sync events by operation

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// State containing the Prometheus handle for metrics export
#[derive(Clone)]
pub struct MetricsState {
    pub prometheus_handle: PrometheusHandle,
}

/// Initialize Prometheus metrics and return the handle for exporting.
pub fn init_metrics() -> Result<MetricsState, Box<dyn std::error::Error + Send + Sync>> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_metric_descriptions();

    Ok(MetricsState {
        prometheus_handle: handle,
    })
}

/// Register descriptions for all metrics
fn register_metric_descriptions() {
    describe_counter!(
        "meshlb_table_builds_total",
        "Total number of maglev tables built and published"
    );
    describe_histogram!(
        "meshlb_table_build_duration_seconds",
        "Duration of table build and publish in seconds"
    );
    describe_counter!(
        "meshlb_publish_failures_total",
        "Total number of failed cluster publishes by failure kind"
    );
    describe_gauge!(
        "meshlb_cluster_backends",
        "Number of backends in each published cluster"
    );
    describe_gauge!(
        "meshlb_published_clusters",
        "Number of clusters with a published lookup table"
    );
    describe_counter!(
        "meshlb_sync_events_total",
        "Total number of cluster sync events processed by operation"
    );
}

/// Record a successful table build and publish
pub fn record_table_build(cluster: &str, duration: Duration) {
    counter!("meshlb_table_builds_total", "cluster" => cluster.to_string()).increment(1);
    histogram!("meshlb_table_build_duration_seconds").record(duration.as_secs_f64());
}

/// Record a failed publish
pub fn record_publish_failure(cluster: &str, kind: &'static str) {
    counter!(
        "meshlb_publish_failures_total",
        "cluster" => cluster.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Update the backend count gauge for a cluster
pub fn set_cluster_backends(cluster: &str, count: usize) {
    gauge!("meshlb_cluster_backends", "cluster" => cluster.to_string()).set(count as f64);
}

/// Update the published cluster count gauge
pub fn set_published_clusters(count: usize) {
    gauge!("meshlb_published_clusters").set(count as f64);
}

/// Record a cluster sync event
pub fn record_sync_event(op: &'static str) {
    counter!("meshlb_sync_events_total", "op" => op).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_recording() {
        // These functions should not panic when called
        record_table_build("test-cluster", Duration::from_millis(5));
        record_publish_failure("test-cluster", "outer_update");
        set_cluster_backends("test-cluster", 3);
        set_published_clusters(1);
        record_sync_event("put");
    }
}
