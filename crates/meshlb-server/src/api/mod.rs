//! HTTP Admin API Module
//!
//! Status and control surface for the meshlb daemon.
//!
//! This module contains:
//! - `state`: Shared application state
//! - `health`: Liveness and readiness probes
//! - `metrics`: Prometheus metrics endpoint
//! - `clusters`: Cluster apply and published-table dump endpoints
//! - `version`: Build metadata endpoint

mod clusters;
mod health;
mod metrics;
mod state;
mod version;

pub use state::AppState;

use axum::{routing::get, Router};

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health checks
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Observability
        .route("/metrics", get(metrics::get_metrics))
        .route("/version", get(version::get_version))
        // Cluster surface
        .route(
            "/clusters",
            get(clusters::list_clusters).post(clusters::apply_cluster),
        )
        .route("/clusters/{name}", get(clusters::get_cluster))
        .with_state(state)
}
