//! Cluster Endpoints
//!
//! `POST /clusters` applies an already-decoded cluster specification — the
//! etcd-free ingestion path. The GET endpoints dump the published-table
//! registry for operators.

use super::state::AppState;
use crate::lb::messages::{ApplyCluster, ApplyStatus, GetClusterDump};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use meshlb_core::Cluster;
use serde::Serialize;
use tracing::warn;

/// One row of the cluster listing.
#[derive(Debug, Serialize)]
pub struct ClusterSummary {
    pub name: String,
    pub backend_count: usize,
    pub published_at: DateTime<Utc>,
}

/// POST /clusters - build and publish the lookup table for a cluster
#[tracing::instrument(skip(state, cluster), fields(cluster = %cluster.name))]
pub async fn apply_cluster(
    State(state): State<AppState>,
    Json(cluster): Json<Cluster>,
) -> Response {
    match state.lb_ref.ask(ApplyCluster { cluster }).await {
        Ok(outcome) => {
            let code = match &outcome.status {
                ApplyStatus::Published { .. } | ApplyStatus::SkippedEmpty => StatusCode::OK,
                ApplyStatus::Rejected { .. } => StatusCode::BAD_REQUEST,
                ApplyStatus::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (code, Json(outcome)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to reach LbCoordinator");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "LB coordinator unavailable".to_string(),
            )
                .into_response()
        }
    }
}

/// GET /clusters - list published clusters
#[tracing::instrument(skip(state))]
pub async fn list_clusters(State(state): State<AppState>) -> Response {
    match state.lb_ref.ask(GetClusterDump).await {
        Ok(dump) => {
            let summaries: Vec<ClusterSummary> = dump
                .clusters
                .into_iter()
                .map(|record| ClusterSummary {
                    name: record.name,
                    backend_count: record.backend_count,
                    published_at: record.published_at,
                })
                .collect();
            Json(summaries).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to reach LbCoordinator");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "LB coordinator unavailable".to_string(),
            )
                .into_response()
        }
    }
}

/// GET /clusters/{name} - one cluster's record including per-backend slot
/// counts
#[tracing::instrument(skip(state))]
pub async fn get_cluster(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.lb_ref.ask(GetClusterDump).await {
        Ok(dump) => match dump.clusters.into_iter().find(|record| record.name == name) {
            Some(record) => Json(record).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                format!("no published table for cluster {name}"),
            )
                .into_response(),
        },
        Err(e) => {
            warn!(error = %e, "Failed to reach LbCoordinator");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "LB coordinator unavailable".to_string(),
            )
                .into_response()
        }
    }
}
