//! Health Check Endpoints
//!
//! Liveness and readiness probe handlers.

use super::state::AppState;
use axum::{extract::State, http::StatusCode};

/// Liveness probe endpoint. Verifies the etcd connection when sync is
/// enabled; a standalone daemon is alive as long as it answers.
#[tracing::instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    let Some(etcd_client) = &state.etcd_client else {
        return Ok("OK");
    };

    let etcd_check = tokio::time::timeout(tokio::time::Duration::from_secs(2), async {
        let mut client = etcd_client.write().await;
        client.status().await
    })
    .await;

    match etcd_check {
        Ok(Ok(_)) => Ok("OK"),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "etcd health check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
        Err(_) => {
            tracing::warn!("etcd health check timed out");
            Err(StatusCode::REQUEST_TIMEOUT)
        }
    }
}

/// Readiness probe endpoint. Returns OK once the LB subsystem is
/// initialized and the initial cluster sync has been kicked off.
#[tracing::instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    if state.readiness.load(std::sync::atomic::Ordering::Acquire) {
        Ok("READY")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
