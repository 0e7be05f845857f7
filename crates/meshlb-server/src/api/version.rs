//! Version Endpoint
//!
//! Exposes build and runtime identity at GET /version for diagnostics.

use super::state::AppState;
use crate::version;
use axum::{extract::State, Json};
use serde::Serialize;

/// Build and runtime identity of this daemon instance.
#[derive(Debug, Serialize)]
pub struct VersionInfo {
    pub version: String,
    pub node_id: String,
    pub git_sha: &'static str,
    pub git_branch: &'static str,
    pub git_commit_timestamp: &'static str,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
    pub target: &'static str,
}

/// GET /version - build metadata and node identity
#[tracing::instrument(skip(state))]
pub async fn get_version(State(state): State<AppState>) -> Json<VersionInfo> {
    Json(VersionInfo {
        version: version::full_version(),
        node_id: state.node_id.clone(),
        git_sha: version::GIT_SHA,
        git_branch: version::GIT_BRANCH,
        git_commit_timestamp: version::GIT_COMMIT_TIMESTAMP,
        build_timestamp: version::BUILD_TIMESTAMP,
        rustc_version: version::RUSTC_VERSION,
        target: version::TARGET,
    })
}
