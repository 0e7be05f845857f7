//! LbCoordinator Message Types
//!
//! Messages for applying cluster specifications and inspecting the
//! published-table registry.

use chrono::{DateTime, Utc};
use kameo::Reply;
use meshlb_core::Cluster;
use serde::{Deserialize, Serialize};

/// Build and publish the lookup table for a cluster.
///
/// Sent by the etcd sync manager on every cluster PUT and by the admin API
/// on `POST /clusters`.
#[derive(Debug, Clone)]
pub struct ApplyCluster {
    pub cluster: Cluster,
}

/// Result of applying a cluster.
#[derive(Debug, Clone, Serialize, Deserialize, Reply)]
pub struct ApplyOutcome {
    pub cluster: String,
    pub status: ApplyStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ApplyStatus {
    /// A table was built and published.
    Published { backend_count: usize },
    /// The cluster has no endpoints; nothing was published.
    SkippedEmpty,
    /// The cluster object was rejected before building.
    Rejected { reason: String },
    /// Building or publishing failed; any previously published table
    /// remains in effect.
    Failed { error: String },
}

/// Request current subsystem statistics.
#[derive(Debug, Clone)]
pub struct GetLbStats;

/// Subsystem statistics response.
#[derive(Debug, Clone, Serialize, Deserialize, Reply)]
pub struct LbStats {
    /// Number of clusters with a published table.
    pub published_clusters: usize,
    pub table_size: u64,
    pub last_publish: Option<DateTime<Utc>>,
}

/// Request the published-cluster registry.
#[derive(Debug, Clone)]
pub struct GetClusterDump;

/// Snapshot of everything currently published.
#[derive(Debug, Clone, Serialize, Deserialize, Reply)]
pub struct ClusterDump {
    pub clusters: Vec<ClusterRecord>,
}

/// One published cluster.
#[derive(Debug, Clone, Serialize, Deserialize, Reply)]
pub struct ClusterRecord {
    pub name: String,
    pub backend_count: usize,
    pub backends: Vec<BackendRecord>,
    pub published_at: DateTime<Utc>,
}

/// One backend of a published cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendRecord {
    /// Canonical address, the exact hash input.
    pub address: String,
    /// Lookup-table slots owned by this backend.
    pub slots: usize,
}
