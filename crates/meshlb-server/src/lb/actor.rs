//! LbCoordinator Actor
//!
//! Fronts the [`LbDirector`] with a message interface and keeps the registry
//! of what has been published, for the admin dump endpoints.

use chrono::{DateTime, Utc};
use kameo::{
    message::{Context, Message},
    Actor,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::director::{BuildOutcome, LbDirector};
use super::messages::{
    ApplyCluster, ApplyOutcome, ApplyStatus, BackendRecord, ClusterDump, ClusterRecord,
    GetClusterDump, GetLbStats, LbStats,
};
use super::LbError;
use crate::observability::metrics as lb_metrics;

/// Coordinates table builds and tracks published clusters.
#[derive(Actor)]
pub struct LbCoordinator {
    director: Arc<LbDirector>,
    published: HashMap<String, ClusterRecord>,
    last_publish: Option<DateTime<Utc>>,
}

impl LbCoordinator {
    pub fn new(director: Arc<LbDirector>) -> Self {
        info!(
            table_size = director.table_size(),
            "Initializing LbCoordinator"
        );
        Self {
            director,
            published: HashMap::new(),
            last_publish: None,
        }
    }
}

impl Message<ApplyCluster> for LbCoordinator {
    type Reply = ApplyOutcome;

    async fn handle(
        &mut self,
        msg: ApplyCluster,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let cluster = msg.cluster;
        let name = cluster.name.clone();
        let started = Instant::now();

        let status = match self.director.build_and_publish(&cluster).await {
            Ok(BuildOutcome::Published(published)) => {
                let now = Utc::now();
                let backends: Vec<BackendRecord> = cluster
                    .iter_endpoints()
                    .zip(published.slot_counts.iter())
                    .map(|(ep, &slots)| BackendRecord {
                        address: ep.address.canonical(),
                        slots,
                    })
                    .collect();

                info!(
                    cluster = %name,
                    backends = published.backend_count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Published maglev table"
                );
                lb_metrics::record_table_build(&name, started.elapsed());
                lb_metrics::set_cluster_backends(&name, published.backend_count);

                self.published.insert(
                    name.clone(),
                    ClusterRecord {
                        name: name.clone(),
                        backend_count: published.backend_count,
                        backends,
                        published_at: now,
                    },
                );
                self.last_publish = Some(now);
                lb_metrics::set_published_clusters(self.published.len());

                ApplyStatus::Published {
                    backend_count: published.backend_count,
                }
            }
            Ok(BuildOutcome::SkippedEmpty) => {
                debug!(cluster = %name, "Cluster has no endpoints, nothing published");
                ApplyStatus::SkippedEmpty
            }
            Err(err @ LbError::InvalidCluster(_)) => {
                warn!(cluster = %name, error = %err, "Cluster rejected");
                lb_metrics::record_publish_failure(&name, err.kind());
                ApplyStatus::Rejected {
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                warn!(
                    cluster = %name,
                    error = %err,
                    "Failed to publish maglev table, previous table stays in effect"
                );
                lb_metrics::record_publish_failure(&name, err.kind());
                ApplyStatus::Failed {
                    error: err.to_string(),
                }
            }
        };

        ApplyOutcome {
            cluster: name,
            status,
        }
    }
}

impl Message<GetLbStats> for LbCoordinator {
    type Reply = LbStats;

    async fn handle(
        &mut self,
        _msg: GetLbStats,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        LbStats {
            published_clusters: self.published.len(),
            table_size: self.director.table_size(),
            last_publish: self.last_publish,
        }
    }
}

impl Message<GetClusterDump> for LbCoordinator {
    type Reply = ClusterDump;

    async fn handle(
        &mut self,
        _msg: GetClusterDump,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let mut clusters: Vec<ClusterRecord> = self.published.values().cloned().collect();
        clusters.sort_by(|a, b| a.name.cmp(&b.name));
        ClusterDump { clusters }
    }
}
