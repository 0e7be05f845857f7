//! ClusterSyncManager
//!
//! Applies cluster specifications from etcd to the LbCoordinator. Performs a
//! full sync of the prefix at startup, then follows the watch stream and
//! applies every PUT. Deletes are logged only: the publication contract has
//! no removal operation, so a deleted cluster's table stays in the store
//! until the next publish overwrites it.

use etcd_client::{Client, EventType, GetOptions, WatchOptions};
use kameo::actor::ActorRef;
use meshlb_core::Cluster;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::LbConfig;
use crate::lb::messages::{ApplyCluster, ApplyStatus};
use crate::lb::LbCoordinator;
use crate::observability::metrics as lb_metrics;

/// Watches the cluster prefix in etcd and forwards specs to the coordinator.
pub struct ClusterSyncManager {
    lb_ref: ActorRef<LbCoordinator>,
    etcd_client: Arc<RwLock<Client>>,
    prefix: String,
    reconnect_delay: Duration,
}

impl ClusterSyncManager {
    pub fn new(
        lb_ref: ActorRef<LbCoordinator>,
        etcd_client: Arc<RwLock<Client>>,
        config: &LbConfig,
    ) -> Self {
        Self {
            lb_ref,
            etcd_client,
            prefix: config.cluster_prefix.clone(),
            reconnect_delay: config.reconnect_delay,
        }
    }

    /// Run the manager: initial sync, then the watch loop. Only returns on
    /// unrecoverable etcd errors.
    pub async fn run(mut self) -> Result<(), anyhow::Error> {
        info!(prefix = %self.prefix, "Starting ClusterSyncManager");
        self.sync_all_clusters().await?;
        self.watch_loop().await
    }

    /// Fetch every cluster spec under the prefix and apply it.
    async fn sync_all_clusters(&mut self) -> Result<(), anyhow::Error> {
        let specs: Vec<(String, String)> = {
            let mut client = self.etcd_client.write().await;
            let resp = client
                .get(self.prefix.as_str(), Some(GetOptions::new().with_prefix()))
                .await?;

            let mut specs = Vec::with_capacity(resp.kvs().len());
            for kv in resp.kvs() {
                let key = kv.key_str()?;
                let name = key.strip_prefix(self.prefix.as_str()).unwrap_or(key);
                specs.push((name.to_string(), kv.value_str()?.to_string()));
            }
            specs
        };

        let count = specs.len();
        for (name, spec_json) in specs {
            self.handle_cluster_put(&name, &spec_json).await;
        }

        info!(clusters = count, "Initial cluster sync complete");
        Ok(())
    }

    /// Watch the prefix and apply changes; reconnects on stream failure.
    async fn watch_loop(&mut self) -> Result<(), anyhow::Error> {
        loop {
            let (mut watcher, mut watch_stream) = {
                let mut client = self.etcd_client.write().await;
                client
                    .watch(
                        self.prefix.as_str(),
                        Some(WatchOptions::new().with_prefix()),
                    )
                    .await?
            };

            info!(prefix = %self.prefix, "Watching for cluster changes");

            loop {
                match watch_stream.message().await {
                    Ok(Some(resp)) => {
                        for event in resp.events() {
                            let Some(kv) = event.kv() else { continue };
                            let key = match kv.key_str() {
                                Ok(k) => k,
                                Err(e) => {
                                    warn!(error = %e, "Invalid key encoding in watch event");
                                    continue;
                                }
                            };
                            let name = key
                                .strip_prefix(self.prefix.as_str())
                                .unwrap_or(key)
                                .to_string();

                            match event.event_type() {
                                EventType::Put => {
                                    if let Ok(spec_json) = kv.value_str() {
                                        self.handle_cluster_put(&name, spec_json).await;
                                    }
                                }
                                EventType::Delete => {
                                    lb_metrics::record_sync_event("delete");
                                    debug!(
                                        cluster = %name,
                                        "Cluster deleted; published table remains until overwritten"
                                    );
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        warn!("Watch stream ended, reconnecting");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Watch error, reconnecting");
                        break;
                    }
                }
            }

            let _ = watcher.cancel().await;
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Decode one spec and forward it to the coordinator.
    async fn handle_cluster_put(&self, name: &str, spec_json: &str) {
        lb_metrics::record_sync_event("put");

        let cluster = match parse_cluster(spec_json) {
            Ok(cluster) => cluster,
            Err(e) => {
                warn!(cluster = %name, error = %e, "Invalid cluster spec, skipping");
                return;
            }
        };
        if cluster.name != name {
            warn!(
                key = %name,
                document = %cluster.name,
                "Cluster key and document name differ, using the document name"
            );
        }

        match self.lb_ref.ask(ApplyCluster { cluster }).await {
            Ok(outcome) => match outcome.status {
                ApplyStatus::Published { backend_count } => {
                    debug!(cluster = %outcome.cluster, backends = backend_count, "Cluster applied");
                }
                ApplyStatus::SkippedEmpty => {
                    debug!(cluster = %outcome.cluster, "Cluster empty, skipped");
                }
                ApplyStatus::Rejected { reason } => {
                    warn!(cluster = %outcome.cluster, reason = %reason, "Cluster rejected");
                }
                ApplyStatus::Failed { error } => {
                    warn!(cluster = %outcome.cluster, error = %error, "Cluster publish failed");
                }
            },
            Err(e) => {
                warn!(cluster = %name, error = %e, "Failed to reach LbCoordinator");
            }
        }
    }
}

/// Decode a cluster spec document.
fn parse_cluster(spec_json: &str) -> Result<Cluster, serde_json::Error> {
    serde_json::from_str(spec_json)
}

/// Spawn the ClusterSyncManager as a background task.
pub fn spawn_cluster_sync(
    lb_ref: ActorRef<LbCoordinator>,
    etcd_client: Arc<RwLock<Client>>,
    config: &LbConfig,
) -> tokio::task::JoinHandle<()> {
    let manager = ClusterSyncManager::new(lb_ref, etcd_client, config);
    tokio::spawn(async move {
        if let Err(e) = manager.run().await {
            error!(error = %e, "ClusterSyncManager failed");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cluster_accepts_full_spec() {
        let json = r#"{
            "name": "web",
            "load_assignment": {
                "endpoints": [
                    {"lb_endpoints": [{"address": {"host": "10.0.0.1", "port": 80}}]}
                ]
            }
        }"#;
        let cluster = parse_cluster(json).unwrap();
        assert_eq!(cluster.name, "web");
        assert_eq!(cluster.endpoint_count(), 1);
    }

    #[test]
    fn test_parse_cluster_rejects_malformed_json() {
        assert!(parse_cluster("{not json").is_err());
        assert!(parse_cluster(r#"{"load_assignment": {}}"#).is_err());
    }
}
