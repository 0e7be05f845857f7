//! Cluster Sync Module
//!
//! Feeds already-decoded cluster specifications into the LbCoordinator.
//! Cluster specs are JSON documents stored under an etcd prefix; the manager
//! applies everything present at startup and then follows the watch stream.
//!
//! ```text
//! etcd watch event (PUT)
//!        ↓
//! ClusterSyncManager
//!        ↓ decode JSON → Cluster
//! LbCoordinator.ask(ApplyCluster)
//! ```
//!
//! The admin API (`POST /clusters`) is the second, etcd-free ingestion path.

mod etcd;
mod manager;

pub use etcd::connect;
pub use manager::{spawn_cluster_sync, ClusterSyncManager};
