//! Application State
//!
//! Shared state passed to all API handlers.

use crate::lb::LbCoordinator;
use crate::observability::MetricsState;
use etcd_client::Client;
use kameo::actor::ActorRef;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub lb_ref: ActorRef<LbCoordinator>,
    /// Present only when etcd sync is enabled.
    pub etcd_client: Option<Arc<RwLock<Client>>>,
    pub metrics_state: Option<MetricsState>,
    pub readiness: Arc<AtomicBool>,
    pub node_id: String,
}
