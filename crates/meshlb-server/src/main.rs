//! Meshlb Server - Maglev LB Table Daemon

use meshlb_server::api;
use meshlb_server::config::LbConfig;
use meshlb_server::lb::{self, LbCoordinator, LbDirector, MaglevState, TablePublisher, TableStore};
use meshlb_server::observability::{self, TracingConfig};
use meshlb_server::sync;
use meshlb_server::version;
use kameo::Actor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    observability::init_tracing(TracingConfig::from_env())?;

    info!(version = %version::full_version(), "Starting meshlb-server");

    let config = LbConfig::from_env();
    info!(
        table_size = config.table_size,
        admin_addr = %config.admin_addr,
        etcd_sync = config.etcd_sync_enabled(),
        "Loaded configuration"
    );

    let node_id = std::env::var("NODE_ID")
        .unwrap_or_else(|_| format!("meshlb-node-{}", uuid::Uuid::new_v4()));
    info!("Node ID: {}", node_id);

    let metrics_state = match observability::init_metrics() {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(error = %e, "Failed to initialize metrics, /metrics disabled");
            None
        }
    };

    // LB subsystem: table store, immutable maglev parameters, director, actor.
    let store = build_store(&config)?;
    let state = MaglevState::new(config.table_size)?;
    let publisher = TablePublisher::new(store, config.table_size);
    let director = Arc::new(LbDirector::new(state, publisher));
    let lb_ref = LbCoordinator::spawn(LbCoordinator::new(director));

    // Cluster ingestion from etcd, when configured.
    let etcd_client = if config.etcd_sync_enabled() {
        info!(endpoints = ?config.etcd_endpoints, "Connecting to etcd");
        match sync::connect(&config.etcd_endpoints, &config).await {
            Ok(client) => {
                let client = Arc::new(RwLock::new(client));
                sync::spawn_cluster_sync(lb_ref.clone(), client.clone(), &config);
                Some(client)
            }
            Err(e) => {
                warn!(error = %e, "etcd unavailable, continuing with the admin API only");
                None
            }
        }
    } else {
        info!("etcd sync disabled, clusters accepted via the admin API only");
        None
    };

    let readiness = Arc::new(AtomicBool::new(false));
    let app_state = api::AppState {
        lb_ref,
        etcd_client,
        metrics_state,
        readiness: readiness.clone(),
        node_id,
    };
    let app = api::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.admin_addr).await?;
    readiness.store(true, Ordering::Release);
    info!("Admin API listening on {}", config.admin_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    observability::shutdown_tracing();
    info!("meshlb-server stopped");

    Ok(())
}

/// Select the table store: the pinned kernel map when built with `ebpf`,
/// otherwise the in-memory store.
fn build_store(config: &LbConfig) -> Result<Arc<dyn TableStore>, lb::LbError> {
    #[cfg(feature = "ebpf")]
    {
        let store = lb::ebpf::PinnedMapStore::open(&config.bpf_pin_path)?;
        info!(path = %config.bpf_pin_path, "Attached to pinned outer maglev map");
        Ok(Arc::new(store))
    }
    #[cfg(not(feature = "ebpf"))]
    {
        info!("eBPF support not compiled in, using the in-memory table store");
        Ok(Arc::new(lb::MemoryTableStore::new()))
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
