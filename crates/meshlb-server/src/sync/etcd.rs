//! Etcd Connection
//!
//! Connects to etcd with exponential backoff so a daemon started before its
//! etcd peers still comes up.

use anyhow::{anyhow, Result};
use backoff::{future::retry, ExponentialBackoff};
use etcd_client::Client;
use tracing::{debug, warn};

use crate::config::LbConfig;

/// Connect to etcd, retrying with exponential backoff per the config.
pub async fn connect(endpoints: &[String], config: &LbConfig) -> Result<Client> {
    let backoff = ExponentialBackoff {
        initial_interval: config.etcd_backoff_initial,
        max_interval: config.etcd_backoff_max,
        max_elapsed_time: Some(config.etcd_backoff_max_elapsed),
        multiplier: config.etcd_backoff_multiplier,
        ..Default::default()
    };

    retry(backoff, || async {
        match Client::connect(endpoints, None).await {
            Ok(client) => {
                debug!("Connected to etcd");
                Ok(client)
            }
            Err(e) => {
                warn!(error = %e, "etcd connection failed, retrying");
                Err(backoff::Error::transient(e))
            }
        }
    })
    .await
    .map_err(|e| anyhow!("Failed to connect to etcd after retries: {:?}", e))
}
