//! Daemon Configuration
//!
//! Centralized configuration with environment variable overrides. Values not
//! overridden fall back to defaults suitable for a standalone run.

use std::time::Duration;

use crate::lb::publisher::MAGLEV_OUTER_MAP_NAME;
use crate::lb::DEFAULT_TABLE_SIZE;

/// Daemon configuration with sensible defaults
#[derive(Debug, Clone)]
pub struct LbConfig {
    /// Maglev lookup-table size. Must be prime (env: MESHLB_TABLE_SIZE)
    pub table_size: u64,

    /// Admin API bind address (env: MESHLB_ADMIN_ADDR)
    pub admin_addr: String,

    /// Etcd endpoints, comma-separated; empty disables etcd sync
    /// (env: ETCD_ENDPOINTS)
    pub etcd_endpoints: Vec<String>,

    /// Etcd key prefix holding cluster specs (env: MESHLB_CLUSTER_PREFIX)
    pub cluster_prefix: String,

    /// Pin path of the outer maglev map, used with the `ebpf` feature
    /// (env: MESHLB_BPF_PIN_PATH)
    pub bpf_pin_path: String,

    /// Delay before reconnecting after a watch stream failure
    pub reconnect_delay: Duration,

    // Etcd backoff settings
    /// Initial interval for etcd connection retry
    pub etcd_backoff_initial: Duration,

    /// Maximum interval for etcd connection retry
    pub etcd_backoff_max: Duration,

    /// Maximum elapsed time for etcd connection retries
    pub etcd_backoff_max_elapsed: Duration,

    /// Multiplier for etcd backoff
    pub etcd_backoff_multiplier: f64,
}

impl Default for LbConfig {
    fn default() -> Self {
        Self {
            table_size: DEFAULT_TABLE_SIZE,
            admin_addr: "127.0.0.1:15200".to_string(),
            etcd_endpoints: vec!["http://127.0.0.1:2379".to_string()],
            cluster_prefix: "/meshlb/clusters/".to_string(),
            bpf_pin_path: format!("/sys/fs/bpf/{MAGLEV_OUTER_MAP_NAME}"),
            reconnect_delay: Duration::from_secs(1),
            etcd_backoff_initial: Duration::from_secs(1),
            etcd_backoff_max: Duration::from_secs(10),
            etcd_backoff_max_elapsed: Duration::from_secs(60),
            etcd_backoff_multiplier: 2.0,
        }
    }
}

impl LbConfig {
    /// Create configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("MESHLB_TABLE_SIZE") {
            if let Ok(parsed) = size.parse::<u64>() {
                config.table_size = parsed;
            }
        }

        if let Ok(addr) = std::env::var("MESHLB_ADMIN_ADDR") {
            config.admin_addr = addr;
        }

        if let Ok(endpoints) = std::env::var("ETCD_ENDPOINTS") {
            config.etcd_endpoints = endpoints
                .split(',')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Ok(prefix) = std::env::var("MESHLB_CLUSTER_PREFIX") {
            config.cluster_prefix = prefix;
        }

        if let Ok(path) = std::env::var("MESHLB_BPF_PIN_PATH") {
            config.bpf_pin_path = path;
        }

        config
    }

    /// Whether the etcd sync path is enabled.
    pub fn etcd_sync_enabled(&self) -> bool {
        !self.etcd_endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LbConfig::default();
        assert_eq!(config.table_size, DEFAULT_TABLE_SIZE);
        assert_eq!(config.cluster_prefix, "/meshlb/clusters/");
        assert!(config.etcd_sync_enabled());
    }

    #[test]
    fn test_empty_endpoints_disable_sync() {
        let config = LbConfig {
            etcd_endpoints: vec![],
            ..Default::default()
        };
        assert!(!config.etcd_sync_enabled());
    }
}
