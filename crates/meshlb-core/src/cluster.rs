//! Cluster model
//!
//! An already-decoded cluster specification: a named group of equivalent
//! backend endpoints, grouped by locality. The daemon receives these from
//! its ingestion paths (etcd watch, admin API) and never mutates them.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A named group of backend endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster name. Non-empty; used as the key under which the lookup
    /// table is published.
    pub name: String,
    /// Endpoint assignment, grouped by locality.
    #[serde(default)]
    pub load_assignment: LoadAssignment,
}

/// Endpoint groups of a cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadAssignment {
    /// Locality groups in control-plane order.
    #[serde(default)]
    pub endpoints: Vec<LocalityEndpoints>,
}

/// Endpoints belonging to one locality.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalityEndpoints {
    /// Where these endpoints run. Informational only; localities are
    /// flattened before table building.
    #[serde(default)]
    pub locality: Option<Locality>,
    /// Endpoints in control-plane order.
    #[serde(default)]
    pub lb_endpoints: Vec<Endpoint>,
}

/// Physical location of an endpoint group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Locality {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub zone: String,
}

/// A single backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: Address,
}

/// A network address in host/port form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// IP address or hostname.
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Canonical string rendering of this address.
    ///
    /// This is the exact byte sequence the permutation hash is taken over,
    /// so it must be stable across hosts and releases:
    /// - IPv4: `ip:port`
    /// - IPv6: `[ip]:port`, lowercased and compressed per the standard
    ///   library's `Ipv6Addr` display
    /// - hostname: `host:port`, host lowercased
    pub fn canonical(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => format!("{}:{}", v4, self.port),
            Ok(IpAddr::V6(v6)) => format!("[{}]:{}", v6, self.port),
            Err(_) => format!("{}:{}", self.host.to_ascii_lowercase(), self.port),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl Cluster {
    /// Iterate endpoints across all localities in encounter order
    /// (locality order, then endpoint order within each locality).
    pub fn iter_endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.load_assignment
            .endpoints
            .iter()
            .flat_map(|group| group.lb_endpoints.iter())
    }

    /// Total endpoint count across all localities.
    pub fn endpoint_count(&self) -> usize {
        self.load_assignment
            .endpoints
            .iter()
            .map(|group| group.lb_endpoints.len())
            .sum()
    }
}
