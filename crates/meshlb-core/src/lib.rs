//! Core shared types for meshlb
//!
//! This crate contains the cluster model exchanged between the control-plane
//! ingestion paths and the load-balancer subsystem of the meshlb daemon.

mod cluster;

pub use cluster::{Address, Cluster, Endpoint, Locality, LocalityEndpoints, LoadAssignment};
