//! Load-Balancer Table Module
//!
//! Builds Maglev consistent-hash lookup tables from cluster specifications
//! and publishes them for the kernel-side packet classifier.
//!
//! ## Architecture
//!
//! ```text
//! cluster spec (etcd watch / admin API)
//!        ↓
//! LbCoordinator (actor)
//!        ↓
//! LbDirector.build_and_publish()
//!    ├── flatten localities → canonical addresses
//!    ├── MaglevState.backend()        (MurmurHash3 → offset/skip)
//!    ├── build_lookup_table()         (Maglev population)
//!    └── TablePublisher.publish()     (two-level map swap)
//!               ↓
//!        TableStore (eBPF map-in-map, or in-memory)
//! ```
//!
//! This module contains:
//! - `hash`: 128-bit MurmurHash3 and seed derivation
//! - `maglev`: permutation seeding and table population
//! - `publisher`: the two-level publication contract and the memory store
//! - `ebpf`: the kernel-backed store (feature `ebpf`)
//! - `director`: per-cluster build orchestration
//! - `actor` / `messages`: the coordinator actor and its message types

pub mod actor;
pub mod director;
#[cfg(feature = "ebpf")]
pub mod ebpf;
pub mod hash;
pub mod maglev;
pub mod messages;
pub mod publisher;

use thiserror::Error;

pub use actor::LbCoordinator;
pub use director::{BuildOutcome, LbDirector};
pub use maglev::{MaglevState, DEFAULT_TABLE_SIZE};
pub use messages::{ApplyCluster, ApplyOutcome, ApplyStatus, GetClusterDump, GetLbStats};
pub use publisher::{MemoryTableStore, PublishError, TablePublisher, TableStore};

/// Errors raised by the load-balancer subsystem.
#[derive(Debug, Error)]
pub enum LbError {
    /// The embedded hash seed is not valid base64. Fatal at startup.
    #[error("hash seed is not valid base64: {0}")]
    SeedFormat(#[from] base64::DecodeError),
    /// The decoded hash seed has the wrong length. Fatal at startup.
    #[error("decoded hash seed is {0} bytes (not 12 bytes)")]
    SeedLength(usize),
    /// A non-prime table size would break the slot permutation.
    #[error("table size {0} is not prime")]
    TableSizeNotPrime(u64),
    /// The cluster object cannot be processed.
    #[error("cluster rejected: {0}")]
    InvalidCluster(&'static str),
    /// The backing table store cannot be located. Fatal at startup.
    #[error("outer maglev map unavailable: {0}")]
    OuterMapUnavailable(String),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl LbError {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LbError::SeedFormat(_) | LbError::SeedLength(_) => "seed_format",
            LbError::TableSizeNotPrime(_) => "table_size",
            LbError::InvalidCluster(_) => "invalid_cluster",
            LbError::OuterMapUnavailable(_) => "outer_map_unavailable",
            LbError::Publish(e) => e.kind(),
        }
    }
}

impl PublishError {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::Uninitialized => "uninitialized",
            PublishError::InnerCreate(_) => "inner_create",
            PublishError::InnerUpdate(_) => "inner_update",
            PublishError::OuterUpdate(_) => "outer_update",
        }
    }
}
