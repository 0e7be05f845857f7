//! Lookup-table publication
//!
//! Published tables live in a two-level map so a cluster's table can be
//! replaced without disturbing readers of other clusters: an outer map keyed
//! by fixed-width cluster name whose values are handles to single-entry
//! inner tables, each holding one full backend vector as a blob.
//!
//! [`TableStore`] abstracts the backing store. The kernel-side store (a
//! pinned eBPF map-in-map, feature `ebpf`) is the production implementation;
//! [`MemoryTableStore`] backs tests and standalone runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Name under which the outer map is pinned by the kernel-side loader.
pub const MAGLEV_OUTER_MAP_NAME: &str = "outer_of_maglev";
/// Name given to each inner table created for a publish.
pub const MAGLEV_INNER_MAP_NAME: &str = "inner_of_maglev";
/// Maximum number of distinct cluster entries in the outer map.
pub const MAGLEV_MAP_MAX_ENTRIES: usize = 65536;
/// Fixed width of the outer-map key.
pub const CLUSTER_NAME_MAX_LEN: usize = 192;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("outer maglev map not initialized")]
    Uninitialized,
    #[error("creating inner table: {0}")]
    InnerCreate(String),
    #[error("writing backend vector: {0}")]
    InnerUpdate(String),
    #[error("updating outer map entry: {0}")]
    OuterUpdate(String),
}

/// Fixed-width outer-map key.
///
/// The cluster name is copied in from offset 0, zero-padded on the right and
/// truncated at [`CLUSTER_NAME_MAX_LEN`] bytes. Truncation is byte-exact, so
/// publishing the same cluster twice always lands on the same key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OuterKey([u8; CLUSTER_NAME_MAX_LEN]);

impl OuterKey {
    pub fn for_cluster(name: &str) -> Self {
        let mut key = [0u8; CLUSTER_NAME_MAX_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(CLUSTER_NAME_MAX_LEN);
        key[..len].copy_from_slice(&bytes[..len]);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; CLUSTER_NAME_MAX_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for OuterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(self.0.len());
        write!(f, "OuterKey({:?})", String::from_utf8_lossy(&self.0[..end]))
    }
}

/// Opaque handle to an inner table held open by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerHandle(pub(crate) u32);

/// Backing store for the two-level table map.
///
/// Implementations must tolerate concurrent calls for distinct outer keys.
pub trait TableStore: Send + Sync {
    /// Allocate a fresh inner table sized for `table_size` u32 slots.
    fn create_inner(&self, table_size: u64) -> Result<InnerHandle, PublishError>;

    /// Write the full backend vector into the inner table at entry 0.
    fn write_inner(&self, handle: InnerHandle, backends: &[u32]) -> Result<(), PublishError>;

    /// Point the outer entry for `key` at the inner table, replacing any
    /// previous entry. The store drops its reference to the replaced inner
    /// table once the swap is in effect.
    fn set_outer(&self, key: &OuterKey, handle: InnerHandle) -> Result<(), PublishError>;

    /// Release the caller's handle. After a successful [`set_outer`] the
    /// table stays reachable through the outer map; on error paths this
    /// frees the orphaned inner table.
    ///
    /// [`set_outer`]: TableStore::set_outer
    fn release_inner(&self, handle: InnerHandle);
}

/// Publishes finalized lookup tables into a [`TableStore`].
#[derive(Clone)]
pub struct TablePublisher {
    store: Arc<dyn TableStore>,
    table_size: u64,
}

impl TablePublisher {
    pub fn new(store: Arc<dyn TableStore>, table_size: u64) -> Self {
        Self { store, table_size }
    }

    /// Replace the published table for `cluster_name`.
    ///
    /// Readers of the cluster observe either the previous table or the new
    /// one, never a partial write: the vector lands in a fresh inner table
    /// that only becomes visible through the outer-map swap. No retries are
    /// attempted; on error the previous table remains in effect.
    pub fn publish(&self, cluster_name: &str, backends: &[u32]) -> Result<(), PublishError> {
        if backends.len() as u64 != self.table_size {
            return Err(PublishError::InnerUpdate(format!(
                "backend vector holds {} slots, table size is {}",
                backends.len(),
                self.table_size
            )));
        }

        let inner = self.store.create_inner(self.table_size)?;
        if let Err(e) = self.store.write_inner(inner, backends) {
            self.store.release_inner(inner);
            return Err(e);
        }

        let key = OuterKey::for_cluster(cluster_name);
        if let Err(e) = self.store.set_outer(&key, inner) {
            self.store.release_inner(inner);
            return Err(e);
        }

        // The outer map now owns the table; drop our handle.
        self.store.release_inner(inner);
        Ok(())
    }

    pub fn table_size(&self) -> u64 {
        self.table_size
    }
}

/// In-memory [`TableStore`] used by tests and standalone (non-eBPF) runs.
pub struct MemoryTableStore {
    next_handle: AtomicU32,
    /// Inner tables created but not yet linked into the outer map.
    open: Mutex<HashMap<u32, Vec<u32>>>,
    outer: Mutex<HashMap<OuterKey, Vec<u32>>>,
    max_entries: usize,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::with_max_entries(MAGLEV_MAP_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            next_handle: AtomicU32::new(1),
            open: Mutex::new(HashMap::new()),
            outer: Mutex::new(HashMap::new()),
            max_entries,
        }
    }

    /// The published table for `cluster_name`, if any.
    pub fn lookup(&self, cluster_name: &str) -> Option<Vec<u32>> {
        let key = OuterKey::for_cluster(cluster_name);
        self.outer.lock().unwrap().get(&key).cloned()
    }

    /// Number of clusters with a published table.
    pub fn cluster_count(&self) -> usize {
        self.outer.lock().unwrap().len()
    }

    /// Number of inner tables created but not yet linked or released.
    pub fn open_inner_count(&self) -> usize {
        self.open.lock().unwrap().len()
    }
}

impl Default for MemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore for MemoryTableStore {
    fn create_inner(&self, table_size: u64) -> Result<InnerHandle, PublishError> {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.open
            .lock()
            .unwrap()
            .insert(id, vec![0u32; table_size as usize]);
        Ok(InnerHandle(id))
    }

    fn write_inner(&self, handle: InnerHandle, backends: &[u32]) -> Result<(), PublishError> {
        let mut open = self.open.lock().unwrap();
        let table = open
            .get_mut(&handle.0)
            .ok_or_else(|| PublishError::InnerUpdate(format!("unknown inner handle {}", handle.0)))?;
        if table.len() != backends.len() {
            return Err(PublishError::InnerUpdate(format!(
                "value size mismatch: inner table holds {} slots, got {}",
                table.len(),
                backends.len()
            )));
        }
        table.copy_from_slice(backends);
        Ok(())
    }

    fn set_outer(&self, key: &OuterKey, handle: InnerHandle) -> Result<(), PublishError> {
        let table = self
            .open
            .lock()
            .unwrap()
            .remove(&handle.0)
            .ok_or_else(|| PublishError::OuterUpdate(format!("unknown inner handle {}", handle.0)))?;

        let mut outer = self.outer.lock().unwrap();
        if !outer.contains_key(key) && outer.len() >= self.max_entries {
            return Err(PublishError::OuterUpdate(format!(
                "outer map full ({} entries)",
                self.max_entries
            )));
        }
        // Replace-or-insert; the previous table (if any) drops here.
        outer.insert(*key, table);
        Ok(())
    }

    fn release_inner(&self, handle: InnerHandle) {
        self.open.lock().unwrap().remove(&handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_key_is_zero_padded() {
        let key = OuterKey::for_cluster("c1");
        assert_eq!(&key.as_bytes()[..2], b"c1");
        assert!(key.as_bytes()[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_outer_key_truncates_long_names_identically() {
        let long = format!("a{}", "x".repeat(200));
        let short = format!("a{}", "x".repeat(192));
        assert_eq!(
            OuterKey::for_cluster(&long),
            OuterKey::for_cluster(&short)
        );
    }

    #[test]
    fn test_publish_stores_the_vector() {
        let store = Arc::new(MemoryTableStore::new());
        let publisher = TablePublisher::new(store.clone(), 5);

        publisher.publish("c1", &[0, 1, 0, 1, 0]).unwrap();

        assert_eq!(store.lookup("c1"), Some(vec![0, 1, 0, 1, 0]));
        assert_eq!(store.cluster_count(), 1);
        assert_eq!(store.open_inner_count(), 0, "handle leaked");
    }

    #[test]
    fn test_republish_replaces_previous_table() {
        let store = Arc::new(MemoryTableStore::new());
        let publisher = TablePublisher::new(store.clone(), 3);

        publisher.publish("c1", &[0, 0, 0]).unwrap();
        publisher.publish("c1", &[1, 1, 1]).unwrap();

        assert_eq!(store.lookup("c1"), Some(vec![1, 1, 1]));
        assert_eq!(store.cluster_count(), 1);
        assert_eq!(store.open_inner_count(), 0);
    }

    #[test]
    fn test_colliding_truncated_names_share_one_entry() {
        let store = Arc::new(MemoryTableStore::new());
        let publisher = TablePublisher::new(store.clone(), 2);

        let long = format!("a{}", "x".repeat(200));
        let short = format!("a{}", "x".repeat(192));
        publisher.publish(&long, &[0, 0]).unwrap();
        publisher.publish(&short, &[1, 1]).unwrap();

        assert_eq!(store.cluster_count(), 1);
        assert_eq!(store.lookup(&long), Some(vec![1, 1]));
    }

    #[test]
    fn test_wrong_vector_length_is_rejected_without_side_effects() {
        let store = Arc::new(MemoryTableStore::new());
        let publisher = TablePublisher::new(store.clone(), 4);

        let err = publisher.publish("c1", &[0, 1]).unwrap_err();
        assert!(matches!(err, PublishError::InnerUpdate(_)));
        assert_eq!(store.cluster_count(), 0);
        assert_eq!(store.open_inner_count(), 0);
    }

    #[test]
    fn test_outer_map_capacity_is_enforced() {
        let store = Arc::new(MemoryTableStore::with_max_entries(2));
        let publisher = TablePublisher::new(store.clone(), 1);

        publisher.publish("c1", &[0]).unwrap();
        publisher.publish("c2", &[0]).unwrap();
        let err = publisher.publish("c3", &[0]).unwrap_err();
        assert!(matches!(err, PublishError::OuterUpdate(_)));

        // Replacing an existing entry still works at capacity.
        publisher.publish("c1", &[0]).unwrap();
        assert_eq!(store.cluster_count(), 2);
        assert_eq!(store.open_inner_count(), 0);
    }
}
