//! Per-cluster build orchestration
//!
//! The director turns a cluster specification into a published lookup table:
//! flatten the locality groups, seed a backend record per endpoint, run the
//! Maglev population loop, hand the result to the publisher.

use meshlb_core::Cluster;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::maglev::{self, MaglevState};
use super::publisher::TablePublisher;
use super::LbError;

/// What a successful apply did.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// A table was built and published.
    Published(PublishedTable),
    /// The cluster has no endpoints. Valid but unroutable; whatever was
    /// published before stays in effect.
    SkippedEmpty,
}

/// Summary of a published table.
#[derive(Debug, Clone)]
pub struct PublishedTable {
    pub backend_count: usize,
    /// Slots owned by each backend, indexed by position in the flattened
    /// endpoint list.
    pub slot_counts: Vec<usize>,
}

/// Builds and publishes lookup tables, one cluster at a time per name.
///
/// Builds for distinct clusters may run concurrently; builds for the same
/// cluster are serialized through a per-name lock so a slow publish cannot
/// interleave with a newer one.
pub struct LbDirector {
    state: MaglevState,
    publisher: TablePublisher,
    builds: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LbDirector {
    pub fn new(state: MaglevState, publisher: TablePublisher) -> Self {
        Self {
            state,
            publisher,
            builds: Mutex::new(HashMap::new()),
        }
    }

    pub fn table_size(&self) -> u64 {
        self.state.table_size()
    }

    /// Build the Maglev table for `cluster` and publish it under the
    /// cluster's name.
    ///
    /// Endpoints are flattened across localities in encounter order, with no
    /// deduplication and no weighting. The hash input for each endpoint is
    /// its canonical address string.
    pub async fn build_and_publish(&self, cluster: &Cluster) -> Result<BuildOutcome, LbError> {
        if cluster.name.is_empty() {
            return Err(LbError::InvalidCluster("cluster name is empty"));
        }

        let per_name = {
            let mut builds = self.builds.lock().await;
            builds.entry(cluster.name.clone()).or_default().clone()
        };
        let _serialized = per_name.lock().await;

        let addresses: Vec<String> = cluster
            .iter_endpoints()
            .map(|ep| ep.address.canonical())
            .collect();

        let mut backends: Vec<_> = addresses
            .iter()
            .enumerate()
            .map(|(i, addr)| self.state.backend(i as u32, addr))
            .collect();

        let Some(table) = maglev::build_lookup_table(&mut backends, self.state.table_size())
        else {
            debug!(
                cluster = %cluster.name,
                "cluster has no endpoints, previous table (if any) stays published"
            );
            return Ok(BuildOutcome::SkippedEmpty);
        };

        self.publisher.publish(&cluster.name, &table)?;

        let mut slot_counts = vec![0usize; addresses.len()];
        for &slot in &table {
            slot_counts[slot as usize] += 1;
        }

        Ok(BuildOutcome::Published(PublishedTable {
            backend_count: addresses.len(),
            slot_counts,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lb::publisher::MemoryTableStore;
    use meshlb_core::{Address, Endpoint, LoadAssignment, Locality, LocalityEndpoints};

    const TEST_TABLE_SIZE: u64 = 16381;

    fn cluster(name: &str, addrs: &[(&str, u16)]) -> Cluster {
        Cluster {
            name: name.to_string(),
            load_assignment: LoadAssignment {
                endpoints: vec![LocalityEndpoints {
                    locality: None,
                    lb_endpoints: addrs
                        .iter()
                        .map(|&(host, port)| Endpoint {
                            address: Address::new(host, port),
                        })
                        .collect(),
                }],
            },
        }
    }

    fn director_with_store() -> (LbDirector, Arc<MemoryTableStore>) {
        let store = Arc::new(MemoryTableStore::new());
        let state = MaglevState::new(TEST_TABLE_SIZE).unwrap();
        let publisher = TablePublisher::new(store.clone(), TEST_TABLE_SIZE);
        (LbDirector::new(state, publisher), store)
    }

    #[tokio::test]
    async fn test_single_endpoint_cluster_publishes_all_zero_table() {
        let (director, store) = director_with_store();
        let outcome = director
            .build_and_publish(&cluster("c1", &[("10.0.0.1", 80)]))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            BuildOutcome::Published(PublishedTable {
                backend_count: 1,
                ..
            })
        ));
        let table = store.lookup("c1").unwrap();
        assert_eq!(table.len() as u64, TEST_TABLE_SIZE);
        assert!(table.iter().all(|&slot| slot == 0));
    }

    #[tokio::test]
    async fn test_two_endpoints_share_the_table() {
        let (director, store) = director_with_store();
        director
            .build_and_publish(&cluster("c2", &[("10.0.0.1", 80), ("10.0.0.2", 80)]))
            .await
            .unwrap();

        let table = store.lookup("c2").unwrap();
        let zeros = table.iter().filter(|&&s| s == 0).count();
        let ones = table.iter().filter(|&&s| s == 1).count();
        assert_eq!(zeros + ones, TEST_TABLE_SIZE as usize);
        assert!(zeros.abs_diff(ones) <= 1);
    }

    #[tokio::test]
    async fn test_empty_cluster_is_ok_and_publishes_nothing() {
        let (director, store) = director_with_store();
        let outcome = director
            .build_and_publish(&cluster("c3", &[]))
            .await
            .unwrap();

        assert!(matches!(outcome, BuildOutcome::SkippedEmpty));
        assert!(store.lookup("c3").is_none());
        assert_eq!(store.cluster_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let (director, _store) = director_with_store();
        let err = director
            .build_and_publish(&cluster("", &[("10.0.0.1", 80)]))
            .await
            .unwrap_err();
        assert!(matches!(err, LbError::InvalidCluster(_)));
    }

    #[tokio::test]
    async fn test_rebuild_publishes_identical_bytes() {
        let (director, store) = director_with_store();
        let spec = cluster("c6", &[("10.0.0.1", 80), ("10.0.0.2", 80), ("10.0.0.3", 80)]);

        director.build_and_publish(&spec).await.unwrap();
        let first = store.lookup("c6").unwrap();
        director.build_and_publish(&spec).await.unwrap();
        let second = store.lookup("c6").unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_localities_flatten_in_encounter_order() {
        let (director, store) = director_with_store();
        let spec = Cluster {
            name: "multi".to_string(),
            load_assignment: LoadAssignment {
                endpoints: vec![
                    LocalityEndpoints {
                        locality: Some(Locality {
                            region: "r1".to_string(),
                            zone: "a".to_string(),
                        }),
                        lb_endpoints: vec![
                            Endpoint {
                                address: Address::new("10.0.0.1", 80),
                            },
                            Endpoint {
                                address: Address::new("10.0.0.2", 80),
                            },
                        ],
                    },
                    LocalityEndpoints {
                        locality: Some(Locality {
                            region: "r2".to_string(),
                            zone: "b".to_string(),
                        }),
                        lb_endpoints: vec![Endpoint {
                            address: Address::new("10.0.0.3", 80),
                        }],
                    },
                ],
            },
        };

        let outcome = director.build_and_publish(&spec).await.unwrap();
        let BuildOutcome::Published(info) = outcome else {
            panic!("expected a published table");
        };
        assert_eq!(info.backend_count, 3);
        assert_eq!(info.slot_counts.iter().sum::<usize>(), TEST_TABLE_SIZE as usize);

        // The flattened single-locality equivalent must hash identically.
        let flat = cluster(
            "flat",
            &[("10.0.0.1", 80), ("10.0.0.2", 80), ("10.0.0.3", 80)],
        );
        director.build_and_publish(&flat).await.unwrap();
        assert_eq!(store.lookup("multi"), store.lookup("flat"));
    }

    #[tokio::test]
    async fn test_publish_failure_surfaces_and_keeps_previous_state() {
        let store = Arc::new(MemoryTableStore::with_max_entries(1));
        let state = MaglevState::new(TEST_TABLE_SIZE).unwrap();
        let publisher = TablePublisher::new(store.clone(), TEST_TABLE_SIZE);
        let director = LbDirector::new(state, publisher);

        director
            .build_and_publish(&cluster("first", &[("10.0.0.1", 80)]))
            .await
            .unwrap();

        let err = director
            .build_and_publish(&cluster("second", &[("10.0.0.2", 80)]))
            .await
            .unwrap_err();
        assert!(matches!(err, LbError::Publish(_)));

        assert!(store.lookup("first").is_some());
        assert!(store.lookup("second").is_none());
        assert_eq!(store.open_inner_count(), 0);
    }
}
