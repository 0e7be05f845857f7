//! Maglev lookup-table construction
//!
//! Based on Google's Maglev paper: each backend owns a permutation of the
//! table slots derived from `(offset, skip)`, and backends claim slots in
//! round-robin order until the table is full. The table size is prime so
//! that every `skip` is coprime with it and each permutation visits every
//! slot exactly once.
//!
//! Reference: https://research.google/pubs/pub44824/

use super::hash::{self, DEFAULT_HASH_SEED};
use super::LbError;

/// Default lookup-table size. Prime; see [`MaglevState::new`].
pub const DEFAULT_TABLE_SIZE: u64 = 16381;

/// Immutable subsystem parameters: table size and hash seed.
///
/// Built once at daemon startup and shared read-only; tests construct their
/// own instance.
#[derive(Debug, Clone, Copy)]
pub struct MaglevState {
    table_size: u64,
    seed: u32,
}

impl MaglevState {
    /// Create the subsystem state for the given table size.
    ///
    /// The size must be prime: the slot permutation `(offset + skip·k) mod M`
    /// only covers all of `[0, M)` when `gcd(skip, M) = 1`, which a prime
    /// `M` guarantees for every `skip` in `[1, M)`.
    pub fn new(table_size: u64) -> Result<Self, LbError> {
        if !is_prime(table_size) {
            return Err(LbError::TableSizeNotPrime(table_size));
        }
        let seed = hash::decode_seed(DEFAULT_HASH_SEED)?;
        Ok(Self { table_size, seed })
    }

    pub fn table_size(&self) -> u64 {
        self.table_size
    }

    /// Derive a backend's permutation parameters from its canonical address.
    pub fn offset_and_skip(&self, address: &str) -> (u64, u64) {
        let (h1, h2) = hash::hash128(address.as_bytes(), self.seed);
        let offset = h1 % self.table_size;
        let skip = (h2 % (self.table_size - 1)) + 1;
        (offset, skip)
    }

    /// Build a [`Backend`] record for the endpoint at `index`.
    pub fn backend(&self, index: u32, address: &str) -> Backend {
        let (offset, skip) = self.offset_and_skip(address);
        Backend {
            index,
            offset,
            skip,
            next: 0,
        }
    }
}

/// Per-backend population state. Lives for the duration of one table build.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Position in the flattened endpoint list; the value written into
    /// claimed slots.
    index: u32,
    offset: u64,
    skip: u64,
    /// Position in this backend's slot permutation.
    next: u64,
}

impl Backend {
    /// The slot this backend prefers at its current permutation position.
    fn permutation(&self, table_size: u64) -> u64 {
        // u128 keeps skip * next exact for table sizes near u32::MAX.
        ((self.offset as u128 + self.skip as u128 * self.next as u128) % table_size as u128) as u64
    }
}

/// Populate a Maglev lookup table.
///
/// Returns `None` when `backends` is empty; otherwise a vector of exactly
/// `table_size` backend indices, each in `[0, backends.len())`. Backends
/// claim slots in input order, one slot per round, skipping slots already
/// claimed; `next` advances in place so each backend resumes its permutation
/// where it left off.
pub fn build_lookup_table(backends: &mut [Backend], table_size: u64) -> Option<Vec<u32>> {
    if backends.is_empty() {
        return None;
    }

    let n = backends.len();
    let mut table: Vec<Option<u32>> = vec![None; table_size as usize];

    for round in 0..table_size {
        let b = &mut backends[round as usize % n];
        let mut c = b.permutation(table_size);
        while table[c as usize].is_some() {
            b.next += 1;
            c = b.permutation(table_size);
        }
        table[c as usize] = Some(b.index);
        b.next += 1;
    }

    let filled: Vec<u32> = table.into_iter().flatten().collect();
    debug_assert_eq!(filled.len() as u64, table_size);
    Some(filled)
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> MaglevState {
        MaglevState::new(DEFAULT_TABLE_SIZE).unwrap()
    }

    fn build(addresses: &[&str]) -> Vec<u32> {
        let st = state();
        let mut backends: Vec<Backend> = addresses
            .iter()
            .enumerate()
            .map(|(i, addr)| st.backend(i as u32, addr))
            .collect();
        build_lookup_table(&mut backends, st.table_size()).unwrap()
    }

    #[test]
    fn test_rejects_non_prime_table_size() {
        assert!(matches!(
            MaglevState::new(16380),
            Err(LbError::TableSizeNotPrime(16380))
        ));
        assert!(MaglevState::new(16381).is_ok());
    }

    #[test]
    fn test_skip_is_within_bounds() {
        let st = state();
        for i in 0..100 {
            let (offset, skip) = st.offset_and_skip(&format!("10.0.{}.1:80", i));
            assert!(offset < st.table_size());
            assert!((1..st.table_size()).contains(&skip));
        }
    }

    #[test]
    fn test_permutation_visits_every_slot_once() {
        // Small prime keeps this exhaustive: every (offset, skip) pair must
        // walk all 13 slots without repeats.
        let small: u64 = 13;
        for offset in 0..small {
            for skip in 1..small {
                let mut seen = vec![false; small as usize];
                for next in 0..small {
                    let b = Backend {
                        index: 0,
                        offset,
                        skip,
                        next,
                    };
                    let c = b.permutation(small) as usize;
                    assert!(!seen[c], "offset={offset} skip={skip}: slot {c} repeated");
                    seen[c] = true;
                }
                assert!(seen.iter().all(|&v| v));
            }
        }
    }

    #[test]
    fn test_full_permutation_at_default_size() {
        let st = state();
        let b = st.backend(0, "10.0.0.1:80");
        let mut seen = vec![false; st.table_size() as usize];
        for k in 0..st.table_size() {
            let mut probe = b.clone();
            probe.next = k;
            seen[probe.permutation(st.table_size()) as usize] = true;
        }
        assert!(seen.iter().all(|&v| v));
    }

    #[test]
    fn test_empty_backends_yields_no_table() {
        assert!(build_lookup_table(&mut [], DEFAULT_TABLE_SIZE).is_none());
    }

    #[test]
    fn test_single_backend_owns_every_slot() {
        let table = build(&["10.0.0.1:80"]);
        assert_eq!(table.len() as u64, DEFAULT_TABLE_SIZE);
        assert!(table.iter().all(|&slot| slot == 0));
    }

    #[test]
    fn test_two_backends_split_evenly() {
        let table = build(&["10.0.0.1:80", "10.0.0.2:80"]);
        let zeros = table.iter().filter(|&&s| s == 0).count();
        let ones = table.iter().filter(|&&s| s == 1).count();
        assert_eq!(zeros + ones, DEFAULT_TABLE_SIZE as usize);
        assert!(zeros.abs_diff(ones) <= 1, "zeros={zeros} ones={ones}");
    }

    #[test]
    fn test_every_slot_assigned_within_range() {
        let addresses: Vec<String> = (0..23).map(|i| format!("10.1.{}.1:8080", i)).collect();
        let refs: Vec<&str> = addresses.iter().map(String::as_str).collect();
        let table = build(&refs);
        assert_eq!(table.len() as u64, DEFAULT_TABLE_SIZE);
        assert!(table.iter().all(|&slot| (slot as usize) < refs.len()));
    }

    #[test]
    fn test_fair_share_within_one_slot() {
        let addresses: Vec<String> = (0..7).map(|i| format!("192.168.0.{}:443", i + 1)).collect();
        let refs: Vec<&str> = addresses.iter().map(String::as_str).collect();
        let table = build(&refs);

        let mut counts = vec![0usize; refs.len()];
        for &slot in &table {
            counts[slot as usize] += 1;
        }
        let max = counts.iter().max().unwrap();
        let min = counts.iter().min().unwrap();
        assert!(max - min <= 1, "counts={counts:?}");
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let addresses = ["10.0.0.1:80", "10.0.0.2:80", "10.0.0.3:80"];
        assert_eq!(build(&addresses), build(&addresses));
    }

    #[test]
    fn test_backend_removal_moves_few_slots() {
        let before = ["10.2.0.1:80", "10.2.0.2:80", "10.2.0.3:80", "10.2.0.4:80", "10.2.0.5:80"];
        let after = ["10.2.0.1:80", "10.2.0.2:80", "10.2.0.4:80", "10.2.0.5:80"];

        let t1 = build(&before);
        let t2 = build(&after);

        // Compare by address so index relabeling after the removal does not
        // count as movement.
        let moved = t1
            .iter()
            .zip(t2.iter())
            .filter(|&(&a, &b)| before[a as usize] != after[b as usize])
            .count();

        let bound = (DEFAULT_TABLE_SIZE as usize).div_ceil(after.len());
        assert!(moved <= bound, "moved={moved} bound={bound}");
    }
}
