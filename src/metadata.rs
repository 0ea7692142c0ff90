//! Per-cycle quality and nucleotide-composition accumulators: component E.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use rustc_hash::FxHasher;

use crate::dna;

type FxBuildHasher = std::hash::BuildHasherDefault<FxHasher>;

/// Running mean accumulator: `sum`, `n`.
#[derive(Default)]
pub struct QualityAccumulator {
    sum: AtomicU64,
    n: AtomicU64,
}

impl QualityAccumulator {
    pub fn add(&self, phred_score: u32) {
        self.sum.fetch_add(phred_score as u64, Ordering::SeqCst);
        self.n.fetch_add(1, Ordering::SeqCst);
    }

    pub fn mean(&self) -> Option<f64> {
        let n = self.n.load(Ordering::SeqCst);
        if n == 0 {
            None
        } else {
            Some(self.sum.load(Ordering::SeqCst) as f64 / n as f64)
        }
    }

    pub fn n(&self) -> u64 {
        self.n.load(Ordering::SeqCst)
    }
}

/// `{A, C, G, T, N} -> count`, allocated lazily on first write for a
/// position (spec.md §4.E).
#[derive(Default)]
pub struct BaseCounts {
    counts: DashMap<u8, AtomicU64, FxBuildHasher>,
}

impl BaseCounts {
    pub fn add(&self, base: u8) {
        self.counts
            .entry(base)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self, base: u8) -> u64 {
        self.counts.get(&base).map(|c| c.load(Ordering::SeqCst)).unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|e| e.value().load(Ordering::SeqCst)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.counts.iter().map(|e| (*e.key(), e.value().load(Ordering::SeqCst)))
    }
}

/// `position -> accumulator`, keyed separately for forward and reverse
/// reads, plus the "accepted" distribution keyed by randomized-region
/// length then position. One instance of this struct per selection cycle.
#[derive(Default)]
pub struct CycleMetadata {
    quality_forward: DashMap<usize, QualityAccumulator, FxBuildHasher>,
    quality_reverse: DashMap<usize, QualityAccumulator, FxBuildHasher>,
    bases_forward: DashMap<usize, BaseCounts, FxBuildHasher>,
    bases_reverse: DashMap<usize, BaseCounts, FxBuildHasher>,
    accepted: DashMap<usize, DashMap<usize, BaseCounts, FxBuildHasher>, FxBuildHasher>,
}

impl CycleMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one read's quality bytes and primary-sequence bases into the
    /// forward or reverse per-position tables. `seq`/`qual` index into the
    /// *original* read.
    pub fn record_read(&self, seq: &[u8], qual: &[u8], is_reverse: bool) {
        let (quality_table, base_table) = if is_reverse {
            (&self.quality_reverse, &self.bases_reverse)
        } else {
            (&self.quality_forward, &self.bases_forward)
        };
        for (pos, (&base, &q)) in seq.iter().zip(qual.iter()).enumerate() {
            quality_table
                .entry(pos)
                .or_insert_with(QualityAccumulator::default)
                .add(dna::phred33(q));
            base_table
                .entry(pos)
                .or_insert_with(BaseCounts::default)
                .add(base);
        }
    }

    /// Fold one accepted extracted region into the `rrLength -> position ->
    /// base counts` distribution. `region` indexes into the *extracted*
    /// randomized region, not the original read.
    pub fn record_accepted(&self, region: &[u8]) {
        let by_position = self
            .accepted
            .entry(region.len())
            .or_insert_with(|| DashMap::with_hasher(FxBuildHasher::default()));
        for (pos, &base) in region.iter().enumerate() {
            by_position
                .entry(pos)
                .or_insert_with(BaseCounts::default)
                .add(base);
        }
    }

    pub fn quality_mean(&self, position: usize, is_reverse: bool) -> Option<f64> {
        let table = if is_reverse { &self.quality_reverse } else { &self.quality_forward };
        table.get(&position).and_then(|acc| acc.mean())
    }

    pub fn base_count(&self, position: usize, is_reverse: bool, base: u8) -> u64 {
        let table = if is_reverse { &self.bases_reverse } else { &self.bases_forward };
        table.get(&position).map(|c| c.count(base)).unwrap_or(0)
    }

    /// Sum of {A,C,G,T,N} counts at `(rr_length, position)` in the accepted
    /// distribution -- equal to the number of accepted reads in this cycle
    /// whose extracted region has length `rr_length` (spec.md §8 property 6).
    pub fn accepted_total(&self, rr_length: usize, position: usize) -> u64 {
        self.accepted
            .get(&rr_length)
            .and_then(|by_pos| by_pos.get(&position).map(|c| c.total()))
            .unwrap_or(0)
    }
}

/// Top-level accumulator set, keyed by cycle name (spec.md §4.E).
#[derive(Default)]
pub struct MetadataStore {
    by_cycle: DashMap<String, CycleMetadata, FxBuildHasher>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycle(
        &self,
        cycle_name: &str,
    ) -> dashmap::mapref::one::RefMut<'_, String, CycleMetadata, FxBuildHasher>
    {
        self.by_cycle
            .entry(cycle_name.to_string())
            .or_insert_with(CycleMetadata::new)
    }

    pub fn cycle_names(&self) -> Vec<String> {
        self.by_cycle.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn quality_mean_accumulates() {
        let acc = QualityAccumulator::default();
        acc.add(30);
        acc.add(40);
        assert_eq!(acc.mean(), Some(35.0));
    }

    #[test]
    fn quality_mean_handles_non_terminating_average() {
        let acc = QualityAccumulator::default();
        acc.add(30);
        acc.add(31);
        acc.add(31);
        assert_approx_eq!(acc.mean().unwrap(), 30.666_666_666_666_668);
    }

    #[test]
    fn base_counts_track_alphabet() {
        let counts = BaseCounts::default();
        counts.add(b'A');
        counts.add(b'A');
        counts.add(b'C');
        assert_eq!(counts.count(b'A'), 2);
        assert_eq!(counts.count(b'C'), 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn accepted_distribution_sums_to_read_count() {
        let meta = CycleMetadata::new();
        meta.record_accepted(b"AC");
        meta.record_accepted(b"AC");
        meta.record_accepted(b"GT");
        // three reads of length 2 were accepted; position 0 sums to 3
        assert_eq!(meta.accepted_total(2, 0), 3);
        assert_eq!(meta.accepted_total(2, 1), 3);
        assert_eq!(meta.accepted_total(3, 0), 0);
    }

    #[test]
    fn record_read_indexes_original_positions() {
        let meta = CycleMetadata::new();
        meta.record_read(b"ACGT", b"IIII", false);
        assert_eq!(meta.base_count(0, false, b'A'), 1);
        assert_eq!(meta.quality_mean(0, false), Some(40.0));
    }
}
