//! Owns the shared state for one run: the aptamer pool, the ordered list of
//! selection cycles, the metadata accumulators, and the progress counters.
//! Mutated concurrently during parsing; switched to a read-only observation
//! phase on completion, then exposed for serialization by the external
//! layer (spec.md §3 "Lifecycles").

use std::sync::Arc;

use rayon::prelude::*;

use crate::cycle::{Cycle, CycleList};
use crate::metadata::MetadataStore;
use crate::pool::AptamerPool;
use crate::progress::ProgressCounters;

/// A single cycle's final counts, handed to the external layer untouched
/// (spec.md §6 "Persisted output").
pub struct CycleSnapshot {
    pub name: String,
    pub round: u32,
    pub total_size: u64,
    pub unique_size: u64,
    pub counts: Vec<(u32, u64)>,
}

/// A read-only view of the whole run, built once after the join barrier.
pub struct ExperimentSnapshot {
    pub cycles: Vec<CycleSnapshot>,
    pub pool_sequences: Vec<(u32, Arc<[u8]>)>,
    pub pool_bounds: Vec<(u32, crate::dna::Bounds)>,
    pub processed: u64,
    pub accepted: u64,
    pub contig_assembly_fail: u64,
    pub invalid_alphabet: u64,
    pub unmatched_5prime: u64,
    pub unmatched_3prime: u64,
    pub invalid_cycle: u64,
    pub primer_overlaps: u64,
}

pub struct Experiment {
    pool: Arc<AptamerPool>,
    cycles: CycleList,
    metadata: Arc<MetadataStore>,
    progress: Arc<ProgressCounters>,
}

impl Experiment {
    /// Cycles are created once at initialization; each already shares
    /// `pool` internally (spec.md §4.D "shared back-pointer to pool").
    pub fn new(pool: Arc<AptamerPool>, cycles: Vec<Arc<Cycle>>) -> Self {
        Self {
            pool,
            cycles: CycleList::new(cycles),
            metadata: Arc::new(MetadataStore::new()),
            progress: Arc::new(ProgressCounters::default()),
        }
    }

    pub fn pool(&self) -> &Arc<AptamerPool> {
        &self.pool
    }

    pub fn cycles(&self) -> &CycleList {
        &self.cycles
    }

    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    pub fn progress(&self) -> &Arc<ProgressCounters> {
        &self.progress
    }

    /// Switches the pool to its read-only observation phase. Called once,
    /// after the consumer join barrier.
    pub fn finish(&self) {
        self.pool.set_read_only();
    }

    /// Builds the persisted-output view (spec.md §6): cycle counts, pool
    /// listing, and the eight progress counters. Only meaningful once
    /// `finish()` has been called. Each cycle's row is independent of its
    /// siblings, so building them is farmed out across `rayon`'s pool;
    /// the pool listing itself is a single flat iteration and stays
    /// sequential.
    pub fn snapshot(&self) -> ExperimentSnapshot {
        let cycle_list: Vec<_> = self.cycles.iter().collect();
        let cycles = cycle_list
            .par_iter()
            .map(|cycle| CycleSnapshot {
                name: cycle.name.clone(),
                round: cycle.round,
                total_size: cycle.size(),
                unique_size: cycle.unique_size(),
                counts: cycle.iterate().collect(),
            })
            .collect();

        ExperimentSnapshot {
            cycles,
            pool_sequences: self.pool.iterate().collect(),
            pool_bounds: self.pool.iterate_bounds().collect(),
            processed: self.progress.processed(),
            accepted: self.progress.accepted(),
            contig_assembly_fail: self.progress.contig_assembly_fail(),
            invalid_alphabet: self.progress.invalid_alphabet(),
            unmatched_5prime: self.progress.unmatched_5prime(),
            unmatched_3prime: self.progress.unmatched_3prime(),
            invalid_cycle: self.progress.invalid_cycle(),
            primer_overlaps: self.progress.primer_overlaps(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_cycle_state() {
        let pool = Arc::new(AptamerPool::new());
        let cycle = Arc::new(Cycle::new(
            "round0",
            0,
            false,
            false,
            None,
            None,
            pool.clone(),
        ));
        cycle.add(b"ACGT", 0, 4, 3);
        let experiment = Experiment::new(pool, vec![cycle]);
        experiment.finish();

        let snapshot = experiment.snapshot();
        assert!(experiment.pool().is_read_only());
        assert_eq!(snapshot.cycles.len(), 1);
        assert_eq!(snapshot.cycles[0].total_size, 3);
        assert_eq!(snapshot.cycles[0].unique_size, 1);
        assert_eq!(snapshot.pool_sequences.len(), 1);
        assert_eq!(snapshot.processed, 0);
    }
}
