//! Selection cycle: component D.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxHasher;

use crate::pool::AptamerPool;

type FxBuildHasher = std::hash::BuildHasherDefault<FxHasher>;

/// One SELEX round: a name, round index, control/counter-selection flags,
/// optional demultiplexing barcodes, and a per-aptamer count table backed by
/// the shared [`AptamerPool`] (spec.md §3/§4.D).
pub struct Cycle {
    pub name: String,
    pub round: u32,
    pub is_control: bool,
    pub is_counter_selection: bool,
    barcode_5prime: Option<Vec<u8>>,
    barcode_3prime: Option<Vec<u8>>,
    pool: Arc<AptamerPool>,
    counts: DashMap<u32, u64, FxBuildHasher>,
    total_size: AtomicU64,
    unique_size: AtomicU64,
}

impl Cycle {
    pub fn new(
        name: impl Into<String>,
        round: u32,
        is_control: bool,
        is_counter_selection: bool,
        barcode_5prime: Option<Vec<u8>>,
        barcode_3prime: Option<Vec<u8>>,
        pool: Arc<AptamerPool>,
    ) -> Self {
        Self {
            name: name.into(),
            round,
            is_control,
            is_counter_selection,
            barcode_5prime,
            barcode_3prime,
            pool,
            counts: DashMap::with_hasher(FxBuildHasher::default()),
            total_size: AtomicU64::new(0),
            unique_size: AtomicU64::new(0),
        }
    }

    pub fn barcode_5prime(&self) -> Option<Vec<u8>> {
        self.barcode_5prime.clone()
    }

    pub fn barcode_3prime(&self) -> Option<Vec<u8>> {
        self.barcode_3prime.clone()
    }

    /// Register `seq` in the shared pool, then atomically fold `count` into
    /// this cycle's per-ID counter, `total_size`, and `unique_size`.
    pub fn add(
        &self,
        seq: &[u8],
        rr_start: usize,
        rr_end: usize,
        count: u64,
    ) -> u32 {
        let id = self.pool.register(seq, rr_start, rr_end);
        let mut became_unique = false;
        self.counts
            .entry(id)
            .and_modify(|c| *c += count)
            .or_insert_with(|| {
                became_unique = true;
                count
            });
        self.total_size.fetch_add(count, Ordering::SeqCst);
        if became_unique {
            self.unique_size.fetch_add(1, Ordering::SeqCst);
        }
        id
    }

    pub fn contains_id(&self, id: u32) -> bool {
        self.counts.contains_key(&id)
    }

    pub fn contains_seq(&self, seq: &[u8]) -> bool {
        self.pool
            .lookup_id(seq)
            .map(|id| self.contains_id(id))
            .unwrap_or(false)
    }

    pub fn cardinality_id(&self, id: u32) -> u64 {
        self.counts.get(&id).map(|c| *c).unwrap_or(0)
    }

    pub fn cardinality_seq(&self, seq: &[u8]) -> u64 {
        self.pool
            .lookup_id(seq)
            .map(|id| self.cardinality_id(id))
            .unwrap_or(0)
    }

    pub fn size(&self) -> u64 {
        self.total_size.load(Ordering::SeqCst)
    }

    pub fn unique_size(&self) -> u64 {
        self.unique_size.load(Ordering::SeqCst)
    }

    pub fn iterate(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.counts.iter().map(|entry| (*entry.key(), *entry.value()))
    }
}

/// Owns the ordered list of cycles for one experiment so that each cycle can
/// locate its siblings by index rather than a back-pointer (spec.md §9).
#[derive(Clone)]
pub struct CycleList {
    cycles: Arc<Vec<Arc<Cycle>>>,
}

impl CycleList {
    pub fn new(cycles: Vec<Arc<Cycle>>) -> Self {
        Self { cycles: Arc::new(cycles) }
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Cycle>> {
        self.cycles.get(index)
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.cycles.iter().position(|c| c.name == name)
    }

    pub fn next_cycle(&self, index: usize) -> Option<&Arc<Cycle>> {
        self.cycles.get(index + 1)
    }

    pub fn previous_cycle(&self, index: usize) -> Option<&Arc<Cycle>> {
        index.checked_sub(1).and_then(|i| self.cycles.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Cycle>> {
        self.cycles.iter()
    }
}
