//! Shared aptamer pool: component C.
//!
//! Interns byte sequences into stable, dense, monotonically-assigned integer
//! IDs. Safe for concurrent `register` calls from many consumer threads.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use rustc_hash::FxHasher;

use crate::dna::Bounds;

/// Content-hashed, content-equal byte sequence key, per spec.md §9.
#[derive(Debug, Clone, Eq)]
pub struct SequenceKey(pub Arc<[u8]>);

impl PartialEq for SequenceKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

impl Hash for SequenceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_ref().hash(state);
    }
}

impl SequenceKey {
    pub fn new(seq: &[u8]) -> Self {
        Self(Arc::from(seq))
    }
}

type FxBuildHasher = std::hash::BuildHasherDefault<FxHasher>;

/// Concurrent sequence <-> ID interning table (spec.md §4.C).
pub struct AptamerPool {
    by_seq: DashMap<SequenceKey, u32, FxBuildHasher>,
    by_id: DashMap<u32, (Arc<[u8]>, Bounds), FxBuildHasher>,
    next_id: AtomicU32,
    register_lock: Mutex<()>,
    read_only: AtomicBool,
}

impl Default for AptamerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl AptamerPool {
    pub fn new() -> Self {
        Self {
            by_seq: DashMap::with_hasher(FxBuildHasher::default()),
            by_id: DashMap::with_hasher(FxBuildHasher::default()),
            next_id: AtomicU32::new(1),
            register_lock: Mutex::new(()),
            read_only: AtomicBool::new(false),
        }
    }

    /// Idempotent: returns the existing ID for `seq` if present, otherwise
    /// assigns the next ID. Concurrent calls with the same `seq` return the
    /// same ID and only one new ID is consumed.
    pub fn register(&self, seq: &[u8], rr_start: usize, rr_end: usize) -> u32 {
        let key = SequenceKey::new(seq);
        if let Some(existing) = self.by_seq.get(&key) {
            return *existing;
        }
        let _guard = self.register_lock.lock().unwrap();
        // re-check: another thread may have registered while we waited.
        if let Some(existing) = self.by_seq.get(&key) {
            return *existing;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let bounds = Bounds { start: rr_start, end: rr_end };
        self.by_id.insert(id, (key.0.clone(), bounds));
        self.by_seq.insert(key, id);
        id
    }

    pub fn lookup_id(&self, seq: &[u8]) -> Option<u32> {
        self.by_seq.get(&SequenceKey::new(seq)).map(|v| *v)
    }

    pub fn lookup_seq(&self, id: u32) -> Option<Arc<[u8]>> {
        self.by_id.get(&id).map(|v| v.0.clone())
    }

    pub fn lookup_bounds(&self, id: u32) -> Option<Bounds> {
        self.by_id.get(&id).map(|v| v.1)
    }

    pub fn size(&self) -> usize {
        self.by_id.len()
    }

    /// Lazily iterate `(id, seq)` pairs. Only guaranteed consistent once
    /// the pool has entered its read-only phase.
    pub fn iterate(&self) -> impl Iterator<Item = (u32, Arc<[u8]>)> + '_ {
        self.by_id.iter().map(|entry| (*entry.key(), entry.value().0.clone()))
    }

    pub fn iterate_bounds(&self) -> impl Iterator<Item = (u32, Bounds)> + '_ {
        self.by_id.iter().map(|entry| (*entry.key(), entry.value().1))
    }

    pub fn set_read_only(&self) {
        self.read_only.store(true, Ordering::SeqCst);
    }

    pub fn set_read_write(&self) {
        self.read_only.store(false, Ordering::SeqCst);
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use std::thread;

    #[test]
    fn register_is_idempotent() {
        let pool = AptamerPool::new();
        let id1 = pool.register(b"ACGT", 0, 4);
        let id2 = pool.register(b"ACGT", 0, 4);
        assert_eq!(id1, id2);
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn ids_form_dense_prefix() {
        let pool = AptamerPool::new();
        pool.register(b"AAAA", 0, 4);
        pool.register(b"CCCC", 0, 4);
        pool.register(b"GGGG", 0, 4);
        let mut ids: Vec<u32> = pool.iterate().map(|(id, _)| id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn round_trips_seq_and_id() {
        let pool = AptamerPool::new();
        let id = pool.register(b"ACGTACGT", 2, 6);
        let seq = pool.lookup_seq(id).unwrap();
        assert_eq!(seq.as_ref(), b"ACGTACGT");
        assert_eq!(pool.lookup_id(&seq), Some(id));
        assert_eq!(pool.lookup_bounds(id), Some(Bounds { start: 2, end: 6 }));
    }

    #[test]
    fn concurrent_register_consumes_one_id() {
        let pool = StdArc::new(AptamerPool::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let pool = pool.clone();
            handles.push(thread::spawn(move || pool.register(b"ACGTACGT", 0, 8)));
        }
        let ids: Vec<u32> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(pool.size(), 1);
    }
}
