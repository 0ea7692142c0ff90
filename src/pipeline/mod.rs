//! Producer/consumer pipeline: the bounded queue, its poison-pill item type,
//! and the per-read record that flows through it (spec.md §3/§5/§9).

pub mod consumer;
pub mod producer;

use std::path::PathBuf;
use std::sync::Arc;

use crate::cycle::Cycle;

/// A read dequeued by a consumer, already enriched by the producer with its
/// source path(s) and (in per-file mode) its assigned cycle.
#[derive(Clone)]
pub struct PendingRead {
    pub forward_seq: Vec<u8>,
    pub forward_qual: Vec<u8>,
    pub reverse_seq: Option<Vec<u8>>,
    pub reverse_qual: Option<Vec<u8>>,
    pub source: Vec<PathBuf>,
    pub assigned_cycle: Option<Arc<Cycle>>,
}

/// The poison-pill idiom of spec.md §9: a tagged queue item rather than a
/// bare read, so termination can be modeled as just another variant.
#[derive(Clone)]
pub enum QueueItem {
    Read(PendingRead),
    EndOfStream,
}
