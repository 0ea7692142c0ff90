//! Consumer: component H. The per-read contig/match/extract/register
//! pipeline, plus the poison-pill re-enqueue that propagates termination to
//! sibling consumers (spec.md §4.H/§5).

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::config::{ExtractionMode, RunConfig};
use crate::cycle::{Cycle, CycleList};
use crate::dna;
use crate::matcher;
use crate::merger::{self, Contig, MergeParams};
use crate::metadata::MetadataStore;
use crate::progress::ProgressCounters;

use super::{PendingRead, QueueItem};

/// The six per-read classifications of spec.md §7. `ContigAssemblyFail` is
/// handled separately since it short-circuits before extraction is even
/// attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorKind {
    InvalidAlphabet,
    Unmatched5Prime,
    Unmatched3Prime,
    InvalidCycle,
    PrimerOverlap,
}

/// Spawn one consumer thread. On observing [`QueueItem::EndOfStream`] it
/// re-enqueues the pill and exits, so the producer need not know the
/// consumer count (spec.md §5).
pub fn spawn(
    config: Arc<RunConfig>,
    cycles: CycleList,
    metadata: Arc<MetadataStore>,
    progress: Arc<ProgressCounters>,
    receiver: Receiver<QueueItem>,
    sender: Sender<QueueItem>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        match receiver.recv() {
            Ok(QueueItem::EndOfStream) => {
                let _ = sender.send(QueueItem::EndOfStream);
                break;
            }
            Ok(QueueItem::Read(read)) => {
                process_read(&config, &cycles, &metadata, &progress, read);
            }
            Err(_) => break,
        }
    })
}

fn process_read(
    config: &RunConfig,
    cycles: &CycleList,
    metadata: &MetadataStore,
    progress: &ProgressCounters,
    read: PendingRead,
) {
    progress.inc_processed();

    let contig = match assemble_contig(&read, config) {
        Some(contig) => contig,
        None => {
            progress.inc_contig_assembly_fail();
            return;
        }
    };

    let mode = config.mode();
    match try_extract(config, cycles, metadata, &contig.seq, &contig.qual, &read, mode) {
        Ok(()) => progress.inc_accepted(),
        Err(err) => {
            record(progress, err);
            if mode == ExtractionMode::Full
                && config.check_reverse_complement
                && is_retryable(err)
            {
                unrecord(progress, err);
                let rc_seq = dna::reverse_complement(&contig.seq);
                let rc_qual: Vec<u8> = contig.qual.iter().rev().copied().collect();
                match try_extract(config, cycles, metadata, &rc_seq, &rc_qual, &read, mode)
                {
                    Ok(()) => progress.inc_accepted(),
                    Err(err2) => record(progress, err2),
                }
            }
        }
    }
}

/// Step 2: single-end passthrough, or invoke the paired-end merger.
fn assemble_contig(read: &PendingRead, config: &RunConfig) -> Option<Contig> {
    match (&read.reverse_seq, &read.reverse_qual) {
        (Some(reverse_seq), Some(reverse_qual)) => merger::merge(
            &read.forward_seq,
            &read.forward_qual,
            reverse_seq,
            reverse_qual,
            &MergeParams::new(
                config.paired_end_min_overlap,
                config.paired_end_max_mutations,
                config.paired_end_max_score_value,
            ),
        ),
        _ => Some(Contig {
            seq: read.forward_seq.clone(),
            qual: read.forward_qual.clone(),
        }),
    }
}

/// Only these four classifications are undone-and-retried on the reverse
/// complement; `PrimerOverlap` is terminal (see DESIGN.md open question 4).
fn is_retryable(err: ErrorKind) -> bool {
    matches!(
        err,
        ErrorKind::InvalidAlphabet
            | ErrorKind::Unmatched5Prime
            | ErrorKind::Unmatched3Prime
            | ErrorKind::InvalidCycle
    )
}

fn record(progress: &ProgressCounters, err: ErrorKind) {
    match err {
        ErrorKind::InvalidAlphabet => progress.inc_invalid_alphabet(),
        ErrorKind::Unmatched5Prime => progress.inc_unmatched_5prime(),
        ErrorKind::Unmatched3Prime => progress.inc_unmatched_3prime(),
        ErrorKind::InvalidCycle => progress.inc_invalid_cycle(),
        ErrorKind::PrimerOverlap => progress.inc_primer_overlaps(),
    }
}

fn unrecord(progress: &ProgressCounters, err: ErrorKind) {
    match err {
        ErrorKind::InvalidAlphabet => progress.dec_invalid_alphabet(),
        ErrorKind::Unmatched5Prime => progress.dec_unmatched_5prime(),
        ErrorKind::Unmatched3Prime => progress.dec_unmatched_3prime(),
        ErrorKind::InvalidCycle => progress.dec_invalid_cycle(),
        ErrorKind::PrimerOverlap => unreachable!("primer overlap is not retried"),
    }
}

/// Too short is attributed to the 5' boundary, too long to the 3' boundary
/// (spec.md §4.H step 7 names no rule for mode-less batch/RR-only length
/// checks; this mirrors the full-mode classification for consistency — see
/// DESIGN.md open question 5).
fn classify_size_violation(
    len: usize,
    constraint: crate::config::SizeConstraint,
) -> ErrorKind {
    use crate::config::SizeConstraint;
    let too_short = match constraint {
        SizeConstraint::Exact(n) => len < n,
        SizeConstraint::Range { lower, .. } => len < lower,
    };
    if too_short {
        ErrorKind::Unmatched5Prime
    } else {
        ErrorKind::Unmatched3Prime
    }
}

/// Steps 3 through 8 of spec.md §4.H, run once per orientation attempt.
fn try_extract(
    config: &RunConfig,
    cycles: &CycleList,
    metadata: &MetadataStore,
    seq: &[u8],
    qual: &[u8],
    read: &PendingRead,
    mode: ExtractionMode,
) -> Result<(), ErrorKind> {
    if dna::first_invalid_base(seq).is_some() {
        return Err(ErrorKind::InvalidAlphabet);
    }

    match mode {
        ExtractionMode::Batch => extract_batch(config, read, metadata, seq, qual),
        ExtractionMode::RandomizedRegionOnly => {
            extract_rr_only(config, read, metadata, seq, qual)
        }
        ExtractionMode::Full => extract_full(config, cycles, read, metadata, seq, qual),
    }
}

fn resolve_assigned_cycle(read: &PendingRead) -> Result<Arc<Cycle>, ErrorKind> {
    read.assigned_cycle.clone().ok_or(ErrorKind::InvalidCycle)
}

fn record_read_metadata(metadata: &MetadataStore, cycle: &Cycle, read: &PendingRead) {
    let cycle_metadata = metadata.cycle(&cycle.name);
    cycle_metadata.record_read(&read.forward_seq, &read.forward_qual, false);
    if let (Some(reverse_seq), Some(reverse_qual)) = (&read.reverse_seq, &read.reverse_qual) {
        cycle_metadata.record_read(reverse_seq, reverse_qual, true);
    }
}

/// Contig IS the randomized region; no primer search is performed, so the
/// cycle must already be assigned (per-file mode).
fn extract_batch(
    config: &RunConfig,
    read: &PendingRead,
    metadata: &MetadataStore,
    seq: &[u8],
    _qual: &[u8],
) -> Result<(), ErrorKind> {
    let cycle = resolve_assigned_cycle(read)?;

    let constraint = config.size_constraint().ok_or(ErrorKind::Unmatched3Prime)?;
    if !constraint.accepts(seq.len()) {
        return Err(classify_size_violation(seq.len(), constraint));
    }

    let stored = if config.store_reverse_complement {
        dna::reverse_complement(seq)
    } else {
        seq.to_vec()
    };
    let len = stored.len();
    record_read_metadata(metadata, &cycle, read);
    cycle.add(&stored, 0, len, 1);
    metadata.cycle(&cycle.name).record_accepted(seq);
    Ok(())
}

/// Primers are synthesized around the already-extracted randomized region;
/// like batch mode, this requires a pre-assigned cycle.
fn extract_rr_only(
    config: &RunConfig,
    read: &PendingRead,
    metadata: &MetadataStore,
    seq: &[u8],
    _qual: &[u8],
) -> Result<(), ErrorKind> {
    let cycle = resolve_assigned_cycle(read)?;

    let constraint = config.size_constraint().ok_or(ErrorKind::Unmatched3Prime)?;
    if !constraint.accepts(seq.len()) {
        return Err(classify_size_violation(seq.len(), constraint));
    }

    let primer3 = config.primer3.as_deref().unwrap_or(&[]);
    let mut full_seq = Vec::with_capacity(config.primer5.len() + seq.len() + primer3.len());
    full_seq.extend_from_slice(&config.primer5);
    full_seq.extend_from_slice(seq);
    full_seq.extend_from_slice(primer3);

    let (mut bounds_start, mut bounds_end) =
        (config.primer5.len(), config.primer5.len() + seq.len());
    if config.store_reverse_complement {
        let total_len = full_seq.len();
        full_seq = dna::reverse_complement(&full_seq);
        let (start, end) = dna::reverse_complement_bounds(total_len, bounds_start, bounds_end);
        bounds_start = start;
        bounds_end = end;
    }

    record_read_metadata(metadata, &cycle, read);
    cycle.add(&full_seq, bounds_start, bounds_end, 1);
    metadata.cycle(&cycle.name).record_accepted(seq);
    Ok(())
}

/// Strictly-best-scoring barcode index in `window`, or `None` on a tie or
/// no match within tolerance (spec.md §4.H step 5 / §9 open question 2).
fn best_barcode_index(window: &[u8], barcodes: &[Vec<u8>], tolerance: u32) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    let mut tied = false;
    for (idx, barcode) in barcodes.iter().enumerate() {
        if barcode.is_empty() {
            continue;
        }
        if let Some(hit) = matcher::find(window, barcode, tolerance, 0, window.len()) {
            match best {
                None => best = Some((idx, hit.errors)),
                Some((_, best_errors)) if hit.errors < best_errors => {
                    best = Some((idx, hit.errors));
                    tied = false;
                }
                Some((_, best_errors)) if hit.errors == best_errors => tied = true,
                _ => {}
            }
        }
    }
    if tied {
        None
    } else {
        best.map(|(idx, _)| idx)
    }
}

fn resolve_barcode_cycle(
    config: &RunConfig,
    cycles: &CycleList,
    seq: &[u8],
    primer5_start: usize,
    primer3_end: usize,
) -> Result<Arc<Cycle>, ErrorKind> {
    let idx5 = if config.barcodes_5prime.is_empty() {
        None
    } else {
        Some(
            best_barcode_index(&seq[..primer5_start], &config.barcodes_5prime, config.barcode_tolerance)
                .ok_or(ErrorKind::InvalidCycle)?,
        )
    };
    let idx3 = if config.barcodes_3prime.is_empty() {
        None
    } else {
        Some(
            best_barcode_index(&seq[primer3_end..], &config.barcodes_3prime, config.barcode_tolerance)
                .ok_or(ErrorKind::InvalidCycle)?,
        )
    };

    let selected = match (idx5, idx3) {
        (Some(a), Some(b)) if a == b => a,
        (Some(a), None) => a,
        (None, Some(b)) => b,
        _ => return Err(ErrorKind::InvalidCycle),
    };
    cycles.get(selected).cloned().ok_or(ErrorKind::InvalidCycle)
}

fn extract_full(
    config: &RunConfig,
    cycles: &CycleList,
    read: &PendingRead,
    metadata: &MetadataStore,
    seq: &[u8],
    qual: &[u8],
) -> Result<(), ErrorKind> {
    // Step 4: locate the 5' primer anchored against the reversed contig.
    let primer5_hit = matcher::find_reversed(seq, &config.primer5, config.primer_tolerance)
        .ok_or(ErrorKind::Unmatched5Prime)?;
    let primer5_end = primer5_hit.index + config.primer5.len();

    // Searched from the 5' hit's start (not its end) so an overlapping 3'
    // match can still be located and flagged in step 6 below.
    let primer3_hit = match config.primer3.as_deref() {
        Some(primer3) if !primer3.is_empty() => Some(
            matcher::find(
                seq,
                primer3,
                config.primer_tolerance,
                primer5_hit.index,
                seq.len(),
            )
            .ok_or(ErrorKind::Unmatched3Prime)?,
        ),
        _ => None,
    };
    let primer3_len = config.primer3.as_ref().map_or(0, |p| p.len());

    let rr_start = primer5_end;
    let rr_end = match (&primer3_hit, config.randomized_region_size) {
        (Some(hit), _) => hit.index,
        (None, Some(exact)) => rr_start + exact,
        (None, None) => return Err(ErrorKind::Unmatched3Prime),
    };

    // Step 5: non-per-file demultiplexing by barcode.
    let cycle = if config.is_per_file {
        resolve_assigned_cycle(read)?
    } else {
        let primer3_start = primer3_hit.map_or(seq.len(), |hit| hit.index);
        resolve_barcode_cycle(config, cycles, seq, primer5_hit.index, primer3_start + primer3_len)?
    };

    // Step 6: primer overlap is treated as terminal (DESIGN.md open question 4).
    if let Some(hit) = primer3_hit {
        let primer3_start = hit.index;
        let primer3_end = hit.index + primer3_len;
        if primer5_hit.index < primer3_end && primer3_start < rr_start {
            return Err(ErrorKind::PrimerOverlap);
        }
    }

    // Step 7: extraction validation.
    if rr_start < config.primer5.len() {
        return Err(ErrorKind::Unmatched5Prime);
    }
    if rr_end + primer3_len > seq.len() {
        return Err(ErrorKind::Unmatched3Prime);
    }
    if rr_start >= rr_end {
        return Err(ErrorKind::Unmatched5Prime);
    }
    let constraint = config.size_constraint().ok_or(ErrorKind::Unmatched3Prime)?;
    let rr_len = rr_end - rr_start;
    if !constraint.accepts(rr_len) {
        return Err(classify_size_violation(rr_len, constraint));
    }

    // Step 8: success.
    let flank_start = rr_start - config.primer5.len();
    let flank_end = rr_end + primer3_len;
    let mut stored = seq[flank_start..flank_end].to_vec();
    let mut bounds_start = rr_start - flank_start;
    let mut bounds_end = rr_end - flank_start;
    if config.store_reverse_complement {
        let total_len = stored.len();
        stored = dna::reverse_complement(&stored);
        let (start, end) = dna::reverse_complement_bounds(total_len, bounds_start, bounds_end);
        bounds_start = start;
        bounds_end = end;
    }
    record_read_metadata(metadata, &cycle, read);
    cycle.add(&stored, bounds_start, bounds_end, 1);
    metadata
        .cycle(&cycle.name)
        .record_accepted(&seq[rr_start..rr_end]);
    let _ = qual; // quality bytes folded via record_read_metadata above
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::AptamerPool;
    use std::path::PathBuf;

    fn config(primer5: &[u8], primer3: Option<&[u8]>, exact: usize) -> RunConfig {
        RunConfig {
            primer5: primer5.to_vec(),
            primer3: primer3.map(|p| p.to_vec()),
            randomized_region_size: Some(exact),
            randomized_region_size_lower_bound: None,
            randomized_region_size_upper_bound: None,
            is_per_file: false,
            only_randomized_region_in_data: false,
            batch_mode: false,
            store_reverse_complement: false,
            check_reverse_complement: false,
            barcodes_5prime: Vec::new(),
            barcodes_3prime: Vec::new(),
            primer_tolerance: 1,
            barcode_tolerance: 1,
            paired_end_min_overlap: 4,
            paired_end_max_mutations: 0,
            paired_end_max_score_value: 40,
            blocking_queue_size: 10,
            max_cores: 1,
            forward_files: vec![PathBuf::from("r1.fastq")],
            reverse_files: Vec::new(),
        }
    }

    fn single_read(seq: &[u8]) -> PendingRead {
        PendingRead {
            forward_seq: seq.to_vec(),
            forward_qual: vec![b'I'; seq.len()],
            reverse_seq: None,
            reverse_qual: None,
            source: vec![PathBuf::from("r1.fastq")],
            assigned_cycle: None,
        }
    }

    fn fresh_cycles() -> CycleList {
        let pool = Arc::new(AptamerPool::new());
        let cycle = Arc::new(Cycle::new("cycle0", 0, false, false, None, None, pool));
        CycleList::new(vec![cycle])
    }

    /// Scenario S1: single-end, batch mode, exact size 4, one read "ACGT".
    #[test]
    fn s1_batch_mode_accepts_exact_size() {
        let mut cfg = config(b"", None, 4);
        cfg.batch_mode = true;
        cfg.is_per_file = true;
        let cycles = fresh_cycles();
        let metadata = MetadataStore::new();
        let progress = ProgressCounters::default();
        let mut read = single_read(b"ACGT");
        read.assigned_cycle = cycles.get(0).cloned();

        process_read(&cfg, &cycles, &metadata, &progress, read);

        assert_eq!(progress.accepted(), 1);
        assert_eq!(progress.processed(), 1);
        let cycle = cycles.get(0).unwrap();
        assert_eq!(cycle.size(), 1);
        assert_eq!(cycle.unique_size(), 1);
    }

    /// Scenario S2: invalid alphabet rejects before extraction.
    #[test]
    fn s2_full_mode_rejects_invalid_alphabet() {
        let cfg = config(b"AC", Some(b"GT"), 2);
        let cycles = fresh_cycles();
        let metadata = MetadataStore::new();
        let progress = ProgressCounters::default();
        let read = single_read(b"ACNNGT");

        process_read(&cfg, &cycles, &metadata, &progress, read);

        assert_eq!(progress.accepted(), 0);
        assert_eq!(progress.invalid_alphabet(), 1);
        assert_eq!(progress.error_total(), 1);
    }

    /// Scenario S3: full mode extracts the randomized region with correct bounds.
    #[test]
    fn s3_full_mode_extracts_randomized_region() {
        let mut cfg = config(b"AC", Some(b"GT"), 2);
        cfg.is_per_file = true;
        let cycles = fresh_cycles();
        let metadata = MetadataStore::new();
        let progress = ProgressCounters::default();
        let mut read = single_read(b"ACAAGT");
        read.assigned_cycle = cycles.get(0).cloned();

        process_read(&cfg, &cycles, &metadata, &progress, read);

        assert_eq!(progress.accepted(), 1);
        let cycle = cycles.get(0).unwrap();
        assert_eq!(cycle.cardinality_seq(b"ACAAGT"), 1);
    }

    /// Scenario S5 (partial): a one-mismatch primer5 stays within tolerance.
    #[test]
    fn s5_primer_tolerance_allows_one_mismatch() {
        let mut cfg = config(b"ACGT", Some(b"TTTT"), 4);
        cfg.primer_tolerance = 1;
        cfg.is_per_file = true;
        let cycles = fresh_cycles();
        let metadata = MetadataStore::new();
        let progress = ProgressCounters::default();
        // primer5 "ACGT" mutated to "GCGT" (one mismatch) still matches within tolerance 1.
        let mut read = single_read(b"GCGTAAAATTTT");
        read.assigned_cycle = cycles.get(0).cloned();

        process_read(&cfg, &cycles, &metadata, &progress, read);

        assert_eq!(progress.accepted(), 1);
    }

    /// Scenario S5 (partial): two mismatches in primer3 exceeds tolerance.
    #[test]
    fn s5_primer3_over_tolerance_is_unmatched() {
        let mut cfg = config(b"ACGT", Some(b"TTTT"), 4);
        cfg.primer_tolerance = 1;
        cfg.is_per_file = true;
        let cycles = fresh_cycles();
        let metadata = MetadataStore::new();
        let progress = ProgressCounters::default();
        let mut read = single_read(b"ACGTAAAATAAT");
        read.assigned_cycle = cycles.get(0).cloned();

        process_read(&cfg, &cycles, &metadata, &progress, read);

        assert_eq!(progress.accepted(), 0);
        assert_eq!(progress.unmatched_3prime(), 1);
    }

    #[test]
    fn primer_overlap_is_discarded_and_counted() {
        // primer5 "ACGT" and primer3 "CGTA" overlap when both match near the same span.
        let mut cfg = config(b"ACGT", Some(b"CGTA"), 0);
        cfg.randomized_region_size = None;
        cfg.randomized_region_size_lower_bound = Some(0);
        cfg.randomized_region_size_upper_bound = Some(8);
        cfg.is_per_file = true;
        let cycles = fresh_cycles();
        let metadata = MetadataStore::new();
        let progress = ProgressCounters::default();
        // "ACGTA" contains primer5 at 0 and primer3 "CGTA" at 1, overlapping [0,4) vs [1,5).
        let mut read = single_read(b"ACGTA");
        read.assigned_cycle = cycles.get(0).cloned();

        process_read(&cfg, &cycles, &metadata, &progress, read);

        assert_eq!(progress.accepted(), 0);
        assert_eq!(progress.primer_overlaps(), 1);
        assert_eq!(progress.error_total(), 1);
    }

    #[test]
    fn reverse_complement_retry_corrects_counters() {
        // Non-palindromic primers so the "as sequenced" orientation and its
        // reverse complement are genuinely different strings.
        let mut cfg = config(b"AACG", Some(b"CCTT"), 4);
        cfg.primer_tolerance = 0;
        cfg.check_reverse_complement = true;
        cfg.is_per_file = true;
        let cycles = fresh_cycles();
        let metadata = MetadataStore::new();
        let progress = ProgressCounters::default();
        // Correct orientation: "AACG" + "GGGG" + "CCTT". The read is
        // sequenced as its reverse complement, so the first attempt must
        // fail and the retry on rc(seq) must succeed.
        let forward = b"AACGGGGGCCTT".to_vec();
        let as_sequenced = dna::reverse_complement(&forward);
        let mut read = single_read(&as_sequenced);
        read.assigned_cycle = cycles.get(0).cloned();

        process_read(&cfg, &cycles, &metadata, &progress, read);

        assert_eq!(progress.accepted(), 1);
        assert_eq!(progress.unmatched_5prime(), 0);
        assert_eq!(progress.processed(), 1);
        assert_eq!(progress.accepted() + progress.error_total(), 1);
    }
}
