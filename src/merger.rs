//! Paired-end contig assembler: component B.
//!
//! Produces the overlapped-region consensus only (not the full spanning
//! sequence), per spec.md §4.B's explicit design choice.

use derive_new::new;

#[derive(Debug, Clone, Copy, new)]
pub struct MergeParams {
    pub min_overlap: usize,
    pub max_mutations: usize,
    pub max_score_value: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

/// Attempt to merge a forward and reverse read into a consensus contig.
/// Tries overlap lengths from the longest possible down to `min_overlap`,
/// accepting the first whose mismatch rate is within `max_mutations` scaled
/// to that overlap length (spec.md §4.B).
pub fn merge(
    fwd_seq: &[u8],
    fwd_qual: &[u8],
    rev_seq: &[u8],
    rev_qual: &[u8],
    params: &MergeParams,
) -> Option<Contig> {
    debug_assert_eq!(fwd_seq.len(), fwd_qual.len());
    debug_assert_eq!(rev_seq.len(), rev_qual.len());

    let rc_seq = crate::dna::reverse_complement(rev_seq);
    let rc_qual: Vec<u8> = rev_qual.iter().rev().copied().collect();

    let max_overlap = fwd_seq.len().min(rc_seq.len());
    if max_overlap < params.min_overlap {
        return None;
    }

    for overlap in (params.min_overlap..=max_overlap).rev() {
        let fwd_start = fwd_seq.len() - overlap;
        let fwd_window = &fwd_seq[fwd_start..];
        let rev_window = &rc_seq[..overlap];

        let mismatches = fwd_window
            .iter()
            .zip(rev_window.iter())
            .filter(|(a, b)| a != b)
            .count();

        let allowed_rate =
            params.max_mutations as f64 / params.min_overlap as f64;
        let observed_rate = mismatches as f64 / overlap as f64;
        if observed_rate > allowed_rate {
            continue;
        }

        let fwd_qual_window = &fwd_qual[fwd_start..];
        let rev_qual_window = &rc_qual[..overlap];
        let (cons_seq, cons_qual) = consensus(
            fwd_window,
            fwd_qual_window,
            rev_window,
            rev_qual_window,
            params.max_score_value,
        );
        return Some(Contig { seq: cons_seq, qual: cons_qual });
    }
    None
}

fn consensus(
    fwd: &[u8],
    fwd_qual: &[u8],
    rev: &[u8],
    rev_qual: &[u8],
    max_score_value: u8,
) -> (Vec<u8>, Vec<u8>) {
    let mut seq = Vec::with_capacity(fwd.len());
    let mut qual = Vec::with_capacity(fwd.len());
    for i in 0..fwd.len() {
        let (fb, fq) = (fwd[i], fwd_qual[i]);
        let (rb, rq) = (rev[i], rev_qual[i]);
        let (base, q) = if fb == rb {
            (fb, fq.saturating_add(rq))
        } else if fq >= rq {
            (fb, fq.saturating_sub(rq))
        } else {
            (rb, rq.saturating_sub(fq))
        };
        seq.push(base);
        qual.push(q.min(max_score_value));
    }
    (seq, qual)
}
