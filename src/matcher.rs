//! Approximate (Hamming-distance) primer/barcode locator: component A.
//!
//! `find` is the public contract from spec.md §4.A. Needles short enough to
//! fit a machine word use the bit-parallel Myers automaton from `bio`;
//! longer needles fall back to a direct bounded scan, since long primers are
//! rare and performance is not critical for them.

use bio::pattern_matching::myers::Myers;

/// Needles up to this length use the bit-parallel path (`Myers<u64>`).
pub const BITPARALLEL_MAX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub index: usize,
    pub errors: u32,
}

/// Locate `needle` in `haystack[start..end]` with at most `max_errors`
/// mismatches (no indels). Returns the true mismatch count at the returned
/// index.
pub fn find(
    haystack: &[u8],
    needle: &[u8],
    max_errors: u32,
    start: usize,
    end: usize,
) -> Option<MatchResult> {
    let end = end.min(haystack.len());
    if start >= end || needle.is_empty() || needle.len() > end - start {
        return None;
    }
    let window = &haystack[start..end];
    let hit = if needle.len() <= BITPARALLEL_MAX_LEN {
        find_bitparallel(window, needle, max_errors)
    } else {
        find_naive(window, needle, max_errors)
    };
    hit.map(|m| MatchResult { index: m.index + start, errors: m.errors })
}

/// Search the reversed `contig` with the reversed `needle`, then translate
/// the hit back to the original orientation. Used to anchor the 5' primer
/// search near the 3' end of the read, per spec.md §4.A.
pub fn find_reversed(
    contig: &[u8],
    needle: &[u8],
    max_errors: u32,
) -> Option<MatchResult> {
    let rev_contig: Vec<u8> = contig.iter().rev().copied().collect();
    let rev_needle: Vec<u8> = needle.iter().rev().copied().collect();
    let hit = find(&rev_contig, &rev_needle, max_errors, 0, rev_contig.len())?;
    let index = contig.len().checked_sub(hit.index + needle.len())?;
    Some(MatchResult { index, errors: hit.errors })
}

fn find_bitparallel(
    haystack: &[u8],
    needle: &[u8],
    max_errors: u32,
) -> Option<MatchResult> {
    let myers = Myers::<u64>::new(needle);
    let max_dist = max_errors.min(u8::MAX as u32) as u8;
    let mut best_end: Option<(usize, u32)> = None;
    for (end, dist) in myers.find_all_lazy(haystack, max_dist) {
        let dist = dist as u32;
        if best_end.map_or(true, |(_, best_dist)| dist < best_dist) {
            best_end = Some((end, dist));
        }
    }
    let (end, _) = best_end?;
    locate_start(haystack, needle, end, max_errors)
}

/// Refine a bit-parallel hit that reports an *end* position into the true
/// leftmost-minimal starting index. Per spec.md §9, the refinement probes
/// only the left neighbourhood (`start-1, start-2, ..., start-(maxErrors-1)`)
/// in addition to the initially reported start — this asymmetry is
/// intentional and must be preserved.
fn locate_start(
    haystack: &[u8],
    needle: &[u8],
    end: usize,
    max_errors: u32,
) -> Option<MatchResult> {
    let initial_start = end.checked_sub(needle.len())?;
    let mut candidates = vec![initial_start];
    for offset in 1..max_errors.max(1) {
        if let Some(c) = initial_start.checked_sub(offset as usize) {
            candidates.push(c);
        }
    }
    candidates.sort_unstable();
    candidates.dedup();

    let mut best: Option<MatchResult> = None;
    for idx in candidates {
        if idx + needle.len() > haystack.len() {
            continue;
        }
        let errors = hamming(&haystack[idx..idx + needle.len()], needle);
        if errors <= max_errors
            && best.map_or(true, |b| errors < b.errors)
        {
            best = Some(MatchResult { index: idx, errors });
        }
    }
    best
}

/// Bounded Hamming scan for needles longer than [`BITPARALLEL_MAX_LEN`].
/// Any well-defined bounded search satisfies the contract; this one is a
/// straightforward left-to-right scan that stops early on an exact match.
fn find_naive(
    haystack: &[u8],
    needle: &[u8],
    max_errors: u32,
) -> Option<MatchResult> {
    if needle.len() > haystack.len() {
        return None;
    }
    let mut best: Option<MatchResult> = None;
    for idx in 0..=(haystack.len() - needle.len()) {
        let errors = hamming(&haystack[idx..idx + needle.len()], needle);
        if errors <= max_errors && best.map_or(true, |b| errors < b.errors) {
            best = Some(MatchResult { index: idx, errors });
            if errors == 0 {
                break;
            }
        }
    }
    best
}

#[inline]
fn hamming(a: &[u8], b: &[u8]) -> u32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).filter(|(x, y)| x != y).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_found() {
        let hit = find(b"NNNNACGTNNNN", b"ACGT", 0, 0, 12).unwrap();
        assert_eq!(hit.index, 4);
        assert_eq!(hit.errors, 0);
    }

    #[test]
    fn within_tolerance_is_found() {
        // ACGT with one mismatch embedded: AGGT
        let hit = find(b"NNNAGGTNNN", b"ACGT", 1, 0, 10).unwrap();
        assert_eq!(hit.index, 3);
        assert_eq!(hit.errors, 1);
    }

    #[test]
    fn over_tolerance_is_none() {
        assert!(find(b"NNNAGGANNN", b"ACGT", 1, 0, 10).is_none());
    }

    #[test]
    fn leftmost_minimal_wins_ties() {
        // Two exact occurrences of "AC" -- leftmost must win.
        let hit = find(b"ACNNACNN", b"AC", 0, 0, 8).unwrap();
        assert_eq!(hit.index, 0);
        assert_eq!(hit.errors, 0);
    }

    #[test]
    fn reversed_search_anchors_5prime() {
        let contig = b"NNNNACGT";
        let hit = find_reversed(contig, b"ACGT", 0).unwrap();
        assert_eq!(hit.index, 4);
        assert_eq!(hit.errors, 0);
    }

    #[test]
    fn long_needle_uses_naive_path() {
        let needle = vec![b'A'; 70];
        let mut haystack = vec![b'T'; 10];
        haystack.extend_from_slice(&needle);
        haystack.extend(vec![b'T'; 10]);
        let hit = find(&haystack, &needle, 0, 0, haystack.len()).unwrap();
        assert_eq!(hit.index, 10);
        assert_eq!(hit.errors, 0);
    }

    /// Property: any reported hit's error count equals the true Hamming
    /// distance at that index, and never exceeds max_errors.
    #[test]
    fn reported_errors_match_true_distance() {
        let haystack = b"ACGTACGTTTACGGTACGTN";
        let needle = b"ACGT";
        for max_errors in 0..=3 {
            if let Some(hit) =
                find(haystack, needle, max_errors, 0, haystack.len())
            {
                let window = &haystack[hit.index..hit.index + needle.len()];
                assert_eq!(hit.errors, hamming(window, needle));
                assert!(hit.errors <= max_errors);
            }
        }
    }
}
