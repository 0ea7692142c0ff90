//! Eight independent atomic progress counters (spec.md §3/§9). Deliberately
//! not bundled under a single lock.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct ProgressCounters {
    pub processed: AtomicU64,
    pub accepted: AtomicU64,
    pub contig_assembly_fail: AtomicU64,
    pub invalid_alphabet: AtomicU64,
    pub unmatched_5prime: AtomicU64,
    pub unmatched_3prime: AtomicU64,
    pub invalid_cycle: AtomicU64,
    pub primer_overlaps: AtomicU64,
}

macro_rules! counter_accessors {
    ($($field:ident => $inc:ident, $get:ident);+ $(;)?) => {
        $(
            pub fn $inc(&self) {
                self.$field.fetch_add(1, Ordering::SeqCst);
            }
            pub fn $get(&self) -> u64 {
                self.$field.load(Ordering::SeqCst)
            }
        )+
    };
}

impl ProgressCounters {
    counter_accessors! {
        processed => inc_processed, processed;
        accepted => inc_accepted, accepted;
        contig_assembly_fail => inc_contig_assembly_fail, contig_assembly_fail;
        invalid_alphabet => inc_invalid_alphabet, invalid_alphabet;
        unmatched_5prime => inc_unmatched_5prime, unmatched_5prime;
        unmatched_3prime => inc_unmatched_3prime, unmatched_3prime;
        invalid_cycle => inc_invalid_cycle, invalid_cycle;
        primer_overlaps => inc_primer_overlaps, primer_overlaps;
    }

    /// Undo a previously incremented classification counter. Used by the
    /// reverse-complement retry so that at most one error is ultimately
    /// attributed per read (spec.md §4.H).
    pub fn dec_unmatched_5prime(&self) {
        self.unmatched_5prime.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn dec_unmatched_3prime(&self) {
        self.unmatched_3prime.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn dec_invalid_cycle(&self) {
        self.invalid_cycle.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn dec_invalid_alphabet(&self) {
        self.invalid_alphabet.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn dec_contig_assembly_fail(&self) {
        self.contig_assembly_fail.fetch_sub(1, Ordering::SeqCst);
    }

    /// spec.md §8 property 1: `processed = accepted + Sum(error counters)`.
    pub fn error_total(&self) -> u64 {
        self.contig_assembly_fail()
            + self.invalid_alphabet()
            + self.unmatched_5prime()
            + self.unmatched_3prime()
            + self.invalid_cycle()
            + self.primer_overlaps()
    }
}
