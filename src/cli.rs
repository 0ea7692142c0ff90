//! Command-line surface: a `clap`-derive `Args` struct that binds directly
//! onto [`RunConfig`], in the style of the teacher's `ExtractMods`.

use std::path::PathBuf;
use std::thread;

use clap::Parser;
use log::LevelFilter;

use crate::config::RunConfig;

fn split_list(raw: &str) -> Vec<Vec<u8>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.as_bytes().to_vec())
        .collect()
}

#[derive(Parser)]
#[command(name = "selex-core", about = "Demultiplex and count aptamer SELEX reads")]
pub struct SelexArgs {
    /// Forward-read FASTQ file(s), optionally gzip-compressed. One per
    /// selection cycle in per-file mode.
    #[arg(long = "forward", required = true, num_args = 1..)]
    forward_files: Vec<PathBuf>,

    /// Reverse-read FASTQ file(s) for paired-end input, positionally
    /// matched to `--forward`.
    #[arg(long = "reverse", num_args = 1..)]
    reverse_files: Vec<PathBuf>,

    /// Required 5' primer sequence.
    #[arg(long)]
    primer5: String,

    /// Optional 3' primer sequence.
    #[arg(long)]
    primer3: Option<String>,

    /// Exact randomized-region length. Takes precedence over the
    /// lower/upper bound pair when set.
    #[arg(long)]
    rr_size: Option<usize>,

    /// Randomized-region lower length bound (requires `--rr-upper`).
    #[arg(long)]
    rr_lower: Option<usize>,

    /// Randomized-region upper length bound (requires `--rr-lower`).
    #[arg(long)]
    rr_upper: Option<usize>,

    /// Assign cycles by file position instead of by barcode demultiplexing.
    #[arg(long, default_value_t = false)]
    per_file: bool,

    /// Input already contains only the randomized region (primers are
    /// synthesized around it rather than searched for).
    #[arg(long, default_value_t = false)]
    rr_only: bool,

    /// Batch mode: the whole read is the randomized region.
    #[arg(long, default_value_t = false)]
    batch: bool,

    /// Store the reverse complement of the extracted sequence instead of
    /// the sequence as matched.
    #[arg(long, default_value_t = false)]
    store_rc: bool,

    /// Retry a failed extraction on the contig's reverse complement.
    #[arg(long, default_value_t = false)]
    check_rc: bool,

    /// Comma-separated 5' demultiplexing barcodes, one per cycle.
    #[arg(long, value_delimiter = ',')]
    barcodes5: Vec<String>,

    /// Comma-separated 3' demultiplexing barcodes, one per cycle.
    #[arg(long, value_delimiter = ',')]
    barcodes3: Vec<String>,

    /// Maximum mismatches tolerated in a primer match.
    #[arg(long, default_value_t = 1)]
    primer_tolerance: u32,

    /// Maximum mismatches tolerated in a barcode match.
    #[arg(long, default_value_t = 1)]
    barcode_tolerance: u32,

    /// Minimum paired-end overlap length.
    #[arg(long, default_value_t = 10)]
    min_overlap: usize,

    /// Maximum mismatches allowed in the paired-end overlap, scaled by
    /// `min_overlap` (spec.md §4.B).
    #[arg(long, default_value_t = 0)]
    max_mutations: usize,

    /// Quality score cap applied to the paired-end consensus.
    #[arg(long, default_value_t = 40)]
    max_score_value: u8,

    /// Capacity of the bounded producer/consumer queue.
    #[arg(long, default_value_t = 10_000)]
    queue_size: usize,

    /// Maximum consumer threads (clamped to the available CPU count).
    #[arg(long, default_value_t = num_cpus_fallback())]
    max_cores: usize,

    /// Path to write a run log file, in addition to console output.
    #[arg(long)]
    log_filepath: Option<PathBuf>,

    /// Log verbosity.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn num_cpus_fallback() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

impl SelexArgs {
    pub fn log_filepath(&self) -> Option<&PathBuf> {
        self.log_filepath.as_ref()
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn into_run_config(self) -> RunConfig {
        RunConfig {
            primer5: self.primer5.into_bytes(),
            primer3: self.primer3.map(String::into_bytes),
            randomized_region_size: self.rr_size,
            randomized_region_size_lower_bound: self.rr_lower,
            randomized_region_size_upper_bound: self.rr_upper,
            is_per_file: self.per_file,
            only_randomized_region_in_data: self.rr_only,
            batch_mode: self.batch,
            store_reverse_complement: self.store_rc,
            check_reverse_complement: self.check_rc,
            barcodes_5prime: self
                .barcodes5
                .iter()
                .flat_map(|s| split_list(s))
                .collect(),
            barcodes_3prime: self
                .barcodes3
                .iter()
                .flat_map(|s| split_list(s))
                .collect(),
            primer_tolerance: self.primer_tolerance,
            barcode_tolerance: self.barcode_tolerance,
            paired_end_min_overlap: self.min_overlap,
            paired_end_max_mutations: self.max_mutations,
            paired_end_max_score_value: self.max_score_value,
            blocking_queue_size: self.queue_size,
            max_cores: self.max_cores,
            forward_files: self.forward_files,
            reverse_files: self.reverse_files,
        }
    }
}
