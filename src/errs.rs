use std::path::PathBuf;

use thiserror::Error;

/// Fatal, process-level errors. Per-read problems are never represented
/// here; they are tallied in [`crate::progress::ProgressCounters`] instead.
#[derive(Error, Debug)]
pub enum SelexError {
    #[error("missing required 5' primer")]
    MissingPrimer5,
    #[error(
        "randomized region size is unconstrained: provide either an exact \
         size or a 3' primer"
    )]
    NoSizeConstraint,
    #[error(
        "randomized region bounds require both a lower and an upper bound, \
         only one was given"
    )]
    IncompleteSizeRange,
    #[error(
        "randomized region lower bound ({lower}) must be less than the \
         upper bound ({upper})"
    )]
    InvalidSizeRange { lower: usize, upper: usize },
    #[error(
        "forward file list ({forward}) and reverse file list ({reverse}) \
         have different lengths"
    )]
    MismatchedFileLists { forward: usize, reverse: usize },
    #[error("no forward files were provided")]
    NoInputFiles,
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("failed to open reader for {path}: {source}")]
    ReaderConstruction { path: PathBuf, source: std::io::Error },
    #[error("truncated FASTQ record in {path}: {detail}")]
    TruncatedRecord { path: PathBuf, detail: &'static str },
}

pub type SelexResult<T> = Result<T, SelexError>;
