//! Concurrent producer/consumer core for processing aptamer SELEX reads:
//! contig assembly, approximate primer/barcode matching, randomized-region
//! extraction, and concurrent pool/cycle/metadata bookkeeping.

pub mod cli;
pub mod config;
pub mod cycle;
pub mod dna;
pub mod errs;
pub mod experiment;
pub mod logging;
pub mod matcher;
pub mod merger;
pub mod metadata;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod reader;

pub use config::RunConfig;
pub use errs::{SelexError, SelexResult};
pub use experiment::{Experiment, ExperimentSnapshot};
