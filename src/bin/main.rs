//! Entry point: parse CLI arguments, build the experiment, run the
//! producer/consumer pipeline to completion, and report the final counters.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::bounded;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use log::info;

use selex_core::cli::SelexArgs;
use selex_core::cycle::Cycle;
use selex_core::experiment::{Experiment, ExperimentSnapshot};
use selex_core::logging;
use selex_core::pipeline::consumer;
use selex_core::pipeline::producer;
use selex_core::pipeline::QueueItem;
use selex_core::pool::AptamerPool;
use selex_core::RunConfig;

fn main() -> ExitCode {
    let args = SelexArgs::parse();
    if let Err(err) = logging::init(args.log_level(), args.log_filepath().map(|p| p.as_path())) {
        eprintln!("failed to initialize logging: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Cycle naming/round assignment lives outside the core's scope (spec.md
/// §1 "explicitly out of scope"); the binary derives one cycle per forward
/// file in per-file mode, or one per configured barcode otherwise.
fn cycle_count(config: &RunConfig) -> usize {
    if config.is_per_file {
        config.forward_files.len().max(1)
    } else {
        config
            .barcodes_5prime
            .len()
            .max(config.barcodes_3prime.len())
            .max(1)
    }
}

/// A ticking spinner reporting live processed/accepted counts, in the
/// style of the teacher's `util::get_spinner`.
fn get_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn run(args: SelexArgs) -> Result<()> {
    let started_at = Instant::now();
    let config = Arc::new(args.into_run_config());
    config.validate()?;

    let pool = Arc::new(AptamerPool::new());
    let cycles: Vec<Arc<Cycle>> = (0..cycle_count(&config))
        .map(|i| {
            Arc::new(Cycle::new(
                format!("cycle{i}"),
                i as u32,
                false,
                false,
                config.barcodes_5prime.get(i).cloned(),
                config.barcodes_3prime.get(i).cloned(),
                pool.clone(),
            ))
        })
        .collect();
    let experiment = Experiment::new(pool, cycles);

    let (sender, receiver): (
        crossbeam_channel::Sender<QueueItem>,
        crossbeam_channel::Receiver<QueueItem>,
    ) = bounded(config.blocking_queue_size);

    // spec §5's scheduling model: one core is reserved for the producer, so
    // the consumer pool is min(available cores, maxCores) - 1.
    let available_cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let consumer_count = available_cores.min(config.max_cores).saturating_sub(1).max(1);
    info!("starting pipeline with {consumer_count} consumer thread(s)");

    let producer_handle =
        producer::spawn(config.clone(), experiment.cycles().clone(), sender.clone())?;

    let consumer_handles: Vec<_> = (0..consumer_count)
        .map(|_| {
            consumer::spawn(
                config.clone(),
                experiment.cycles().clone(),
                experiment.metadata().clone(),
                experiment.progress().clone(),
                receiver.clone(),
                sender.clone(),
            )
        })
        .collect();

    drop(sender);
    drop(receiver);

    let done = Arc::new(AtomicBool::new(false));
    let monitor = {
        let progress = experiment.progress().clone();
        let done = done.clone();
        let spinner = get_spinner();
        std::thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                spinner.set_message(format!(
                    "processed={} accepted={}",
                    progress.processed(),
                    progress.accepted()
                ));
                std::thread::sleep(Duration::from_millis(100));
            }
            spinner.finish_and_clear();
        })
    };

    producer_handle
        .join()
        .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;
    for handle in consumer_handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?;
    }
    done.store(true, Ordering::Relaxed);
    let _ = monitor.join();

    experiment.finish();
    info!("run finished in {}", humantime::format_duration(started_at.elapsed()));
    report(&experiment.snapshot());
    Ok(())
}

fn report(snapshot: &ExperimentSnapshot) {
    info!(
        "processed={} accepted={} contigAssemblyFail={} invalidAlphabet={} \
         unmatched5Prime={} unmatched3Prime={} invalidCycle={} primerOverlaps={}",
        snapshot.processed,
        snapshot.accepted,
        snapshot.contig_assembly_fail,
        snapshot.invalid_alphabet,
        snapshot.unmatched_5prime,
        snapshot.unmatched_3prime,
        snapshot.invalid_cycle,
        snapshot.primer_overlaps,
    );
    // Busiest cycles first, mirroring the teacher's sorted error-count report.
    for cycle in snapshot.cycles.iter().sorted_by_key(|c| std::cmp::Reverse(c.unique_size)) {
        info!(
            "cycle {} (round {}): totalSize={} uniqueSize={}",
            cycle.name, cycle.round, cycle.total_size, cycle.unique_size
        );
    }
}
