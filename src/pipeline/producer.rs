//! Producer: component G.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;
use log::{info, warn};

use crate::config::RunConfig;
use crate::cycle::CycleList;
use crate::errs::SelexResult;
use crate::reader::FastqReader;

use super::{PendingRead, QueueItem};

/// Drives every configured forward/reverse file pair through a
/// [`FastqReader`], enqueuing one [`QueueItem::Read`] per record and
/// finishing with a single [`QueueItem::EndOfStream`] (spec.md §4.G).
///
/// In per-file mode the producer is the sole writer of a read's assigned
/// cycle, set to the cycle at the same index as the file pair; in
/// multiplexed mode the consumer assigns it later via barcode demux.
pub fn spawn(
    config: Arc<RunConfig>,
    cycles: CycleList,
    sender: Sender<QueueItem>,
) -> SelexResult<thread::JoinHandle<()>> {
    config.validate()?;
    let handle = thread::spawn(move || {
        for (file_index, forward_path) in config.forward_files.iter().enumerate() {
            let reverse_path = config.reverse_files.get(file_index).cloned();
            let mut reader = match FastqReader::open(
                forward_path,
                reverse_path.as_deref(),
            ) {
                Ok(reader) => reader,
                Err(err) => {
                    warn!(
                        "skipping unreadable input {}: {err}",
                        forward_path.display()
                    );
                    continue;
                }
            };

            let assigned_cycle = if config.is_per_file {
                cycles.get(file_index).cloned()
            } else {
                None
            };

            let mut source = vec![forward_path.clone()];
            if let Some(reverse_path) = &reverse_path {
                source.push(reverse_path.clone());
            }

            loop {
                match reader.next_read() {
                    Ok(None) => break,
                    Ok(Some(raw)) => {
                        let pending = PendingRead {
                            forward_seq: raw.forward_seq,
                            forward_qual: raw.forward_qual,
                            reverse_seq: raw.reverse_seq,
                            reverse_qual: raw.reverse_qual,
                            source: source.clone(),
                            assigned_cycle: assigned_cycle.clone(),
                        };
                        if sender.send(QueueItem::Read(pending)).is_err() {
                            // Every consumer has hung up; nothing left to do.
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(
                            "stopping on truncated input {}: {err}",
                            forward_path.display()
                        );
                        break;
                    }
                }
            }
            reader.close();
        }
        info!("producer exhausted all configured input files");
        let _ = sender.send(QueueItem::EndOfStream);
    });
    Ok(handle)
}
