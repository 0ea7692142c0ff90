//! Read reader: component F.
//!
//! Lazily yields read records from a forward file, optionally paired with a
//! reverse file. Gzip is detected transparently by sniffing the first two
//! magic bytes rather than by trial decode-and-rewind, so the reader also
//! works on non-seekable sources.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use bio::io::fastq;
use flate2::read::MultiGzDecoder;

use crate::errs::{SelexError, SelexResult};

/// Tagged reader-format enumeration (spec.md §9). Only FASTQ is
/// implemented; FASTA is named here as the documented future sibling and is
/// out of scope per spec.md §1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKind {
    Fastq,
}

/// One forward (and optionally reverse) read, before the producer attaches
/// source paths and selection-cycle assignment (spec.md §3).
#[derive(Debug, Clone)]
pub struct RawRead {
    pub forward_seq: Vec<u8>,
    pub forward_qual: Vec<u8>,
    pub reverse_seq: Option<Vec<u8>>,
    pub reverse_qual: Option<Vec<u8>>,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn open_sniffed(path: &Path) -> SelexResult<Box<dyn Read + Send>> {
    let file = File::open(path).map_err(|source| SelexError::ReaderConstruction {
        path: path.to_path_buf(),
        source,
    })?;
    let mut buffered = BufReader::new(file);
    let is_gzip = {
        let peek = buffered.fill_buf().map_err(|source| {
            SelexError::ReaderConstruction { path: path.to_path_buf(), source }
        })?;
        peek.len() >= 2 && peek[..2] == GZIP_MAGIC
    };
    if is_gzip {
        Ok(Box::new(MultiGzDecoder::new(buffered)))
    } else {
        Ok(Box::new(buffered))
    }
}

type FastqRecords = fastq::Records<Box<dyn Read + Send>>;

/// FASTQ variant of the reader plugin contract: `(forwardPath, optional
/// reversePath) -> nextRead()/close()` (spec.md §6).
pub struct FastqReader {
    forward_path: PathBuf,
    reverse_path: Option<PathBuf>,
    forward: FastqRecords,
    reverse: Option<FastqRecords>,
}

impl FastqReader {
    pub fn open(
        forward_path: &Path,
        reverse_path: Option<&Path>,
    ) -> SelexResult<Self> {
        let forward = fastq::Reader::new(open_sniffed(forward_path)?).records();
        let reverse = match reverse_path {
            Some(p) => Some(fastq::Reader::new(open_sniffed(p)?).records()),
            None => None,
        };
        Ok(Self {
            forward_path: forward_path.to_path_buf(),
            reverse_path: reverse_path.map(|p| p.to_path_buf()),
            forward,
            reverse,
        })
    }

    pub fn next_read(&mut self) -> SelexResult<Option<RawRead>> {
        let forward_record = match self.forward.next() {
            None => return Ok(None),
            Some(record) => record.map_err(|_| SelexError::TruncatedRecord {
                path: self.forward_path.clone(),
                detail: "malformed forward FASTQ record",
            })?,
        };

        let (reverse_seq, reverse_qual) = match self.reverse.as_mut() {
            None => (None, None),
            Some(reverse_records) => {
                let reverse_record = reverse_records.next().ok_or_else(|| {
                    SelexError::TruncatedRecord {
                        path: self
                            .reverse_path
                            .clone()
                            .unwrap_or_default(),
                        detail: "reverse file exhausted before forward file",
                    }
                })?;
                let reverse_record =
                    reverse_record.map_err(|_| SelexError::TruncatedRecord {
                        path: self.reverse_path.clone().unwrap_or_default(),
                        detail: "malformed reverse FASTQ record",
                    })?;
                (
                    Some(reverse_record.seq().to_vec()),
                    Some(reverse_record.qual().to_vec()),
                )
            }
        };

        Ok(Some(RawRead {
            forward_seq: forward_record.seq().to_vec(),
            forward_qual: forward_record.qual().to_vec(),
            reverse_seq,
            reverse_qual,
        }))
    }

    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fastq(path: &Path, records: &[(&str, &str, &str)]) {
        let mut file = File::create(path).unwrap();
        for (header, seq, qual) in records {
            writeln!(file, "@{header}\n{seq}\n+\n{qual}").unwrap();
        }
    }

    #[test]
    fn reads_single_end_records() {
        let dir = tempfile::tempdir().unwrap();
        let fwd_path = dir.path().join("r1.fastq");
        write_fastq(&fwd_path, &[("r1", "ACGT", "IIII"), ("r2", "TTTT", "####")]);

        let mut reader = FastqReader::open(&fwd_path, None).unwrap();
        let r1 = reader.next_read().unwrap().unwrap();
        assert_eq!(r1.forward_seq, b"ACGT");
        assert_eq!(r1.forward_qual, b"IIII");
        assert!(r1.reverse_seq.is_none());

        let r2 = reader.next_read().unwrap().unwrap();
        assert_eq!(r2.forward_seq, b"TTTT");

        assert!(reader.next_read().unwrap().is_none());
    }

    #[test]
    fn reads_paired_end_records() {
        let dir = tempfile::tempdir().unwrap();
        let fwd_path = dir.path().join("r1.fastq");
        let rev_path = dir.path().join("r2.fastq");
        write_fastq(&fwd_path, &[("r1", "ACGT", "IIII")]);
        write_fastq(&rev_path, &[("r1", "TTTT", "####")]);

        let mut reader = FastqReader::open(&fwd_path, Some(&rev_path)).unwrap();
        let r1 = reader.next_read().unwrap().unwrap();
        assert_eq!(r1.forward_seq, b"ACGT");
        assert_eq!(r1.reverse_seq.unwrap(), b"TTTT");
    }

    #[test]
    fn sniffs_gzip_transparently() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r1.fastq.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        write!(encoder, "@r1\nACGT\n+\nIIII\n").unwrap();
        encoder.finish().unwrap();

        let mut reader = FastqReader::open(&path, None).unwrap();
        let r1 = reader.next_read().unwrap().unwrap();
        assert_eq!(r1.forward_seq, b"ACGT");
    }
}
