//! Run configuration: the enumerated options of spec.md §6 plus the
//! construction-time validation spec.md §6 requires.

use std::path::PathBuf;

use crate::errs::{SelexError, SelexResult};

/// Which randomized-region length check applies, computed once from
/// whichever of `randomized_region_size` / the lower-upper pair was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeConstraint {
    Exact(usize),
    Range { lower: usize, upper: usize },
}

impl SizeConstraint {
    pub fn accepts(&self, len: usize) -> bool {
        match *self {
            SizeConstraint::Exact(n) => len == n,
            SizeConstraint::Range { lower, upper } => len >= lower && len <= upper,
        }
    }
}

/// Which of the three consumer branches applies (spec.md §4.H step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    Batch,
    RandomizedRegionOnly,
    Full,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub primer5: Vec<u8>,
    pub primer3: Option<Vec<u8>>,
    pub randomized_region_size: Option<usize>,
    pub randomized_region_size_lower_bound: Option<usize>,
    pub randomized_region_size_upper_bound: Option<usize>,
    pub is_per_file: bool,
    pub only_randomized_region_in_data: bool,
    pub batch_mode: bool,
    pub store_reverse_complement: bool,
    pub check_reverse_complement: bool,
    pub barcodes_5prime: Vec<Vec<u8>>,
    pub barcodes_3prime: Vec<Vec<u8>>,
    pub primer_tolerance: u32,
    pub barcode_tolerance: u32,
    pub paired_end_min_overlap: usize,
    pub paired_end_max_mutations: usize,
    pub paired_end_max_score_value: u8,
    pub blocking_queue_size: usize,
    pub max_cores: usize,
    pub forward_files: Vec<PathBuf>,
    pub reverse_files: Vec<PathBuf>,
}

impl RunConfig {
    /// Rejects the five construction-time problems spec.md §6 names, in
    /// the order they're listed there.
    pub fn validate(&self) -> SelexResult<()> {
        if self.primer5.is_empty() {
            return Err(SelexError::MissingPrimer5);
        }
        let has_primer3 = self.primer3.as_ref().is_some_and(|p| !p.is_empty());
        if self.randomized_region_size.is_none() && !has_primer3 {
            return Err(SelexError::NoSizeConstraint);
        }
        match (
            self.randomized_region_size_lower_bound,
            self.randomized_region_size_upper_bound,
        ) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(SelexError::IncompleteSizeRange)
            }
            (Some(lower), Some(upper)) if lower >= upper => {
                return Err(SelexError::InvalidSizeRange { lower, upper })
            }
            _ => {}
        }
        if self.forward_files.is_empty() {
            return Err(SelexError::NoInputFiles);
        }
        if !self.reverse_files.is_empty()
            && self.reverse_files.len() != self.forward_files.len()
        {
            return Err(SelexError::MismatchedFileLists {
                forward: self.forward_files.len(),
                reverse: self.reverse_files.len(),
            });
        }
        Ok(())
    }

    pub fn size_constraint(&self) -> Option<SizeConstraint> {
        if let Some(exact) = self.randomized_region_size {
            return Some(SizeConstraint::Exact(exact));
        }
        match (
            self.randomized_region_size_lower_bound,
            self.randomized_region_size_upper_bound,
        ) {
            (Some(lower), Some(upper)) => Some(SizeConstraint::Range { lower, upper }),
            _ => None,
        }
    }

    pub fn mode(&self) -> ExtractionMode {
        if self.batch_mode {
            ExtractionMode::Batch
        } else if self.only_randomized_region_in_data {
            ExtractionMode::RandomizedRegionOnly
        } else {
            ExtractionMode::Full
        }
    }

    pub fn is_paired_end(&self) -> bool {
        !self.reverse_files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> RunConfig {
        RunConfig {
            primer5: b"ACGT".to_vec(),
            primer3: Some(b"TTTT".to_vec()),
            randomized_region_size: None,
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
            blocking_queue_size: 1000,
            max_cores: 4,
            forward_files: vec![PathBuf::from("r1.fastq")],
            reverse_files: Vec::new(),
        }
    }

    #[test]
    fn rejects_missing_primer5() {
        let mut config = base_config();
        config.primer5.clear();
        assert!(matches!(config.validate(), Err(SelexError::MissingPrimer5)));
    }

    #[test]
    fn rejects_no_size_constraint() {
        let mut config = base_config();
        config.primer3 = None;
        assert!(matches!(config.validate(), Err(SelexError::NoSizeConstraint)));
    }

    #[test]
    fn rejects_incomplete_size_range() {
        let mut config = base_config();
        config.randomized_region_size_lower_bound = Some(4);
        assert!(matches!(
            config.validate(),
            Err(SelexError::IncompleteSizeRange)
        ));
    }

    #[test]
    fn rejects_inverted_size_range() {
        let mut config = base_config();
        config.randomized_region_size_lower_bound = Some(10);
        config.randomized_region_size_upper_bound = Some(4);
        assert!(matches!(
            config.validate(),
            Err(SelexError::InvalidSizeRange { lower: 10, upper: 4 })
        ));
    }

    #[test]
    fn rejects_mismatched_file_lists() {
        let mut config = base_config();
        config.reverse_files = vec![PathBuf::from("a.fastq"), PathBuf::from("b.fastq")];
        assert!(matches!(
            config.validate(),
            Err(SelexError::MismatchedFileLists { forward: 1, reverse: 2 })
        ));
    }

    #[test]
    fn accepts_well_formed_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn size_constraint_prefers_exact() {
        let mut config = base_config();
        config.randomized_region_size = Some(8);
        config.randomized_region_size_lower_bound = Some(4);
        config.randomized_region_size_upper_bound = Some(12);
        assert_eq!(config.size_constraint(), Some(SizeConstraint::Exact(8)));
    }
}
