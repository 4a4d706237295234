//! Row-selection masks aligned with a partitioned table.

use arrow::array::{Array, BooleanArray};
use arrow::compute::kernels::boolean;
use arrow::compute::prep_null_mask_filter;

use crate::{Error, Result};

/// Boolean row mask, one array per partition of the table it was computed
/// against. Masks never hold nulls: an unknown predicate result is stored
/// as unselected.
///
/// `generation` records which version of the owning store the mask was
/// evaluated over; stores refuse masks from an older generation.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMask {
    generation: u64,
    partitions: Vec<BooleanArray>,
}

impl RowMask {
    pub fn new(partitions: Vec<Vec<bool>>) -> Self {
        Self::from_arrays(partitions.into_iter().map(BooleanArray::from).collect())
    }

    /// Build from evaluated predicate arrays; nulls become false.
    pub fn from_arrays(partitions: Vec<BooleanArray>) -> Self {
        let partitions = partitions
            .into_iter()
            .map(|p| if p.null_count() > 0 { prep_null_mask_filter(&p) } else { p })
            .collect();
        Self { generation: 0, partitions }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn partitions(&self) -> &[BooleanArray] {
        &self.partitions
    }

    pub fn partition_lens(&self) -> Vec<usize> {
        self.partitions.iter().map(Array::len).collect()
    }

    /// Total number of rows covered.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(Array::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of selected rows.
    pub fn count_selected(&self) -> usize {
        self.partitions.iter().map(BooleanArray::true_count).sum()
    }

    /// Rows selected by both masks.
    pub fn and(&self, other: &RowMask) -> Result<RowMask> {
        if self.partition_lens() != other.partition_lens() {
            return Err(Error::ValueError(format!(
                "row masks are not aligned: {:?} vs {:?}",
                self.partition_lens(),
                other.partition_lens()
            )));
        }
        let partitions = self
            .partitions
            .iter()
            .zip(&other.partitions)
            .map(|(a, b)| boolean::and(a, b))
            .collect::<std::result::Result<_, _>>()?;
        Ok(RowMask { generation: self.generation, partitions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_logic() {
        let a = RowMask::new(vec![vec![true, false], vec![true]]);
        let b = RowMask::new(vec![vec![false, false], vec![true]]);
        let both = a.and(&b).unwrap();
        assert_eq!(both.count_selected(), 1);
        assert_eq!(both, RowMask::new(vec![vec![false, false], vec![true]]));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_unknown_rows_are_unselected() {
        let mask = RowMask::from_arrays(vec![BooleanArray::from(vec![Some(true), None, Some(false)])]);
        assert_eq!(mask, RowMask::new(vec![vec![true, false, false]]));
        assert_eq!(mask.count_selected(), 1);
    }

    #[test]
    fn test_misaligned_masks() {
        let a = RowMask::new(vec![vec![true, false]]);
        let b = RowMask::new(vec![vec![true], vec![false]]);
        assert!(a.and(&b).is_err());
    }
}
