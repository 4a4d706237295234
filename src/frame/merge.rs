//! Outer join of two tables on their shared columns.
//!
//! This is the consolidation primitive of the property stores: every
//! ingested batch is folded into the running table with
//! `store.outer_merge(&batch)`.
//!
//! Semantics:
//! - join keys are *all* columns the two tables share;
//! - a missing key matches a missing key;
//! - matching rows pair up many-to-many;
//! - unmatched rows from either side survive with the other side's
//!   columns left missing (Arrow nulls, so every dtype is kept as is);
//! - a shared column whose dtypes differ is unified to their supertype,
//!   and the join fails with a `CastError` if a value would not survive
//!   that conversion exactly.
//!
//! The join runs as a hash build over the right table and a lookup pass
//! over the left, producing two take vectors; the output columns are then
//! gathered with Arrow's `take` kernel.

use arrow::array::{ArrayRef, BooleanArray};
use arrow::compute::kernels::zip::zip;
use hashbrown::{HashMap, HashSet};

use crate::model::ColumnData;
use crate::{Error, Result};
use super::{DataFrame, RowKey};

impl DataFrame {
    /// Outer-join `other` into `self` on all shared columns and partition
    /// the result into `npartitions`.
    pub fn outer_merge(&self, other: &DataFrame, npartitions: usize) -> Result<DataFrame> {
        let common: Vec<&str> = self
            .column_names()
            .into_iter()
            .filter(|n| other.contains(n))
            .collect();
        if common.is_empty() {
            return Err(Error::ValueError("no common columns to merge on".into()));
        }

        let mut left_cols = self.gather()?;
        let mut right_cols = other.gather()?;

        // Unify dtypes of the join keys.
        let mut keys = HashSet::with_capacity(common.len());
        for name in &common {
            let l = self.position(name)?;
            let r = other.position(name)?;
            let (ld, rd) = (left_cols[l].dtype(), right_cols[r].dtype());
            let unified = ld.supertype(rd).ok_or_else(|| Error::TypeError {
                expected: ld.name().into(),
                got: format!("{} for column '{name}'", rd.name()),
            })?;
            left_cols[l] = left_cols[l].cast(unified)?;
            right_cols[r] = right_cols[r].cast(unified)?;
            keys.insert(*name);
        }

        let left_pos: Vec<usize> = common.iter().map(|n| self.position(n)).collect::<Result<_>>()?;
        let right_pos: Vec<usize> = common.iter().map(|n| other.position(n)).collect::<Result<_>>()?;
        let key_of = |cols: &[ColumnData], positions: &[usize], i: usize| -> RowKey {
            positions.iter().map(|&c| cols[c].key(i)).collect()
        };

        // Build side: right rows by key.
        let right_rows = other.num_rows();
        let mut right_index: HashMap<RowKey, Vec<usize>> = HashMap::with_capacity(right_rows);
        for r in 0..right_rows {
            right_index.entry(key_of(&right_cols, &right_pos, r)).or_default().push(r);
        }

        // Row pairing: left order first, then unmatched right rows.
        let mut left_take: Vec<Option<usize>> = Vec::new();
        let mut right_take: Vec<Option<usize>> = Vec::new();
        let mut right_matched = vec![false; right_rows];
        for l in 0..self.num_rows() {
            match right_index.get(&key_of(&left_cols, &left_pos, l)) {
                Some(matches) => {
                    for &r in matches {
                        left_take.push(Some(l));
                        right_take.push(Some(r));
                        right_matched[r] = true;
                    }
                }
                None => {
                    left_take.push(Some(l));
                    right_take.push(None);
                }
            }
        }
        for (r, matched) in right_matched.iter().enumerate() {
            if !matched {
                left_take.push(None);
                right_take.push(Some(r));
            }
        }

        let left_present: BooleanArray = left_take.iter().map(|l| Some(l.is_some())).collect();
        let mut columns: Vec<(String, ColumnData)> = Vec::with_capacity(self.num_columns() + other.num_columns());
        for (pos, field) in self.fields.iter().enumerate() {
            let left = left_cols[pos].take(&left_take)?;
            let data = if keys.contains(field.name.as_str()) {
                let right = right_cols[other.position(&field.name)?].take(&right_take)?;
                coalesce(&left_present, &left, &right)?
            } else {
                left
            };
            columns.push((field.name.clone(), data));
        }
        for (pos, field) in other.fields.iter().enumerate() {
            if !self.contains(&field.name) {
                columns.push((field.name.clone(), right_cols[pos].take(&right_take)?));
            }
        }

        DataFrame::from_columns(columns, npartitions)
    }
}

/// Join-key column: the left value where the left row exists, else the right.
fn coalesce(left_present: &BooleanArray, left: &ColumnData, right: &ColumnData) -> Result<ColumnData> {
    let merged: ArrayRef = zip(left_present, left.array(), right.array())?;
    Ok(ColumnData::wrap(left.dtype(), merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Field;
    use crate::model::{DType, Value};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_combines_matching_keys() {
        let left = DataFrame::new(vec![
            ("id", ColumnData::from(vec![1i64, 2])),
            ("a", ColumnData::from(vec![10i64, 20])),
        ])
        .unwrap();
        let right = DataFrame::new(vec![
            ("id", ColumnData::from(vec![2i64, 3])),
            ("b", ColumnData::from(vec!["x", "y"])),
        ])
        .unwrap();
        let merged = left.outer_merge(&right, 2).unwrap();
        assert_eq!(merged.column_names(), vec!["id", "a", "b"]);
        assert_eq!(merged.num_rows(), 3);
        assert_eq!(merged.npartitions(), 2);
        assert_eq!(
            merged.rows(),
            vec![
                vec![Value::Int(1), Value::Int(10), Value::Null],
                vec![Value::Int(2), Value::Int(20), Value::from("x")],
                vec![Value::Int(3), Value::Null, Value::from("y")],
            ]
        );
        // "a" gained a missing value and is still an integer column.
        assert_eq!(merged.dtype("a"), Some(DType::Int64));
    }

    #[test]
    fn test_merge_keeps_large_integers_exact() {
        let big = (1i64 << 53) + 1;
        let left = DataFrame::new(vec![
            ("id", ColumnData::from(vec![1i64])),
            ("ts", ColumnData::from(vec![big])),
        ])
        .unwrap();
        let right = DataFrame::new(vec![("id", ColumnData::from(vec![2i64]))]).unwrap();
        let merged = left.outer_merge(&right, 1).unwrap();
        assert_eq!(merged.column("ts").unwrap(), ColumnData::from(vec![Some(big), None]));
    }

    #[test]
    fn test_merge_unifies_shared_dtypes() {
        let left = DataFrame::new(vec![
            ("id", ColumnData::from(vec![1i64])),
            ("a", ColumnData::from(vec![5i32])),
        ])
        .unwrap();
        let right = DataFrame::new(vec![
            ("id", ColumnData::from(vec![1i32])),
            ("b", ColumnData::from(vec![true])),
        ])
        .unwrap();
        let merged = left.outer_merge(&right, 1).unwrap();
        assert_eq!(merged.dtype("id"), Some(DType::Int64));
        assert_eq!(merged.dtype("a"), Some(DType::Int32));
        assert_eq!(merged.dtype("b"), Some(DType::Bool));

        let floats = DataFrame::new(vec![("id", ColumnData::from(vec![2.0f64]))]).unwrap();
        let unified = merged.outer_merge(&floats, 1).unwrap();
        assert_eq!(unified.dtype("id"), Some(DType::Float64));
        assert_eq!(unified.column("id").unwrap(), ColumnData::from(vec![1.0f64, 2.0]));
    }

    #[test]
    fn test_merge_rejects_inexact_unification() {
        let left = DataFrame::new(vec![("v", ColumnData::from(vec![(1i64 << 53) + 1]))]).unwrap();
        let right = DataFrame::new(vec![("v", ColumnData::from(vec![0.5f64]))]).unwrap();
        assert!(matches!(left.outer_merge(&right, 1), Err(Error::CastError { .. })));
    }

    #[test]
    fn test_merge_rejects_incompatible_keys() {
        let left = DataFrame::new(vec![("id", ColumnData::from(vec![1i64]))]).unwrap();
        let right = DataFrame::new(vec![("id", ColumnData::from(vec!["1"]))]).unwrap();
        assert!(matches!(left.outer_merge(&right, 1), Err(Error::TypeError { .. })));
    }

    #[test]
    fn test_missing_keys_match() {
        let left = DataFrame::new(vec![
            ("k", ColumnData::from(vec![None::<i64>])),
            ("a", ColumnData::from(vec![1i64])),
        ])
        .unwrap();
        let right = DataFrame::new(vec![
            ("k", ColumnData::from(vec![None::<i64>])),
            ("b", ColumnData::from(vec![2i64])),
        ])
        .unwrap();
        let merged = left.outer_merge(&right, 1).unwrap();
        assert_eq!(merged.rows(), vec![vec![Value::Null, Value::Int(1), Value::Int(2)]]);
    }

    #[test]
    fn test_merge_into_empty_seed() {
        let seed = DataFrame::empty(&[Field::new("id", DType::Int64), Field::new("t", DType::Utf8)], 3);
        let batch = DataFrame::new(vec![
            ("id", ColumnData::from(vec![7i64, 8])),
            ("t", ColumnData::from(vec!["", ""])),
            ("score", ColumnData::from(vec![1i64, 2])),
        ])
        .unwrap();
        let merged = seed.outer_merge(&batch, 3).unwrap();
        assert_eq!(merged.num_rows(), 2);
        assert_eq!(merged.npartitions(), 3);
        assert_eq!(merged.dtype("score"), Some(DType::Int64));
    }
}
