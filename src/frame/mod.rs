//! # Partitioned Tables
//!
//! The in-process table engine the property stores are built on.
//!
//! A `DataFrame` is an ordered set of named, typed, nullable columns split
//! horizontally into partitions, each partition an Arrow `RecordBatch`
//! sharing one schema. Per-row work (masks, membership tests, casts) runs
//! partition by partition through Arrow kernels; anything that needs a
//! global view (counts, distinct values, joins) collapses the partitions
//! first and is therefore a synchronization point.
//!
//! ```text
//! DataFrame
//!   fields:     [_SRC_: int64] [_DST_: int64] [_TYPE_: utf8] [amount: float64]
//!   partitions: P0 (rows 0..k)   P1 (rows k..n)   ...
//! ```

pub mod mask;
pub mod merge;

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Int64Array};
use arrow::compute::{concat_batches, filter_record_batch};
use arrow::datatypes::{Field as ArrowField, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::model::{ColumnData, DType, Key, Value};
use crate::{Error, Result};

pub use mask::RowMask;

/// Composite row key over a handful of columns.
pub type RowKey = SmallVec<[Key; 4]>;

/// Name and dtype of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub dtype: DType,
}

impl Field {
    pub fn new(name: impl Into<String>, dtype: DType) -> Self {
        Self { name: name.into(), dtype }
    }
}

/// A horizontally partitioned table.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
    schema: SchemaRef,
    partitions: Vec<RecordBatch>,
}

fn arrow_schema(fields: &[Field]) -> SchemaRef {
    Arc::new(Schema::new(
        fields
            .iter()
            .map(|f| ArrowField::new(f.name.clone(), f.dtype.to_arrow(), true))
            .collect::<Vec<_>>(),
    ))
}

/// One partition; the explicit row count keeps zero-column tables sized.
fn record_batch(schema: &SchemaRef, columns: Vec<ArrayRef>, len: usize) -> Result<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(len));
    Ok(RecordBatch::try_new_with_options(schema.clone(), columns, &options)?)
}

impl DataFrame {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Build a single-partition table from named columns.
    ///
    /// Fails if column lengths differ or a name repeats.
    pub fn new<N: Into<String>>(columns: Vec<(N, ColumnData)>) -> Result<Self> {
        let mut fields = Vec::with_capacity(columns.len());
        let mut seen = HashSet::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());
        let mut len = None;
        for (name, col) in columns {
            let name = name.into();
            match len {
                None => len = Some(col.len()),
                Some(n) if n != col.len() => {
                    return Err(Error::ValueError(format!(
                        "column '{name}' has {} rows, expected {n}",
                        col.len()
                    )));
                }
                Some(_) => {}
            }
            if !seen.insert(name.clone()) {
                return Err(Error::ValueError(format!("duplicate column name '{name}'")));
            }
            fields.push(Field::new(name, col.dtype()));
            arrays.push(col.into_array());
        }
        let schema = arrow_schema(&fields);
        let partition = record_batch(&schema, arrays, len.unwrap_or(0))?;
        Ok(Self::from_parts(fields, schema, vec![partition]))
    }

    /// Build a table from named columns and split it into `npartitions`.
    pub fn from_columns<N: Into<String>>(columns: Vec<(N, ColumnData)>, npartitions: usize) -> Result<Self> {
        Self::new(columns)?.repartition(npartitions)
    }

    /// Adopt an Arrow `RecordBatch` and split it into `npartitions`.
    pub fn from_record_batch(batch: &RecordBatch, npartitions: usize) -> Result<Self> {
        let columns = batch
            .schema()
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(f, a)| Ok((f.name().clone(), ColumnData::from_array(a.clone())?)))
            .collect::<Result<Vec<_>>>()?;
        Self::from_columns(columns, npartitions)
    }

    /// A table with the given schema and no rows.
    pub fn empty(fields: &[Field], npartitions: usize) -> Self {
        let schema = arrow_schema(fields);
        let partitions = (0..npartitions.max(1)).map(|_| RecordBatch::new_empty(schema.clone())).collect();
        Self::from_parts(fields.to_vec(), schema, partitions)
    }

    fn from_parts(fields: Vec<Field>, schema: SchemaRef, partitions: Vec<RecordBatch>) -> Self {
        let index = fields.iter().enumerate().map(|(i, f)| (f.name.clone(), i)).collect();
        Self { fields, index, schema, partitions }
    }

    // ========================================================================
    // Schema & shape
    // ========================================================================

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn dtype(&self, name: &str) -> Option<DType> {
        self.index.get(name).map(|&i| self.fields[i].dtype)
    }

    pub fn num_rows(&self) -> usize {
        self.partitions.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn npartitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn partition_lens(&self) -> Vec<usize> {
        self.partitions.iter().map(RecordBatch::num_rows).collect()
    }

    /// The partitions as Arrow record batches.
    pub fn partitions(&self) -> &[RecordBatch] {
        &self.partitions
    }

    pub(crate) fn position(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    fn partition_column(&self, partition: usize, pos: usize) -> ColumnData {
        ColumnData::wrap(self.fields[pos].dtype, self.partitions[partition].column(pos).clone())
    }

    // ========================================================================
    // Gathering (synchronization points)
    // ========================================================================

    /// Collect a column across all partitions.
    pub fn column(&self, name: &str) -> Result<ColumnData> {
        let pos = self.position(name)?;
        let parts: Vec<ColumnData> = (0..self.partitions.len()).map(|p| self.partition_column(p, pos)).collect();
        ColumnData::concat(self.fields[pos].dtype, &parts.iter().collect::<Vec<_>>())
    }

    /// Collect every column across all partitions, in schema order.
    pub(crate) fn gather(&self) -> Result<Vec<ColumnData>> {
        self.fields.iter().map(|f| self.column(&f.name)).collect()
    }

    /// All partitions as one Arrow `RecordBatch`.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let merged = concat_batches(&self.schema, &self.partitions)?;
        let total = self.num_rows();
        if merged.num_rows() == total {
            return Ok(merged);
        }
        record_batch(&self.schema, merged.columns().to_vec(), total)
    }

    /// All rows as values, in partition order.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        let mut out = Vec::with_capacity(self.num_rows());
        for p in 0..self.partitions.len() {
            let cols: Vec<ColumnData> = (0..self.fields.len()).map(|c| self.partition_column(p, c)).collect();
            for i in 0..self.partitions[p].num_rows() {
                out.push(cols.iter().map(|c| c.get(i)).collect());
            }
        }
        out
    }

    /// Merge all partitions and split the rows evenly into `n` partitions.
    pub fn repartition(&self, n: usize) -> Result<DataFrame> {
        let n = n.max(1);
        let whole = self.to_record_batch()?;
        let total = whole.num_rows();
        let partitions = (0..n)
            .map(|p| {
                let start = p * total / n;
                let end = (p + 1) * total / n;
                whole.slice(start, end - start)
            })
            .collect();
        Ok(Self::from_parts(self.fields.clone(), self.schema.clone(), partitions))
    }

    // ========================================================================
    // Projection
    // ========================================================================

    /// Keep only `names`, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<DataFrame> {
        let positions = names.iter().map(|n| self.position(n)).collect::<Result<Vec<_>>>()?;
        let fields: Vec<Field> = positions.iter().map(|&i| self.fields[i].clone()).collect();
        let schema = arrow_schema(&fields);
        let partitions = self
            .partitions
            .iter()
            .map(|p| {
                let columns = positions.iter().map(|&i| p.column(i).clone()).collect();
                record_batch(&schema, columns, p.num_rows())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_parts(fields, schema, partitions))
    }

    /// Remove the named columns. Names not present are ignored.
    pub fn drop(&self, names: &[&str]) -> Result<DataFrame> {
        let keep: Vec<&str> = self
            .column_names()
            .into_iter()
            .filter(|n| !names.contains(n))
            .collect();
        self.select(&keep)
    }

    // ========================================================================
    // Column construction
    // ========================================================================

    /// Add or replace `name`, one array per partition.
    fn set_column(&mut self, name: &str, dtype: DType, columns: Vec<ArrayRef>) -> Result<()> {
        let pos = match self.index.get(name) {
            Some(&pos) => {
                self.fields[pos].dtype = dtype;
                pos
            }
            None => {
                self.index.insert(name.to_string(), self.fields.len());
                self.fields.push(Field::new(name, dtype));
                self.fields.len() - 1
            }
        };
        let schema = arrow_schema(&self.fields);
        let partitions = self
            .partitions
            .iter()
            .zip(columns)
            .map(|(p, col)| {
                let mut arrays = p.columns().to_vec();
                if pos < arrays.len() {
                    arrays[pos] = col;
                } else {
                    arrays.push(col);
                }
                record_batch(&schema, arrays, p.num_rows())
            })
            .collect::<Result<Vec<_>>>()?;
        self.schema = schema;
        self.partitions = partitions;
        Ok(())
    }

    /// Add (or replace) `name` as a copy of column `source`.
    pub fn with_column_copy(&self, name: &str, source: &str) -> Result<DataFrame> {
        let pos = self.position(source)?;
        let cols = self.partitions.iter().map(|p| p.column(pos).clone()).collect();
        let mut out = self.clone();
        out.set_column(name, self.fields[pos].dtype, cols)?;
        Ok(out)
    }

    /// Add (or replace) `name` holding `value` on every row.
    pub fn with_constant(&self, name: &str, value: &Value, dtype: DType) -> Result<DataFrame> {
        let cols = self
            .partitions
            .iter()
            .map(|p| ColumnData::constant(dtype, value, p.num_rows()).map(ColumnData::into_array))
            .collect::<Result<Vec<_>>>()?;
        let mut out = self.clone();
        out.set_column(name, dtype, cols)?;
        Ok(out)
    }

    /// Add (or replace) `name` with an int64 sequence `start, start+1, ...`
    /// running through the partitions in order.
    pub fn with_sequence(&self, name: &str, start: i64) -> Result<DataFrame> {
        let mut next = start;
        let cols = self
            .partitions
            .iter()
            .map(|p| {
                let len = p.num_rows() as i64;
                let seq: ArrayRef = Arc::new(Int64Array::from_iter_values(next..next + len));
                next += len;
                seq
            })
            .collect();
        let mut out = self.clone();
        out.set_column(name, DType::Int64, cols)?;
        Ok(out)
    }

    // ========================================================================
    // Type conversion
    // ========================================================================

    /// Convert `name` to `dtype` in place.
    pub fn cast(&mut self, name: &str, dtype: DType) -> Result<()> {
        let pos = self.position(name)?;
        if self.fields[pos].dtype == dtype {
            return Ok(());
        }
        let converted = (0..self.partitions.len())
            .map(|p| self.partition_column(p, pos).cast(dtype).map(ColumnData::into_array))
            .collect::<Result<Vec<_>>>()?;
        self.set_column(name, dtype, converted)
    }

    /// Replace missing values of `name` with `value` in place.
    pub fn fill_null(&mut self, name: &str, value: &Value) -> Result<()> {
        let pos = self.position(name)?;
        let filled = (0..self.partitions.len())
            .map(|p| self.partition_column(p, pos).fill_null(value).map(ColumnData::into_array))
            .collect::<Result<Vec<_>>>()?;
        let dtype = self.fields[pos].dtype;
        self.set_column(name, dtype, filled)
    }

    // ========================================================================
    // Row selection
    // ========================================================================

    /// Keep the rows selected by `mask`.
    pub fn filter(&self, mask: &RowMask) -> Result<DataFrame> {
        if mask.partition_lens() != self.partition_lens() {
            return Err(Error::ValueError(format!(
                "mask shape {:?} does not match table partitions {:?}",
                mask.partition_lens(),
                self.partition_lens()
            )));
        }
        let partitions = self
            .partitions
            .iter()
            .zip(mask.partitions())
            .map(|(p, m)| filter_record_batch(p, m))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::from_parts(self.fields.clone(), self.schema.clone(), partitions))
    }

    /// Mask of rows whose `name` value is one of `keys`.
    pub fn isin(&self, name: &str, keys: &HashSet<Key>) -> Result<RowMask> {
        let pos = self.position(name)?;
        let partitions = (0..self.partitions.len())
            .map(|p| {
                let col = self.partition_column(p, pos);
                (0..col.len()).map(|i| Some(keys.contains(&col.key(i)))).collect::<BooleanArray>()
            })
            .collect();
        Ok(RowMask::from_arrays(partitions))
    }

    // ========================================================================
    // Aggregates (synchronization points)
    // ========================================================================

    /// Number of missing values in `name`.
    pub fn null_count(&self, name: &str) -> Result<usize> {
        let pos = self.position(name)?;
        Ok(self.partitions.iter().map(|p| p.column(pos).null_count()).sum())
    }

    /// Every row's key over `names`, partition by partition.
    fn row_keys(&self, names: &[&str]) -> Result<impl Iterator<Item = RowKey> + '_> {
        let positions = names.iter().map(|n| self.position(n)).collect::<Result<Vec<_>>>()?;
        Ok((0..self.partitions.len()).flat_map(move |p| {
            let cols: Vec<ColumnData> = positions.iter().map(|&c| self.partition_column(p, c)).collect();
            (0..self.partitions[p].num_rows()).map(move |i| cols.iter().map(|c| c.key(i)).collect::<RowKey>())
        }))
    }

    /// Number of distinct value combinations over `names`.
    pub fn n_unique(&self, names: &[&str]) -> Result<usize> {
        Ok(self.row_keys(names)?.collect::<HashSet<RowKey>>().len())
    }

    /// Distinct values of `name`, in first-appearance order.
    pub fn unique(&self, name: &str) -> Result<Vec<Key>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for mut row in self.row_keys(&[name])? {
            if let Some(k) = row.pop() {
                if seen.insert(k.clone()) {
                    out.push(k);
                }
            }
        }
        Ok(out)
    }

    /// Row count per distinct value of `name` (missing values included).
    pub fn value_counts(&self, name: &str) -> Result<HashMap<Key, usize>> {
        let mut counts = HashMap::new();
        for mut row in self.row_keys(&[name])? {
            if let Some(k) = row.pop() {
                *counts.entry(k).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}
