//! Declared dtypes of property columns.
//!
//! Outer merges unify a column that arrives with different dtypes in
//! different batches to the dtypes' supertype (int64 and float64 become
//! float64). The registry remembers the dtype each column had when it first
//! entered a store so extraction can cast it back; the cast fails if a
//! value merged in later has no exact representation in the declared type.

use hashbrown::HashMap;
use tracing::debug;

use crate::frame::DataFrame;
use crate::model::DType;
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeRegistry {
    dtypes: HashMap<String, DType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the dtype of every column of `batch` that `store` does not
    /// have yet. The first recorded dtype of a column is never replaced.
    /// Returns the newly recorded column names.
    pub fn record_new(&mut self, batch: &DataFrame, store: &DataFrame) -> Vec<String> {
        let mut recorded = Vec::new();
        for field in batch.fields() {
            if store.contains(&field.name) || self.dtypes.contains_key(&field.name) {
                continue;
            }
            self.dtypes.insert(field.name.clone(), field.dtype);
            recorded.push(field.name.clone());
        }
        recorded
    }

    pub fn get(&self, name: &str) -> Option<DType> {
        self.dtypes.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.dtypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dtypes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DType)> {
        self.dtypes.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Cast every registered column present in `df` back to its declared
    /// dtype.
    pub fn restore(&self, df: &mut DataFrame) -> Result<()> {
        for (name, declared) in self.iter() {
            match df.dtype(name) {
                Some(current) if current != declared => {
                    debug!(column = name, from = %current, to = %declared, "registry.restore");
                    df.cast(name, declared)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}
