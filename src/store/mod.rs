//! # Property Stores
//!
//! Consolidated vertex and edge property tables built up by repeated outer
//! merges of ingested batches.
//!
//! ```text
//! batch ──validate──→ tag reserved columns ──project──→ outer_merge ──→ store
//!                                                         │
//!                                  TypeRegistry ←── new column dtypes
//! ```
//!
//! Every ingestion is all-or-nothing: the batch is validated and the merged
//! table is fully built before any store state (table, registry, edge id
//! counter, generation) changes.

pub mod registry;
pub mod vertex;
pub mod edge;

pub use registry::TypeRegistry;
pub use vertex::VertexStore;
pub use edge::EdgeStore;

use hashbrown::HashSet;
use parking_lot::Mutex;

use crate::frame::DataFrame;
use crate::model::{Key, Value};
use crate::{Error, Result};

// ============================================================================
// Reserved columns
// ============================================================================

pub const VERTEX_COL: &str = "_VERTEX_";
pub const SRC_COL: &str = "_SRC_";
pub const DST_COL: &str = "_DST_";
pub const TYPE_COL: &str = "_TYPE_";
pub const EDGE_ID_COL: &str = "_EDGE_ID_";
pub const WEIGHT_COL: &str = "_WEIGHT_";

/// Column names owned by the stores. Ingested batches may not use them.
pub const RESERVED_COLUMNS: [&str; 6] = [VERTEX_COL, SRC_COL, DST_COL, TYPE_COL, EDGE_ID_COL, WEIGHT_COL];

/// Type tag of rows ingested without an explicit type.
pub const DEFAULT_TYPE: &str = "";

pub fn is_reserved(name: &str) -> bool {
    RESERVED_COLUMNS.contains(&name)
}

// ============================================================================
// Cached aggregates
// ============================================================================

/// A lazily computed aggregate, cleared on every ingestion.
#[derive(Debug)]
pub(crate) struct Cached<T> {
    slot: Mutex<Option<T>>,
}

impl<T: Clone> Cached<T> {
    pub fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    pub fn invalidate(&mut self) {
        *self.slot.get_mut() = None;
    }

    /// Return the cached value, computing it first if absent.
    /// A failed computation leaves the slot empty.
    pub fn get_or_try_init(&self, init: impl FnOnce() -> Result<T>) -> Result<T> {
        let mut slot = self.slot.lock();
        if let Some(v) = slot.as_ref() {
            return Ok(v.clone());
        }
        let v = init()?;
        *slot = Some(v.clone());
        Ok(v)
    }

    #[cfg(test)]
    pub fn is_cached(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<T: Clone> Default for Cached<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Batch validation & shared views
// ============================================================================

/// Check an incoming batch against the ingestion contract and return the
/// property columns to retain.
///
/// `identity` columns must exist and hold no missing values; an explicit
/// `properties` list must name existing columns; no column may use a
/// reserved name. Without an explicit list every non-identity column is
/// retained.
pub(crate) fn check_batch<'b>(
    batch: &'b DataFrame,
    identity: &[&str],
    properties: Option<&[&'b str]>,
) -> Result<Vec<&'b str>> {
    if let Some(name) = batch.column_names().into_iter().find(|n| is_reserved(n)) {
        return Err(Error::ValueError(format!("'{name}' is a reserved column name")));
    }
    let missing: Vec<&str> = identity.iter().copied().filter(|c| !batch.contains(c)).collect();
    if !missing.is_empty() {
        return Err(Error::ValueError(format!(
            "identity column(s) {missing:?} not found in batch columns {:?}",
            batch.column_names()
        )));
    }
    for col in identity {
        if batch.null_count(col)? > 0 {
            return Err(Error::ValueError(format!("identity column '{col}' contains missing values")));
        }
    }

    match properties {
        Some(props) => {
            let invalid: Vec<&str> = props.iter().copied().filter(|c| !batch.contains(c)).collect();
            if !invalid.is_empty() {
                return Err(Error::ValueError(format!(
                    "property columns {invalid:?} not found in batch columns {:?}",
                    batch.column_names()
                )));
            }
            let mut seen = HashSet::new();
            Ok(props.iter().copied().filter(|c| seen.insert(*c)).collect())
        }
        None => Ok(batch
            .column_names()
            .into_iter()
            .filter(|c| !identity.contains(c))
            .collect()),
    }
}

pub(crate) fn key_set<'v>(values: impl IntoIterator<Item = &'v Value>) -> HashSet<Key> {
    values.into_iter().map(Key::from).collect()
}

/// Row-select `table` by identity membership, then by type tag.
pub(crate) fn filter_view(
    table: &DataFrame,
    id_col: &str,
    ids: Option<&HashSet<Key>>,
    types: Option<&[&str]>,
) -> Result<DataFrame> {
    let mut view = match ids {
        Some(keys) => table.filter(&table.isin(id_col, keys)?)?,
        None => table.clone(),
    };
    if let Some(types) = types {
        let keys = types.iter().map(|t| Key::Str((*t).to_string())).collect();
        view = view.filter(&view.isin(TYPE_COL, &keys)?)?;
    }
    Ok(view)
}

/// Project `view` onto `leading` reserved columns followed by `columns`.
pub(crate) fn project(view: &DataFrame, leading: &[&str], columns: &[&str]) -> Result<DataFrame> {
    let mut names: Vec<&str> = leading.to_vec();
    names.extend(columns.iter().copied().filter(|c| !leading.contains(c)));
    view.select(&names)
}
