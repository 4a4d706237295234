//! Consolidated vertex property table.

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::expr::{self, Expr};
use crate::frame::{DataFrame, Field, RowMask};
use crate::model::{DType, Key, Value};
use crate::{Error, Result};
use super::{check_batch, filter_view, key_set, project, Cached, TypeRegistry};
use super::{DEFAULT_TYPE, TYPE_COL, VERTEX_COL};

/// One row per ingested (vertex, type) record, keyed by `_VERTEX_` and
/// `_TYPE_`, plus the union of all ingested property columns.
///
/// The table does not exist until the first `add`.
#[derive(Debug)]
pub struct VertexStore {
    table: Option<DataFrame>,
    registry: TypeRegistry,
    npartitions: usize,
    generation: u64,
    type_counts: Cached<HashMap<String, usize>>,
}

impl VertexStore {
    pub fn new(npartitions: usize) -> Self {
        Self {
            table: None,
            registry: TypeRegistry::new(),
            npartitions: npartitions.max(1),
            generation: 0,
            type_counts: Cached::new(),
        }
    }

    /// Merge a batch of vertex records into the store.
    ///
    /// `id_col` names the batch column holding vertex identities; it is
    /// copied into `_VERTEX_` and, unless listed in `properties`, not kept.
    pub fn add(
        &mut self,
        batch: &DataFrame,
        id_col: &str,
        type_name: Option<&str>,
        properties: Option<&[&str]>,
    ) -> Result<()> {
        let retained = check_batch(batch, &[id_col], properties)?;
        let type_name = type_name.unwrap_or(DEFAULT_TYPE);

        let tagged = batch
            .with_column_copy(VERTEX_COL, id_col)?
            .with_constant(TYPE_COL, &Value::from(type_name), DType::Utf8)?;
        let mut columns = vec![VERTEX_COL, TYPE_COL];
        columns.extend(retained.iter().copied().filter(|c| *c != VERTEX_COL && *c != TYPE_COL));
        let tagged = tagged.select(&columns)?;
        debug!(rows = tagged.num_rows(), columns = tagged.num_columns(), type_name, "store.vertex.tagged");

        let seed;
        let current = match &self.table {
            Some(t) => t,
            None => {
                let id_dtype = tagged.dtype(VERTEX_COL).unwrap_or(DType::Int64);
                seed = DataFrame::empty(
                    &[Field::new(VERTEX_COL, id_dtype), Field::new(TYPE_COL, DType::Utf8)],
                    self.npartitions,
                );
                &seed
            }
        };
        let merged = current.outer_merge(&tagged, self.npartitions)?;

        let recorded = self.registry.record_new(&tagged, current);
        self.table = Some(merged);
        self.generation += 1;
        self.type_counts.invalidate();
        info!(
            rows = tagged.num_rows(),
            total_rows = self.num_rows(),
            new_columns = recorded.len(),
            generation = self.generation,
            "store.vertex.ingested"
        );
        Ok(())
    }

    /// Filtered view of the store: rows whose identity is in `ids`, then
    /// whose type is in `types`, projected onto `_VERTEX_`, `_TYPE_` and
    /// `columns`. `None` when nothing has been ingested.
    pub fn get(
        &self,
        ids: Option<&[Value]>,
        types: Option<&[&str]>,
        columns: Option<&[&str]>,
    ) -> Result<Option<DataFrame>> {
        let Some(table) = &self.table else {
            return Ok(None);
        };
        let ids = ids.map(key_set);
        let view = filter_view(table, VERTEX_COL, ids.as_ref(), types)?;
        match columns {
            Some(cols) => project(&view, &[VERTEX_COL, TYPE_COL], cols).map(Some),
            None => Ok(Some(view)),
        }
    }

    /// Evaluate a predicate against the live vertex columns.
    pub fn evaluate(&self, predicate: &Expr) -> Result<RowMask> {
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| Error::ValueError("no vertex data has been added".into()))?;
        Ok(expr::evaluate(predicate, table)?.with_generation(self.generation))
    }

    pub fn table(&self) -> Option<&DataFrame> {
        self.table.as_ref()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Incremented by every successful `add`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn num_rows(&self) -> usize {
        self.table.as_ref().map_or(0, DataFrame::num_rows)
    }

    /// Property column names, reserved columns excluded.
    pub fn property_names(&self) -> Vec<String> {
        self.table.as_ref().map_or_else(Vec::new, |t| {
            t.column_names()
                .into_iter()
                .filter(|c| *c != VERTEX_COL && *c != TYPE_COL)
                .map(str::to_string)
                .collect()
        })
    }

    /// Row count per type tag. Cached until the next `add`.
    pub fn type_counts(&self) -> Result<HashMap<String, usize>> {
        let Some(table) = &self.table else {
            return Ok(HashMap::new());
        };
        self.type_counts.get_or_try_init(|| type_counts(table))
    }
}

/// Grouped row count over `_TYPE_`.
pub(crate) fn type_counts(table: &DataFrame) -> Result<HashMap<String, usize>> {
    Ok(table
        .value_counts(TYPE_COL)?
        .into_iter()
        .filter_map(|(k, n)| match k {
            Key::Str(s) => Some((s, n)),
            _ => None,
        })
        .collect())
}
