//! Consolidated edge property table.

use std::ops::Range;

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::expr::{self, Expr};
use crate::frame::{DataFrame, Field, RowMask};
use crate::model::{DType, Value};
use crate::{Error, Result};
use super::vertex::type_counts;
use super::{check_batch, filter_view, key_set, project, Cached, TypeRegistry};
use super::{DEFAULT_TYPE, DST_COL, EDGE_ID_COL, SRC_COL, TYPE_COL, WEIGHT_COL};

/// Reserved columns every edge row carries, in table order.
const EDGE_KEY_COLUMNS: [&str; 4] = [SRC_COL, DST_COL, EDGE_ID_COL, TYPE_COL];

/// One row per ingested edge record, keyed by `_SRC_`, `_DST_`,
/// `_EDGE_ID_` and `_TYPE_`.
///
/// Edge ids are assigned at ingestion from a counter owned by the store:
/// the first edge ever added gets 0 and ids are never reused.
#[derive(Debug)]
pub struct EdgeStore {
    table: Option<DataFrame>,
    registry: TypeRegistry,
    npartitions: usize,
    generation: u64,
    next_edge_id: i64,
    type_counts: Cached<HashMap<String, usize>>,
}

impl EdgeStore {
    pub fn new(npartitions: usize) -> Self {
        Self {
            table: None,
            registry: TypeRegistry::new(),
            npartitions: npartitions.max(1),
            generation: 0,
            next_edge_id: 0,
            type_counts: Cached::new(),
        }
    }

    /// Merge a batch of edge records into the store and return the edge
    /// ids assigned to its rows, in row order.
    pub fn add(
        &mut self,
        batch: &DataFrame,
        src_col: &str,
        dst_col: &str,
        type_name: Option<&str>,
        properties: Option<&[&str]>,
    ) -> Result<Range<i64>> {
        let retained = check_batch(batch, &[src_col, dst_col], properties)?;
        let type_name = type_name.unwrap_or(DEFAULT_TYPE);

        let first_id = self.next_edge_id;
        let ids = first_id..first_id + batch.num_rows() as i64;
        let tagged = batch
            .with_column_copy(SRC_COL, src_col)?
            .with_column_copy(DST_COL, dst_col)?
            .with_constant(TYPE_COL, &Value::from(type_name), DType::Utf8)?
            .with_sequence(EDGE_ID_COL, first_id)?;
        let mut columns = EDGE_KEY_COLUMNS.to_vec();
        columns.extend(retained.iter().copied().filter(|c| !EDGE_KEY_COLUMNS.contains(c)));
        let tagged = tagged.select(&columns)?;
        debug!(
            rows = tagged.num_rows(),
            first_edge_id = first_id,
            type_name,
            "store.edge.tagged"
        );

        let seed;
        let current = match &self.table {
            Some(t) => t,
            None => {
                let fields = [
                    Field::new(SRC_COL, tagged.dtype(SRC_COL).unwrap_or(DType::Int64)),
                    Field::new(DST_COL, tagged.dtype(DST_COL).unwrap_or(DType::Int64)),
                    Field::new(EDGE_ID_COL, DType::Int64),
                    Field::new(TYPE_COL, DType::Utf8),
                ];
                seed = DataFrame::empty(&fields, self.npartitions);
                &seed
            }
        };
        let merged = current.outer_merge(&tagged, self.npartitions)?;

        let recorded = self.registry.record_new(&tagged, current);
        self.table = Some(merged);
        self.next_edge_id = ids.end;
        self.generation += 1;
        self.type_counts.invalidate();
        info!(
            rows = tagged.num_rows(),
            total_rows = self.num_rows(),
            next_edge_id = self.next_edge_id,
            new_columns = recorded.len(),
            generation = self.generation,
            "store.edge.ingested"
        );
        Ok(ids)
    }

    /// Filtered view of the store: rows whose edge id is in `edge_ids`,
    /// then whose type is in `types`, projected onto the reserved key
    /// columns and `columns`. Without `columns` every durable column is
    /// returned; the transient `_WEIGHT_` column never is.
    pub fn get(
        &self,
        edge_ids: Option<&[i64]>,
        types: Option<&[&str]>,
        columns: Option<&[&str]>,
    ) -> Result<Option<DataFrame>> {
        let Some(table) = &self.table else {
            return Ok(None);
        };
        let ids = edge_ids.map(|ids| {
            let values: Vec<Value> = ids.iter().map(|&i| Value::Int(i)).collect();
            key_set(&values)
        });
        let view = filter_view(table, EDGE_ID_COL, ids.as_ref(), types)?;
        match columns {
            Some(cols) => project(&view, &EDGE_KEY_COLUMNS, cols).map(Some),
            None => view.drop(&[WEIGHT_COL]).map(Some),
        }
    }

    /// `(_SRC_, _DST_, _EDGE_ID_)` for every stored edge.
    pub fn edges(&self) -> Result<Option<DataFrame>> {
        self.table
            .as_ref()
            .map(|t| t.select(&[SRC_COL, DST_COL, EDGE_ID_COL]))
            .transpose()
    }

    /// Evaluate a predicate against the live edge columns.
    pub fn evaluate(&self, predicate: &Expr) -> Result<RowMask> {
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| Error::ValueError("no edge data has been added".into()))?;
        Ok(expr::evaluate(predicate, table)?.with_generation(self.generation))
    }

    pub fn table(&self) -> Option<&DataFrame> {
        self.table.as_ref()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The id the next ingested edge will receive.
    pub fn next_edge_id(&self) -> i64 {
        self.next_edge_id
    }

    pub fn num_rows(&self) -> usize {
        self.table.as_ref().map_or(0, DataFrame::num_rows)
    }

    /// Property column names, reserved and transient columns excluded.
    pub fn property_names(&self) -> Vec<String> {
        self.table.as_ref().map_or_else(Vec::new, |t| {
            t.column_names()
                .into_iter()
                .filter(|c| !EDGE_KEY_COLUMNS.contains(c) && *c != WEIGHT_COL)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnData, Key};
    use pretty_assertions::assert_eq;

    fn transfers(n: i64) -> DataFrame {
        DataFrame::new(vec![
            ("from", ColumnData::from((0..n).collect::<Vec<i64>>())),
            ("to", ColumnData::from((1..=n).collect::<Vec<i64>>())),
            ("amount", ColumnData::from((0..n).map(|i| i as f64 * 10.0).collect::<Vec<f64>>())),
        ])
        .unwrap()
    }

    #[test]
    fn test_edge_ids_continue_across_batches() {
        let mut store = EdgeStore::new(3);
        assert_eq!(store.add(&transfers(4), "from", "to", None, None).unwrap(), 0..4);
        assert_eq!(store.add(&transfers(2), "from", "to", Some("refund"), None).unwrap(), 4..6);
        assert_eq!(store.next_edge_id(), 6);

        let ids: Vec<Key> = store.table().unwrap().unique(EDGE_ID_COL).unwrap();
        assert_eq!(ids, (0..6).map(Key::Int).collect::<Vec<_>>());
    }

    #[test]
    fn test_failed_add_does_not_consume_ids() {
        let mut store = EdgeStore::new(1);
        store.add(&transfers(2), "from", "to", None, None).unwrap();
        assert!(store.add(&transfers(2), "from", "missing", None, None).is_err());
        assert_eq!(store.add(&transfers(1), "from", "to", None, None).unwrap(), 2..3);
    }

    #[test]
    fn test_table_layout() {
        let mut store = EdgeStore::new(2);
        store.add(&transfers(3), "from", "to", Some("transfer"), None).unwrap();
        let table = store.table().unwrap();
        assert_eq!(table.column_names(), vec!["_SRC_", "_DST_", "_EDGE_ID_", "_TYPE_", "amount"]);
        assert_eq!(store.property_names(), vec!["amount"]);
        assert_eq!(store.edges().unwrap().unwrap().column_names(), vec!["_SRC_", "_DST_", "_EDGE_ID_"]);
    }

    #[test]
    fn test_get_by_id_and_type() {
        let mut store = EdgeStore::new(2);
        store.add(&transfers(3), "from", "to", Some("transfer"), None).unwrap();
        store.add(&transfers(3), "from", "to", Some("refund"), None).unwrap();

        let view = store.get(Some(&[1, 4]), None, Some(&["amount"])).unwrap().unwrap();
        assert_eq!(
            view.rows(),
            vec![
                vec![Value::Int(1), Value::Int(2), Value::Int(1), Value::from("transfer"), Value::Float(10.0)],
                vec![Value::Int(1), Value::Int(2), Value::Int(4), Value::from("refund"), Value::Float(10.0)],
            ]
        );
        let refunds = store.get(None, Some(&["refund"]), None).unwrap().unwrap();
        assert_eq!(refunds.num_rows(), 3);
        assert_eq!(store.type_counts().unwrap()["transfer"], 3);
    }

    #[test]
    fn test_evaluate_stamps_generation() {
        let mut store = EdgeStore::new(2);
        assert!(store.evaluate(&expr::parse("amount > 0").unwrap()).is_err());
        store.add(&transfers(3), "from", "to", None, None).unwrap();
        let mask = store.evaluate(&expr::parse("amount > 0").unwrap()).unwrap();
        assert_eq!(mask.generation(), 1);
        assert_eq!(mask.count_selected(), 2);
    }
}
