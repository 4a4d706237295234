//! # Subgraph Extraction
//!
//! Projects the edge store (optionally restricted by a selection) down to a
//! topology-only edge table and hands it to a [`GraphBuilder`].
//!
//! ```text
//! edge store ──edge mask──→ vertex closure ──restore dtypes──→ weights
//!     ──duplicate check──→ (src, dst[, weight]) ──GraphBuilder──→ graph
//!                      └──→ (src, dst, edge id) lookup table
//! ```
//!
//! Extraction works on copies; the stores are never modified.

use hashbrown::HashSet;
use tracing::{debug, info, warn};

use crate::frame::{DataFrame, RowMask};
use crate::model::{DType, Key, Value};
use crate::selection::Selection;
use crate::store::{EdgeStore, VertexStore};
use crate::store::{DST_COL, EDGE_ID_COL, SRC_COL, VERTEX_COL, WEIGHT_COL};
use crate::topology::{EdgeListSpec, GraphBuilder, GraphKind};
use crate::{Error, Result};

/// Parameters of one extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    /// Restrict the extracted edges; `None` extracts every edge.
    pub selection: Option<Selection>,
    /// Kind of graph to build.
    pub kind: GraphKind,
    /// Edge property used as the weight.
    pub edge_weight_property: Option<String>,
    /// Fills missing weights, or weights every edge when no weight
    /// property is named.
    pub default_edge_weight: Option<f64>,
    /// Permit repeated (source, destination) pairs.
    pub allow_multi_edges: bool,
    pub renumber: bool,
    /// Return the (source, destination, edge id) lookup table.
    pub add_edge_data: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            selection: None,
            kind: GraphKind::default(),
            edge_weight_property: None,
            default_edge_weight: None,
            allow_multi_edges: false,
            renumber: true,
            add_edge_data: true,
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn create_using(mut self, kind: GraphKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn edge_weight_property(mut self, name: impl Into<String>) -> Self {
        self.edge_weight_property = Some(name.into());
        self
    }

    pub fn default_edge_weight(mut self, weight: f64) -> Self {
        self.default_edge_weight = Some(weight);
        self
    }

    pub fn allow_multi_edges(mut self, allow: bool) -> Self {
        self.allow_multi_edges = allow;
        self
    }

    pub fn renumber(mut self, renumber: bool) -> Self {
        self.renumber = renumber;
        self
    }

    pub fn add_edge_data(mut self, add: bool) -> Self {
        self.add_edge_data = add;
        self
    }
}

/// An extracted graph and, when requested, the table mapping its edges
/// back to their edge ids.
#[derive(Debug, Clone)]
pub struct Subgraph<G> {
    pub graph: G,
    pub edge_lookup: Option<DataFrame>,
}

/// Run one extraction against the stores.
pub(crate) fn extract_subgraph<B: GraphBuilder>(
    vertices: &VertexStore,
    edges: &EdgeStore,
    options: &ExtractOptions,
    require_renumber: bool,
    builder: &B,
) -> Result<Subgraph<B::Graph>> {
    if !options.renumber && require_renumber {
        return Err(Error::RenumberRequired);
    }
    if let Some(w) = options.default_edge_weight {
        if !w.is_finite() {
            return Err(Error::ValueError(format!("default edge weight {w} is not finite")));
        }
    }
    let table = edges
        .table()
        .ok_or_else(|| Error::ValueError("no edge data has been added".into()))?;

    let selection = options.selection.as_ref();
    let mut candidates = match selection.and_then(Selection::edge_mask) {
        Some(mask) => {
            check_generation(mask, edges.generation(), "edge")?;
            table.filter(mask)?
        }
        None => table.clone(),
    };
    debug!(rows = candidates.num_rows(), "extract.edges.selected");

    if let Some(mask) = selection.and_then(Selection::vertex_mask) {
        candidates = restrict_to_vertices(candidates, vertices, mask)?;
    }

    // Only the columns extraction reads are restored; an unrelated column
    // that no longer fits its declared dtype must not fail the extraction.
    let mut keep = vec![SRC_COL, DST_COL, EDGE_ID_COL];
    if let Some(prop) = options.edge_weight_property.as_deref() {
        if candidates.contains(prop) && !keep.contains(&prop) {
            keep.push(prop);
        }
    }
    let mut candidates = candidates.select(&keep)?;
    edges.registry().restore(&mut candidates)?;

    let weight = resolve_weight(&mut candidates, options)?;

    if !options.allow_multi_edges && has_duplicate_edges(&candidates, options.kind.directed)? {
        return Err(Error::DuplicateEdges(options.kind.describe().into()));
    }

    let mut topology_columns = vec![SRC_COL, DST_COL];
    if let Some(w) = weight.as_deref() {
        topology_columns.push(w);
    }
    let spec = EdgeListSpec {
        source: SRC_COL.into(),
        destination: DST_COL.into(),
        weight: weight.clone(),
        renumber: options.renumber,
    };
    let graph = builder.build(&candidates.select(&topology_columns)?, &spec, options.kind)?;

    let edge_lookup = if options.add_edge_data {
        Some(candidates.select(&[SRC_COL, DST_COL, EDGE_ID_COL])?)
    } else {
        None
    };
    info!(
        edges = candidates.num_rows(),
        weighted = weight.is_some(),
        renumber = options.renumber,
        kind = options.kind.describe(),
        "extract.completed"
    );
    Ok(Subgraph { graph, edge_lookup })
}

fn check_generation(mask: &RowMask, current: u64, side: &str) -> Result<()> {
    if mask.generation() != current {
        return Err(Error::StaleSelection(format!(
            "{side} selection was evaluated at generation {} but the {side} store is at generation {current}",
            mask.generation()
        )));
    }
    Ok(())
}

/// Keep edges whose source and destination are both selected vertices.
/// A vertex mask that selects nothing leaves the edges unrestricted.
fn restrict_to_vertices(candidates: DataFrame, vertices: &VertexStore, mask: &RowMask) -> Result<DataFrame> {
    check_generation(mask, vertices.generation(), "vertex")?;
    let table = vertices
        .table()
        .ok_or_else(|| Error::ValueError("vertex selection given but no vertex data has been added".into()))?;
    let selected = table.filter(mask)?;
    if selected.is_empty() {
        debug!("extract.vertices.empty_selection");
        return Ok(candidates);
    }
    let ids: HashSet<Key> = selected.unique(VERTEX_COL)?.into_iter().collect();
    let closure = candidates.isin(SRC_COL, &ids)?.and(&candidates.isin(DST_COL, &ids)?)?;
    let restricted = candidates.filter(&closure)?;
    debug!(vertices = ids.len(), rows = restricted.num_rows(), "extract.vertices.closure");
    Ok(restricted)
}

/// Settle the weight column and return its name, or `None` for an
/// unweighted graph.
fn resolve_weight(candidates: &mut DataFrame, options: &ExtractOptions) -> Result<Option<String>> {
    match (&options.edge_weight_property, options.default_edge_weight) {
        (Some(prop), default) => {
            let dtype = candidates.dtype(prop).ok_or_else(|| {
                Error::ValueError(format!("edge weight property '{prop}' was not found in the extracted edges"))
            })?;
            if !dtype.is_numeric() {
                return Err(Error::TypeError {
                    expected: "numeric edge weight".into(),
                    got: format!("{} for column '{prop}'", dtype.name()),
                });
            }
            let missing = candidates.null_count(prop)?;
            if missing > 0 {
                let Some(fill) = default else {
                    return Err(Error::MissingDefaultWeight(prop.clone()));
                };
                warn!(column = prop.as_str(), missing, fill, "extract.weight.filled");
                let integral = fill.fract() == 0.0 && (i32::MIN as f64..=i32::MAX as f64).contains(&fill);
                if dtype.is_integer() && integral {
                    candidates.fill_null(prop, &Value::Int(fill as i64))?;
                } else {
                    candidates.cast(prop, DType::Float64)?;
                    candidates.fill_null(prop, &Value::Float(fill))?;
                }
            }
            Ok(Some(prop.clone()))
        }
        (None, Some(fill)) => {
            *candidates = candidates.with_constant(WEIGHT_COL, &Value::Float(fill), DType::Float64)?;
            Ok(Some(WEIGHT_COL.to_string()))
        }
        (None, None) => Ok(None),
    }
}

/// Whether any (source, destination) pair repeats.
///
/// For undirected graphs `(a, b)` and `(b, a)` are the same pair, so a
/// reverse edge counts as a duplicate. This is stricter than comparing the
/// ordered `(source, destination)` columns, which would accept both
/// directions as distinct rows and let the builder collapse them silently.
pub fn has_duplicate_edges(edges: &DataFrame, directed: bool) -> Result<bool> {
    if directed {
        return Ok(edges.n_unique(&[SRC_COL, DST_COL])? != edges.num_rows());
    }
    let src = edges.column(SRC_COL)?;
    let dst = edges.column(DST_COL)?;
    let mut seen = HashSet::with_capacity(src.len());
    for i in 0..src.len() {
        let (a, b) = (src.key(i), dst.key(i));
        let pair = if a <= b { (a, b) } else { (b, a) };
        if !seen.insert(pair) {
            return Ok(true);
        }
    }
    Ok(false)
}
