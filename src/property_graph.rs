//! The top-level property graph handle.

use std::collections::BTreeSet;

use hashbrown::HashSet;
use tracing::debug;

use crate::config::PropertyGraphConfig;
use crate::expr::IntoPredicate;
use crate::extract::{self, ExtractOptions, Subgraph};
use crate::frame::DataFrame;
use crate::model::{Key, Value};
use crate::selection::Selection;
use crate::store::{Cached, EdgeStore, VertexStore};
use crate::store::{DEFAULT_TYPE, DST_COL, SRC_COL, VERTEX_COL};
use crate::topology::{EdgeList, EdgeListBuilder, GraphBuilder};
use crate::{Error, Result};

/// Vertex and edge property tables over one graph, plus the machinery to
/// select from them and extract topology-only subgraphs.
///
/// Single writer, many readers: ingestion takes `&mut self`; reads take
/// `&self` and may fill the cached counts.
#[derive(Debug)]
pub struct PropertyGraph {
    config: PropertyGraphConfig,
    num_workers: usize,
    vertices: VertexStore,
    edges: EdgeStore,
    num_vertices: Cached<usize>,
}

impl PropertyGraph {
    /// A graph partitioned across the host's available parallelism.
    pub fn new() -> Self {
        let config = PropertyGraphConfig::default();
        let num_workers = config.resolved_num_workers().unwrap_or(1);
        Self::build(config, num_workers)
    }

    pub fn with_config(config: PropertyGraphConfig) -> Result<Self> {
        let num_workers = config.resolved_num_workers()?;
        Ok(Self::build(config, num_workers))
    }

    fn build(config: PropertyGraphConfig, num_workers: usize) -> Self {
        debug!(num_workers, require_renumber = config.require_renumber, "graph.created");
        Self {
            config,
            num_workers,
            vertices: VertexStore::new(num_workers),
            edges: EdgeStore::new(num_workers),
            num_vertices: Cached::new(),
        }
    }

    pub fn config(&self) -> &PropertyGraphConfig {
        &self.config
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn vertex_store(&self) -> &VertexStore {
        &self.vertices
    }

    pub fn edge_store(&self) -> &EdgeStore {
        &self.edges
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Add vertex properties. `vertex_col` names the identity column;
    /// `type_name` defaults to the empty type; `property_columns` defaults
    /// to every other column of `batch`.
    pub fn add_vertex_data(
        &mut self,
        batch: &DataFrame,
        vertex_col: &str,
        type_name: Option<&str>,
        property_columns: Option<&[&str]>,
    ) -> Result<()> {
        self.vertices.add(batch, vertex_col, type_name, property_columns)?;
        self.num_vertices.invalidate();
        Ok(())
    }

    /// Add edge properties. `vertex_cols` names the source and destination
    /// columns. Returns the edge ids assigned to the batch's rows.
    pub fn add_edge_data(
        &mut self,
        batch: &DataFrame,
        vertex_cols: (&str, &str),
        type_name: Option<&str>,
        property_columns: Option<&[&str]>,
    ) -> Result<std::ops::Range<i64>> {
        let ids = self.edges.add(batch, vertex_cols.0, vertex_cols.1, type_name, property_columns)?;
        self.num_vertices.invalidate();
        Ok(ids)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get_vertex_data(
        &self,
        vertex_ids: Option<&[Value]>,
        types: Option<&[&str]>,
        columns: Option<&[&str]>,
    ) -> Result<Option<DataFrame>> {
        self.vertices.get(vertex_ids, types, columns)
    }

    pub fn get_edge_data(
        &self,
        edge_ids: Option<&[i64]>,
        types: Option<&[&str]>,
        columns: Option<&[&str]>,
    ) -> Result<Option<DataFrame>> {
        self.edges.get(edge_ids, types, columns)
    }

    /// `(_SRC_, _DST_, _EDGE_ID_)` of every edge, `None` before any edge
    /// data is added.
    pub fn edges(&self) -> Result<Option<DataFrame>> {
        self.edges.edges()
    }

    pub fn vertex_property_names(&self) -> Vec<String> {
        self.vertices.property_names()
    }

    pub fn edge_property_names(&self) -> Vec<String> {
        self.edges.property_names()
    }

    /// Vertex type tags. Includes the default type when some vertex only
    /// appears in edge data.
    pub fn vertex_types(&self) -> Result<BTreeSet<String>> {
        let mut types: BTreeSet<String> = self.vertices.type_counts()?.into_keys().collect();
        if !types.contains(DEFAULT_TYPE) && self.get_num_vertices(Some(DEFAULT_TYPE), true)? > 0 {
            types.insert(DEFAULT_TYPE.to_string());
        }
        Ok(types)
    }

    pub fn edge_types(&self) -> Result<BTreeSet<String>> {
        Ok(self.edges.type_counts()?.into_keys().collect())
    }

    /// Number of vertices, optionally of one type.
    ///
    /// With `include_edge_data`, vertices that only appear as edge
    /// endpoints are counted too, and are assumed to have the default type.
    pub fn get_num_vertices(&self, type_name: Option<&str>, include_edge_data: bool) -> Result<usize> {
        let Some(type_name) = type_name else {
            if !include_edge_data {
                return Ok(self.vertices.num_rows());
            }
            return self.num_vertices.get_or_try_init(|| Ok(self.all_vertex_keys()?.len()));
        };

        let counts = self.vertices.type_counts()?;
        let typed = counts.get(type_name).copied().unwrap_or(0);
        if type_name == DEFAULT_TYPE && include_edge_data {
            let total = self.get_num_vertices(None, true)?;
            // Edge-only vertices are imputed to the default type.
            return Ok(total.saturating_sub(self.vertices.num_rows()) + typed);
        }
        Ok(typed)
    }

    /// Number of edges, optionally of one type.
    pub fn get_num_edges(&self, type_name: Option<&str>) -> Result<usize> {
        match type_name {
            None => Ok(self.edges.num_rows()),
            Some(t) => Ok(self.edges.type_counts()?.get(t).copied().unwrap_or(0)),
        }
    }

    /// Distinct vertex identities across both stores, in first-appearance
    /// order (vertex data first, then edge sources, then destinations).
    pub fn get_vertices(&self) -> Result<Vec<Value>> {
        Ok(self.all_vertex_keys()?.iter().map(Key::to_value).collect())
    }

    pub fn vertex_ids(&self) -> Result<Vec<Value>> {
        self.get_vertices()
    }

    fn all_vertex_keys(&self) -> Result<Vec<Key>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut sources = Vec::new();
        if let Some(t) = self.vertices.table() {
            sources.push((t, VERTEX_COL));
        }
        if let Some(t) = self.edges.table() {
            sources.push((t, SRC_COL));
            sources.push((t, DST_COL));
        }
        for (table, col) in sources {
            for key in table.unique(col)? {
                if seen.insert(key.clone()) {
                    out.push(key);
                }
            }
        }
        Ok(out)
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Select edges matching `predicate`, given as text or as an `Expr`.
    pub fn select_edges(&self, predicate: impl IntoPredicate) -> Result<Selection> {
        let expr = predicate.into_predicate()?;
        let mask = self.edges.evaluate(&expr)?;
        debug!(predicate = %expr, selected = mask.count_selected(), "graph.select_edges");
        Ok(Selection::edges(mask))
    }

    /// Vertex selection is not supported.
    pub fn select_vertices(&self, _predicate: impl IntoPredicate, _previous: Option<&Selection>) -> Result<Selection> {
        Err(Error::NotImplemented("select_vertices".into()))
    }

    // ========================================================================
    // Extraction
    // ========================================================================

    /// Extract a subgraph as an [`EdgeList`].
    pub fn extract_subgraph(&self, options: &ExtractOptions) -> Result<Subgraph<EdgeList>> {
        self.extract_subgraph_with(&EdgeListBuilder, options)
    }

    /// Extract a subgraph with a caller-supplied graph builder.
    pub fn extract_subgraph_with<B: GraphBuilder>(
        &self,
        builder: &B,
        options: &ExtractOptions,
    ) -> Result<Subgraph<B::Graph>> {
        extract::extract_subgraph(&self.vertices, &self.edges, options, self.config.require_renumber, builder)
    }

    /// Joining algorithm output back onto properties is not supported.
    pub fn annotate_dataframe(
        &self,
        _df: &DataFrame,
        _graph: &EdgeList,
        _edge_vertex_cols: (&str, &str),
    ) -> Result<DataFrame> {
        Err(Error::NotImplemented("annotate_dataframe".into()))
    }
}

impl Default for PropertyGraph {
    fn default() -> Self {
        Self::new()
    }
}
