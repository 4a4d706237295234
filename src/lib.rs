//! # propgraph: Property Graphs over Partitioned Tables
//!
//! Attach typed vertex and edge property tables to a graph, select subsets
//! of edges with predicate expressions, and extract topology-only
//! subgraphs (renumbered, optionally weighted) for graph algorithms.
//!
//! ## Design Principles
//!
//! 1. **Tables first**: vertex and edge properties live in consolidated,
//!    partitioned `DataFrame`s of Arrow record batches grown by outer merges
//! 2. **Declared types win**: the dtype a column had when it first arrived
//!    is restored before extraction, whatever the merges did to it
//! 3. **Stable edge ids**: assigned once at ingestion, never reused
//! 4. **Trait at the seam**: `GraphBuilder` is the contract with whatever
//!    consumes extracted topology
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use propgraph::{ColumnData, DataFrame, ExtractOptions, PropertyGraph};
//!
//! # fn example() -> propgraph::Result<()> {
//! let mut graph = PropertyGraph::new();
//!
//! let follows = DataFrame::new(vec![
//!     ("src", ColumnData::from(vec![1i64, 2])),
//!     ("dst", ColumnData::from(vec![2i64, 3])),
//!     ("since", ColumnData::from(vec![2019i64, 2021])),
//! ])?;
//! graph.add_edge_data(&follows, ("src", "dst"), Some("follows"), None)?;
//!
//! let recent = graph.select_edges("since >= 2020")?;
//! let sub = graph.extract_subgraph(&ExtractOptions::new().selection(recent))?;
//! assert_eq!(sub.graph.num_edges(), 1);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod frame;
pub mod store;
pub mod expr;
pub mod selection;
pub mod topology;
pub mod extract;
pub mod config;
pub mod property_graph;

// ============================================================================
// Re-exports: Model & tables
// ============================================================================

pub use model::{ColumnData, DType, Key, Value};
pub use frame::{DataFrame, Field, RowMask};

// ============================================================================
// Re-exports: Stores
// ============================================================================

pub use store::{
    EdgeStore, TypeRegistry, VertexStore,
    DEFAULT_TYPE, DST_COL, EDGE_ID_COL, SRC_COL, TYPE_COL, VERTEX_COL, WEIGHT_COL,
};

// ============================================================================
// Re-exports: Selection & extraction
// ============================================================================

pub use expr::{col, lit, Expr, IntoPredicate};
pub use selection::Selection;
pub use extract::{ExtractOptions, Subgraph};
pub use topology::{EdgeList, EdgeListBuilder, EdgeListSpec, GraphBuilder, GraphKind, RenumberMap};
pub use config::PropertyGraphConfig;
pub use property_graph::PropertyGraph;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Predicate syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Value error: {0}")]
    ValueError(String),

    #[error("Cannot cast {from} to {to}: {reason}")]
    CastError { from: DType, to: DType, reason: String },

    #[error("Query resulted in duplicate edges which cannot be represented by a {0}")]
    DuplicateEdges(String),

    #[error("Edge weight property '{0}' contains missing values and no default edge weight was given")]
    MissingDefaultWeight(String),

    #[error("Subgraphs must be extracted with renumbering enabled")]
    RenumberRequired,

    #[error("Stale selection: {0}")]
    StaleSelection(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

pub type Result<T> = std::result::Result<T, Error>;
