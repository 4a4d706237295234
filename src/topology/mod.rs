//! # Graph Construction Contract
//!
//! Extraction ends by handing a topology-only edge table to a graph
//! builder: the contract between this crate and whatever runs the graph
//! algorithms.
//!
//! ## Implementations
//!
//! | Builder | Module | Graph |
//! |---------|--------|-------|
//! | `EdgeListBuilder` | `edgelist` | Dense `u32` edge list with optional weights |

pub mod edgelist;

use serde::{Deserialize, Serialize};

use crate::frame::DataFrame;
use crate::Result;

pub use edgelist::{EdgeList, EdgeListBuilder, RenumberMap};

/// The kind of graph a builder should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphKind {
    pub directed: bool,
    pub multigraph: bool,
}

impl GraphKind {
    pub fn directed() -> Self {
        Self { directed: true, multigraph: false }
    }

    pub fn undirected() -> Self {
        Self { directed: false, multigraph: false }
    }

    pub fn multi(self) -> Self {
        Self { multigraph: true, ..self }
    }

    pub fn describe(&self) -> &'static str {
        match (self.directed, self.multigraph) {
            (true, false) => "directed graph",
            (false, false) => "undirected graph",
            (true, true) => "directed multigraph",
            (false, true) => "undirected multigraph",
        }
    }
}

impl Default for GraphKind {
    fn default() -> Self {
        Self::directed()
    }
}

/// Which columns of the edge table make up the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeListSpec {
    pub source: String,
    pub destination: String,
    pub weight: Option<String>,
    /// Map vertex identities onto a dense `0..n` range.
    pub renumber: bool,
}

/// Builds a graph from an edge table.
///
/// The table holds exactly the columns named by the spec. Implementations
/// must not assume any particular partitioning.
pub trait GraphBuilder {
    type Graph;

    fn build(&self, edges: &DataFrame, spec: &EdgeListSpec, kind: GraphKind) -> Result<Self::Graph>;
}

impl<B: GraphBuilder + ?Sized> GraphBuilder for &B {
    type Graph = B::Graph;

    fn build(&self, edges: &DataFrame, spec: &EdgeListSpec, kind: GraphKind) -> Result<Self::Graph> {
        (**self).build(edges, spec, kind)
    }
}
