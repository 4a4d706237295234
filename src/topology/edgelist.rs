//! Reference graph builder: a dense, optionally weighted edge list.

use arrow::array::AsArray;
use arrow::datatypes::Float64Type;
use hashbrown::HashMap;

use crate::frame::DataFrame;
use crate::model::{ColumnData, DType, Key};
use crate::{Error, Result};
use super::{EdgeListSpec, GraphBuilder, GraphKind};

/// Bidirectional map between external vertex identities and dense ids.
///
/// Dense ids follow the sort order of the external identities, so the same
/// set of vertices always renumbers the same way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenumberMap {
    external: Vec<Key>,
    internal: HashMap<Key, u32>,
}

impl RenumberMap {
    fn from_keys(mut keys: Vec<Key>) -> Result<Self> {
        keys.sort();
        keys.dedup();
        if keys.len() > u32::MAX as usize {
            return Err(Error::ValueError(format!("{} vertices exceed the u32 id space", keys.len())));
        }
        let internal = keys.iter().enumerate().map(|(i, k)| (k.clone(), i as u32)).collect();
        Ok(Self { external: keys, internal })
    }

    pub fn len(&self) -> usize {
        self.external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.external.is_empty()
    }

    pub fn to_internal(&self, external: &Key) -> Option<u32> {
        self.internal.get(external).copied()
    }

    pub fn to_external(&self, internal: u32) -> Option<&Key> {
        self.external.get(internal as usize)
    }

    /// External identities in dense id order.
    pub fn externals(&self) -> &[Key] {
        &self.external
    }
}

/// A topology-only graph: parallel `src`/`dst` arrays of dense vertex ids.
///
/// Undirected graphs store each edge once, in the orientation it was
/// ingested; `directed` tells consumers how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeList {
    pub src: Vec<u32>,
    pub dst: Vec<u32>,
    pub weights: Option<Vec<f64>>,
    pub renumber_map: Option<RenumberMap>,
    pub num_vertices: usize,
    pub kind: GraphKind,
}

impl EdgeList {
    pub fn num_edges(&self) -> usize {
        self.src.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn is_directed(&self) -> bool {
        self.kind.directed
    }

    pub fn is_weighted(&self) -> bool {
        self.weights.is_some()
    }

    /// `(src, dst, weight)` triples in edge order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, Option<f64>)> + '_ {
        (0..self.src.len()).map(|i| (self.src[i], self.dst[i], self.weights.as_ref().map(|w| w[i])))
    }

    /// The external identity of dense vertex `v`. Without renumbering the
    /// dense id is the identity.
    pub fn external_id(&self, v: u32) -> Option<Key> {
        match &self.renumber_map {
            Some(map) => map.to_external(v).cloned(),
            None => ((v as usize) < self.num_vertices).then_some(Key::Int(v as i64)),
        }
    }

    /// Out-degree per dense vertex id (both endpoints for undirected graphs).
    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.num_vertices];
        for (s, d, _) in self.iter() {
            degrees[s as usize] += 1;
            if !self.kind.directed && s != d {
                degrees[d as usize] += 1;
            }
        }
        degrees
    }
}

/// Builds an [`EdgeList`] from an edge table.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeListBuilder;

impl EdgeListBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl GraphBuilder for EdgeListBuilder {
    type Graph = EdgeList;

    fn build(&self, edges: &DataFrame, spec: &EdgeListSpec, kind: GraphKind) -> Result<EdgeList> {
        let src = edges.column(&spec.source)?;
        let dst = edges.column(&spec.destination)?;
        let weights = spec.weight.as_deref().map(|w| weights(edges, w)).transpose()?;

        let (src, dst, renumber_map, num_vertices) = if spec.renumber {
            let keys = (0..src.len()).map(|i| src.key(i)).chain((0..dst.len()).map(|i| dst.key(i))).collect();
            let map = RenumberMap::from_keys(keys)?;
            let dense = |col: &ColumnData| -> Result<Vec<u32>> {
                (0..col.len())
                    .map(|i| {
                        map.to_internal(&col.key(i))
                            .ok_or_else(|| Error::ValueError(format!("vertex {} missing from renumber map", col.get(i))))
                    })
                    .collect()
            };
            let (s, d) = (dense(&src)?, dense(&dst)?);
            let n = map.len();
            (s, d, Some(map), n)
        } else {
            let (s, d) = (raw_ids(&src, &spec.source)?, raw_ids(&dst, &spec.destination)?);
            let n = s.iter().chain(&d).max().map_or(0, |&m| m as usize + 1);
            (s, d, None, n)
        };

        Ok(EdgeList { src, dst, weights, renumber_map, num_vertices, kind })
    }
}

fn weights(edges: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let col = edges.column(name)?;
    if !col.dtype().is_numeric() {
        return Err(Error::TypeError { expected: "numeric weight".into(), got: col.dtype().name().into() });
    }
    col.cast(DType::Float64)?
        .array()
        .as_primitive::<Float64Type>()
        .iter()
        .map(|w| w.ok_or_else(|| Error::ValueError(format!("weight column '{name}' contains missing values"))))
        .collect()
}

/// Identities used as dense ids directly; they must be non-negative
/// integers that fit in `u32`.
fn raw_ids(col: &ColumnData, name: &str) -> Result<Vec<u32>> {
    if !col.dtype().is_integer() {
        return Err(Error::TypeError {
            expected: "integer vertex ids when renumbering is disabled".into(),
            got: format!("{} for column '{name}'", col.dtype().name()),
        });
    }
    col.values()
        .iter()
        .map(|v| {
            v.as_int()
                .and_then(|i| u32::try_from(i).ok())
                .ok_or_else(|| Error::ValueError(format!("vertex id {v} in '{name}' is not a valid dense id")))
        })
        .collect()
}
