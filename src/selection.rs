//! Vertex/edge row selections.

use std::ops::Add;

use crate::frame::RowMask;

/// The result of one or more `select_*` calls: an optional vertex mask and
/// an optional edge mask over the current property stores.
///
/// Selections combine left-biased: each side keeps the first mask that is
/// present and never recomputes a union of two present masks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    vertex: Option<RowMask>,
    edge: Option<RowMask>,
}

impl Selection {
    /// An empty selection; extraction with it uses every edge.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_masks(vertex: Option<RowMask>, edge: Option<RowMask>) -> Self {
        Self { vertex, edge }
    }

    pub fn vertices(mask: RowMask) -> Self {
        Self { vertex: Some(mask), edge: None }
    }

    pub fn edges(mask: RowMask) -> Self {
        Self { vertex: None, edge: Some(mask) }
    }

    pub fn vertex_mask(&self) -> Option<&RowMask> {
        self.vertex.as_ref()
    }

    pub fn edge_mask(&self) -> Option<&RowMask> {
        self.edge.as_ref()
    }

    /// Fill each absent side of `self` from `other`.
    pub fn combine(&self, other: &Selection) -> Selection {
        Selection {
            vertex: self.vertex.clone().or_else(|| other.vertex.clone()),
            edge: self.edge.clone().or_else(|| other.edge.clone()),
        }
    }
}

impl Add for Selection {
    type Output = Selection;

    fn add(self, other: Selection) -> Selection {
        Selection {
            vertex: self.vertex.or(other.vertex),
            edge: self.edge.or(other.edge),
        }
    }
}

impl Add<&Selection> for &Selection {
    type Output = Selection;

    fn add(self, other: &Selection) -> Selection {
        self.combine(other)
    }
}
