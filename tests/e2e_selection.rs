//! End-to-end tests for predicate selection over the edge store.

use pretty_assertions::assert_eq;
use propgraph::expr::{col, lit, parse};
use propgraph::{ColumnData, DataFrame, Error, PropertyGraph, PropertyGraphConfig, Selection};

// ============================================================================
// Helpers
// ============================================================================

/// Six transfers over two batches; `memo` only exists in the second.
fn transfers() -> PropertyGraph {
    let mut g = PropertyGraph::with_config(PropertyGraphConfig::new().with_num_workers(4)).unwrap();
    let wires = DataFrame::new(vec![
        ("from", ColumnData::from(vec![1i64, 2, 3, 4])),
        ("to", ColumnData::from(vec![2i64, 3, 4, 5])),
        ("amount", ColumnData::from(vec![10.0f64, 250.0, 75.5, 1000.0])),
    ])
    .unwrap();
    let checks = DataFrame::new(vec![
        ("from", ColumnData::from(vec![5i64, 6])),
        ("to", ColumnData::from(vec![1i64, 1])),
        ("amount", ColumnData::from(vec![40.0f64, 60.0])),
        ("memo", ColumnData::from(vec![Some("rent"), None])),
    ])
    .unwrap();
    g.add_edge_data(&wires, ("from", "to"), Some("wire"), None).unwrap();
    g.add_edge_data(&checks, ("from", "to"), Some("check"), None).unwrap();
    g
}

fn selected(g: &PropertyGraph, predicate: &str) -> usize {
    g.select_edges(predicate).unwrap().edge_mask().unwrap().count_selected()
}

// ============================================================================
// 1. Predicate text
// ============================================================================

#[test]
fn test_comparisons_and_logic() {
    let g = transfers();
    assert_eq!(selected(&g, "amount > 50"), 4);
    assert_eq!(selected(&g, "amount > 50 and _TYPE_ == 'wire'"), 3);
    assert_eq!(selected(&g, "(amount < 20) | (_TYPE_ == 'check')"), 3);
    assert_eq!(selected(&g, "not amount >= 100"), 4);
    assert_eq!(selected(&g, "_SRC_ in [1, 5, 6]"), 3);
    assert_eq!(selected(&g, "_EDGE_ID_ % 2 == 0"), 3);
}

#[test]
fn test_missing_values() {
    let g = transfers();
    assert_eq!(selected(&g, "memo is null"), 5);
    assert_eq!(selected(&g, "memo is not null"), 1);
    // Comparisons against a missing value select nothing, in either polarity.
    assert_eq!(selected(&g, "memo == 'rent'"), 1);
    assert_eq!(selected(&g, "memo != 'rent'"), 0);
}

#[test]
fn test_predicate_errors() {
    let g = transfers();
    assert!(matches!(g.select_edges("amount >"), Err(Error::SyntaxError { .. })));
    assert!(matches!(g.select_edges("balance > 3"), Err(Error::ColumnNotFound(_))));
    assert!(matches!(g.select_edges("amount + 1"), Err(Error::TypeError { .. })));
    assert!(matches!(g.select_edges("memo > 3"), Err(Error::TypeError { .. })));

    let empty = PropertyGraph::new();
    assert!(matches!(empty.select_edges("amount > 3"), Err(Error::ValueError(_))));
}

// ============================================================================
// 2. Expression builders
// ============================================================================

#[test]
fn test_built_expression_matches_text() {
    let g = transfers();
    let built = col("amount").gt(lit(50)).and(col("_TYPE_").eq(lit("wire")));
    let text = parse("amount > 50 and _TYPE_ == 'wire'").unwrap();
    assert_eq!(built, text);
    assert_eq!(g.select_edges(&built).unwrap(), g.select_edges(text).unwrap());
}

// ============================================================================
// 3. Combining selections
// ============================================================================

#[test]
fn test_combined_selection_is_left_biased() {
    let g = transfers();
    let big = g.select_edges("amount > 100").unwrap();
    let small = g.select_edges("amount < 100").unwrap();

    let combined = &big + &small;
    assert_eq!(combined.edge_mask(), big.edge_mask());
    assert_eq!((small.clone() + big).edge_mask(), small.edge_mask());
    assert_eq!(Selection::new().combine(&small), small);
}

#[test]
fn test_masks_follow_store_partitions() {
    let g = transfers();
    let sel = g.select_edges("amount > 0").unwrap();
    let mask = sel.edge_mask().unwrap();
    assert_eq!(mask.partition_lens(), g.edge_store().table().unwrap().partition_lens());
    assert_eq!(mask.generation(), g.edge_store().generation());
    assert!(sel.vertex_mask().is_none());
}

#[test]
fn test_vertex_selection_unsupported() {
    let g = transfers();
    assert!(matches!(g.select_vertices("_VERTEX_ > 1", None), Err(Error::NotImplemented(_))));
}
