use std::collections::BTreeSet;

use proptest::prelude::*;
use propgraph::{
    ColumnData, DType, DataFrame, Key, PropertyGraph, PropertyGraphConfig, RowMask, Selection, Value,
};

fn graph(workers: usize) -> PropertyGraph {
    PropertyGraph::with_config(PropertyGraphConfig::new().with_num_workers(workers)).unwrap()
}

fn edge_batch(pairs: &[(i64, i64)]) -> DataFrame {
    DataFrame::new(vec![
        ("s", ColumnData::from(pairs.iter().map(|p| p.0).collect::<Vec<i64>>())),
        ("d", ColumnData::from(pairs.iter().map(|p| p.1).collect::<Vec<i64>>())),
    ])
    .unwrap()
}

fn arb_mask(len: usize) -> impl Strategy<Value = Option<RowMask>> {
    prop::option::of(prop::collection::vec(any::<bool>(), len).prop_map(|bits| RowMask::new(vec![bits])))
}

fn arb_selection() -> impl Strategy<Value = Selection> {
    (arb_mask(3), arb_mask(4)).prop_map(|(v, e)| Selection::from_masks(v, e))
}

proptest! {
    #[test]
    fn prop_edge_ids_are_dense_and_ordered(
        batches in prop::collection::vec(prop::collection::vec((0i64..20, 0i64..20), 1..8), 1..6),
        workers in 1usize..5,
    ) {
        let mut g = graph(workers);
        let mut expected_start = 0i64;
        for pairs in &batches {
            let ids = g.add_edge_data(&edge_batch(pairs), ("s", "d"), None, None).unwrap();
            prop_assert_eq!(ids.start, expected_start);
            prop_assert_eq!(ids.end - ids.start, pairs.len() as i64);
            expected_start = ids.end;
        }

        let total: usize = batches.iter().map(Vec::len).sum();
        let table = g.edge_store().table().unwrap();
        let ids: Vec<Key> = table.unique("_EDGE_ID_").unwrap();
        prop_assert_eq!(table.num_rows(), total);
        prop_assert_eq!(ids, (0..total as i64).map(Key::Int).collect::<Vec<_>>());
    }

    #[test]
    fn prop_vertex_count_is_union_of_identities(
        vertex_batches in prop::collection::vec(prop::collection::vec(0i64..30, 1..6), 0..3),
        edges in prop::collection::vec((0i64..30, 0i64..30), 0..10),
    ) {
        let mut g = graph(2);
        let mut expected = BTreeSet::new();
        for ids in &vertex_batches {
            let batch = DataFrame::new(vec![("id", ColumnData::from(ids.clone()))]).unwrap();
            g.add_vertex_data(&batch, "id", Some("v"), None).unwrap();
            expected.extend(ids.iter().copied());
        }
        if !edges.is_empty() {
            g.add_edge_data(&edge_batch(&edges), ("s", "d"), None, None).unwrap();
            expected.extend(edges.iter().flat_map(|&(s, d)| [s, d]));
        }

        prop_assert_eq!(g.get_num_vertices(None, true).unwrap(), expected.len());
        let mut seen: Vec<i64> = g.get_vertices().unwrap().iter().filter_map(Value::as_int).collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, expected.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn prop_selection_combine_is_associative(a in arb_selection(), b in arb_selection(), c in arb_selection()) {
        let left = a.combine(&b).combine(&c);
        let right = a.combine(&b.combine(&c));
        prop_assert_eq!(&left, &right);
        prop_assert_eq!(a.combine(&Selection::new()), a.clone());
        if a.edge_mask().is_some() {
            prop_assert_eq!(left.edge_mask(), a.edge_mask());
        }
    }

    #[test]
    fn prop_declared_integer_dtype_survives_merges(
        scores in prop::collection::vec(any::<i64>(), 1..10),
        extra in 1usize..5,
    ) {
        let mut g = graph(3);
        let n = scores.len() as i64;
        let scored = DataFrame::new(vec![
            ("id", ColumnData::from((0..n).collect::<Vec<i64>>())),
            ("score", ColumnData::from(scores.clone())),
        ])
        .unwrap();
        let unscored = DataFrame::new(vec![
            ("id", ColumnData::from((1000..1000 + extra as i64).collect::<Vec<i64>>())),
        ])
        .unwrap();
        g.add_vertex_data(&scored, "id", Some("a"), None).unwrap();
        g.add_vertex_data(&unscored, "id", Some("b"), None).unwrap();

        let mut table = g.get_vertex_data(None, None, None).unwrap().unwrap();
        prop_assert_eq!(table.dtype("score"), Some(DType::Int64));

        g.vertex_store().registry().restore(&mut table).unwrap();
        prop_assert_eq!(table.dtype("score"), Some(DType::Int64));
        let restored = table.column("score").unwrap().values();
        let expected: Vec<Value> = scores
            .iter()
            .map(|&s| Value::Int(s))
            .chain(std::iter::repeat(Value::Null).take(extra))
            .collect();
        prop_assert_eq!(restored, expected);
    }

    #[test]
    fn prop_unified_integers_restore_exactly(
        ints in prop::collection::vec(-(1i64 << 53)..=(1i64 << 53), 1..8),
        floats in prop::collection::vec(-1_000i64..1_000, 1..4),
    ) {
        let mut g = graph(2);
        let n = ints.len() as i64;
        let exact = DataFrame::new(vec![
            ("id", ColumnData::from((0..n).collect::<Vec<i64>>())),
            ("score", ColumnData::from(ints.clone())),
        ])
        .unwrap();
        let whole_floats = DataFrame::new(vec![
            ("id", ColumnData::from((100..100 + floats.len() as i64).collect::<Vec<i64>>())),
            ("score", ColumnData::from(floats.iter().map(|&f| f as f64).collect::<Vec<f64>>())),
        ])
        .unwrap();
        g.add_vertex_data(&exact, "id", None, None).unwrap();
        g.add_vertex_data(&whole_floats, "id", None, None).unwrap();

        let mut table = g.get_vertex_data(None, None, None).unwrap().unwrap();
        prop_assert_eq!(table.dtype("score"), Some(DType::Float64));
        g.vertex_store().registry().restore(&mut table).unwrap();
        let expected: Vec<Value> = ints.iter().chain(&floats).map(|&s| Value::Int(s)).collect();
        prop_assert_eq!(table.column("score").unwrap().values(), expected);
    }
}
