//! FILENAME: tests/test_graph_pivot.rs
//! Integration tests for pivots built from node/parent identities.

mod common;

use common::{minute, ProcessFixture};
use pivot_engine::{
    build_from_graph, AutoBinner, CellValue, ColumnType, GraphEntry, GraphNodeRef,
    GraphPivotBuilder, MemoryTable, PivotError, SourceRow, TimeColumn, TreeBinner,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn edge_table(edges: &[(&str, Option<&str>)]) -> MemoryTable {
    let mut table = MemoryTable::with_columns([
        ("Node", ColumnType::Text),
        ("Parent", ColumnType::Text),
        ("At", ColumnType::DateTime),
    ]);
    for (i, (node, parent)) in edges.iter().enumerate() {
        table.push_row(vec![(*node).into(), (*parent).into(), minute(i as u32).into()]);
    }
    table
}

fn edge_entry(row: SourceRow<'_, MemoryTable>) -> Option<GraphEntry> {
    let id = row.text("Node")?;
    let entry = GraphEntry::new(GraphNodeRef::new(id.clone(), "node", id));
    Some(match row.text("Parent") {
        Some(parent) => entry.with_parent(GraphNodeRef::new(parent.clone(), "node", parent)),
        None => entry,
    })
}

// ============================================================================
// ORDERING
// ============================================================================

#[test]
fn test_child_row_before_parent_row() {
    let table = edge_table(&[("c", Some("p")), ("p", None)]);
    let tree = build_from_graph(&table, &TimeColumn::named("At"), edge_entry).unwrap();

    let p = tree.find(&[("node", "p")]).unwrap();
    let c = tree.find(&[("node", "p"), ("node", "c")]).unwrap();
    assert_eq!(tree.parent(c), Some(p));
    assert_eq!(tree.children(tree.root()), &[p]);
}

#[test]
fn test_process_tree_shape() {
    let table = ProcessFixture::table();
    let tree = build_from_graph(&table, &TimeColumn::FirstTimeTyped, ProcessFixture::entry).unwrap();

    let init = tree.find(&[("process", "init (1)")]).unwrap();
    let nginx = tree.find(&[("process", "init (1)"), ("process", "nginx (101)")]).unwrap();
    assert_eq!(tree.children(tree.root()), &[init]);
    assert_eq!(tree.parent(nginx), Some(init));

    let workers: Vec<_> = tree
        .children(nginx)
        .iter()
        .filter_map(|&id| tree.node(id).value())
        .collect();
    assert_eq!(workers, vec!["worker (103)", "worker (102)"]);

    let worker = tree
        .find(&[("process", "init (1)"), ("process", "nginx (101)"), ("process", "worker (103)")])
        .unwrap();
    assert_eq!(tree.node(worker).row_ids().collect::<Vec<_>>(), vec![0, 5]);
    assert_eq!(tree.node(worker).display_value(), "[pid=103]: worker (103)");
    assert_eq!(tree.node(worker).min_timestamp(), Some(minute(12)));
    assert_eq!(tree.node(worker).max_timestamp(), Some(minute(40)));

    let sh = tree.children(worker)[0];
    assert_eq!(tree.depth(sh), 4);
    assert_eq!(tree.total_rows(), 6);
    assert_eq!(tree.len(), 6);
}

// ============================================================================
// STRUCTURAL CONFLICTS
// ============================================================================

#[test]
fn test_two_parents_for_one_node_fail_the_build() {
    let table = edge_table(&[("P1", None), ("A", Some("P1")), ("P2", None), ("A", Some("P2"))]);
    let err = build_from_graph(&table, &TimeColumn::named("At"), edge_entry).unwrap_err();
    assert_eq!(
        err,
        PivotError::ParentConflict {
            node: "A".to_string(),
            existing: "P1".to_string(),
            proposed: "P2".to_string(),
        }
    );
}

#[test]
fn test_cycle_fails_the_build() {
    let table = edge_table(&[("a", Some("b")), ("b", Some("c")), ("c", Some("a"))]);
    let err = build_from_graph(&table, &TimeColumn::named("At"), edge_entry).unwrap_err();
    assert!(matches!(err, PivotError::CyclicLineage(_)));
}

#[test]
fn test_unknown_time_column() {
    let table = edge_table(&[("a", None)]);
    let err = build_from_graph(&table, &TimeColumn::named("When"), edge_entry).unwrap_err();
    assert_eq!(err, PivotError::UnknownColumn("When".to_string()));
}

// ============================================================================
// ROWS WITHOUT NODES OR TIMESTAMPS
// ============================================================================

#[test]
fn test_rows_without_node_are_skipped() {
    let mut table = edge_table(&[("a", None)]);
    table.push_row(vec![CellValue::Empty, "a".into(), minute(3).into()]);
    let tree = build_from_graph(&table, &TimeColumn::named("At"), edge_entry).unwrap();

    assert_eq!(tree.len(), 2);
    let stats = tree.stats();
    assert_eq!(stats.rows_seen, 2);
    assert_eq!(stats.rows_added, 1);
    assert_eq!(stats.rows_skipped, 1);
}

#[test]
fn test_streaming_builder_and_binning() {
    let mut builder = GraphPivotBuilder::new();
    let leaf = GraphEntry::new(GraphNodeRef::new("leaf", "span", "query"))
        .with_parent(GraphNodeRef::new("mid", "span", "handler"));
    let mid = GraphEntry::new(GraphNodeRef::new("mid", "span", "handler"))
        .with_parent(GraphNodeRef::new("top", "span", "request"));
    let top = GraphEntry::new(GraphNodeRef::new("top", "span", "request"));

    builder.push_row(0, Some(minute(5)), leaf.clone()).unwrap();
    builder.push_row(1, Some(minute(50)), leaf).unwrap();
    builder.push_row(2, Some(minute(1)), mid).unwrap();
    builder.push_row(3, None, top).unwrap();
    assert_eq!(builder.node_count(), 3);

    let mut tree = builder.finish().unwrap();
    tree.set_propagate_heatmap_to_parent(true);
    let range = TreeBinner::new(AutoBinner::default()).bin(&mut tree).unwrap();

    let top = tree.find(&[("span", "request")]).unwrap();
    let heatmap = tree.node(top).heatmap();
    assert_eq!(heatmap.len(), range.num_bins());
    assert_eq!(heatmap.iter().sum::<u32>(), 3);
    assert_eq!(tree.node(top).row_count(), 0);
    assert_eq!(tree.node(top).max_timestamp_children(), Some(minute(50)));
}
