//! FILENAME: tests/test_heatmap.rs
//! Integration tests for bin sizing, heatmap propagation and drill-down.

mod common;

use chrono::TimeDelta;
use common::{minute, EventFixture};
use pivot_engine::{
    build_fixed, build_pivot, AutoBinner, BinnedRange, BinnedRangeFactory, BinningPolicy,
    HeatmapView, PivotDefinition, PivotTree, TimeColumn, TreeBinner,
};
use timebin::NICE_BIN_SIZES_MS;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn event_tree() -> PivotTree {
    build_fixed(
        &EventFixture::table(),
        &TimeColumn::FirstTimeTyped,
        &["Host".into(), "Service".into()],
    )
    .unwrap()
}

/// Rows in the subtree of every node that fall inside `range`, pre-order.
fn subtree_counts(tree: &PivotTree, range: &BinnedRange) -> Vec<u32> {
    let mut counts = Vec::new();
    tree.visit(true, |id, _| {
        let count = tree
            .subtree(id)
            .into_iter()
            .flat_map(|node| tree.node(node).rows().iter())
            .filter(|row| range.contains(row.timestamp))
            .count();
        counts.push(count as u32);
    });
    counts
}

// ============================================================================
// AUTO BINNING
// ============================================================================

#[test]
fn test_catalog_scenario() {
    let (min, max) = (minute(0), minute(59));
    let range = AutoBinner::new(50, TimeDelta::seconds(1)).binned_range(100, min, max);

    let width = range.bin_size().num_milliseconds();
    assert!(NICE_BIN_SIZES_MS.contains(&width));
    assert_eq!(range.start().timestamp_millis() % width, 0);

    let span = (max - range.start()).num_milliseconds();
    let expected_bins = 1 + (span + width - 1) / width;
    assert_eq!(range.num_bins() as i64, expected_bins);
    assert!(range.contains(min) && range.contains(max));
}

#[test]
fn test_target_size_policy_through_definition() {
    let definition = PivotDefinition::new(TimeColumn::FirstTimeTyped)
        .with_dimension("Host")
        .with_binning(BinningPolicy::TargetSize {
            max_bins: 100,
            target_bin_size_ms: 15 * 60 * 1000,
        });
    let tree = build_pivot(&EventFixture::table(), &definition).unwrap();

    // 59 minutes / 15 -> 3 bins, widened to cover the span, plus one so the
    // last event is inside the half-open range.
    let range = tree.binned_range().unwrap();
    assert_eq!(range.start(), minute(0));
    assert_eq!(range.bin_size(), TimeDelta::milliseconds(1_180_000));
    assert_eq!(range.num_bins(), 4);
    assert!(range.contains(minute(59)));

    let web1 = tree.find(&[("Host", "web-1")]).unwrap();
    assert_eq!(tree.node(web1).heatmap(), &[3, 0, 0, 0]);
}

#[test]
fn test_single_point_gets_one_bin() {
    let mut tree = PivotTree::new();
    let node = tree.add_or_get_child(tree.root(), "Host", "web-1");
    tree.add_row(node, 0, minute(7));

    let range = TreeBinner::new(AutoBinner::default()).bin(&mut tree).unwrap();
    assert_eq!(range.num_bins(), 1);
    assert_eq!(tree.node(node).heatmap(), &[1]);
}

// ============================================================================
// PROPAGATION
// ============================================================================

#[test]
fn test_propagated_heatmap_sums_match_subtree_rows() {
    let mut tree = event_tree();
    tree.set_propagate_heatmap_to_parent(true);
    // Narrow range so some rows fall outside it.
    let range = tree.set_bins(minute(5), TimeDelta::minutes(10), 4).unwrap();

    let expected = subtree_counts(&tree, &range);
    let mut actual = Vec::new();
    tree.visit(true, |_, node| actual.push(node.heatmap().iter().sum::<u32>()));
    assert_eq!(actual, expected);
}

#[test]
fn test_flat_heatmaps_count_own_rows_only() {
    let mut tree = event_tree();
    let range = TreeBinner::new(AutoBinner::default()).bin(&mut tree).unwrap();

    tree.visit(true, |_, node| {
        assert_eq!(node.heatmap().len(), range.num_bins());
        assert_eq!(node.heatmap().iter().sum::<u32>() as usize, node.row_count());
    });
}

#[test]
fn test_unsetting_range_clears_every_heatmap() {
    let mut tree = event_tree();
    TreeBinner::with_policy(BinningPolicy::default()).bin(&mut tree);
    tree.set_binned_range(None);
    tree.visit(true, |_, node| assert!(node.heatmap().is_empty()));
}

// ============================================================================
// DRILL-DOWN
// ============================================================================

#[test]
fn test_drill_down_agrees_with_heatmap() {
    for propagate in [false, true] {
        let mut tree = event_tree();
        tree.set_propagate_heatmap_to_parent(propagate);
        tree.set_bins(minute(0), TimeDelta::minutes(15), 4).unwrap();

        tree.visit(true, |id, node| {
            for (bin, &count) in node.heatmap().iter().enumerate() {
                let result = tree.drill_down(id, bin, 100);
                assert_eq!(result.total_count, count as usize);
                assert_eq!(result.row_ids.len(), count as usize);
                assert!(!result.is_truncated);
            }
        });
    }
}

#[test]
fn test_row_ids_by_bin_for_a_leaf() {
    let mut tree = event_tree();
    tree.set_bins(minute(0), TimeDelta::minutes(15), 4).unwrap();

    let nginx = tree.find(&[("Host", "web-1"), ("Service", "nginx")]).unwrap();
    assert_eq!(tree.row_ids_by_bin(nginx, 0), vec![0, 1]);
    assert!(tree.row_ids_by_bin(nginx, 1).is_empty());
    assert!(tree.row_ids_by_bin(nginx, 4).is_empty());
}

// ============================================================================
// VIEW
// ============================================================================

#[test]
fn test_heatmap_view_round_trips_through_json() {
    let definition = PivotDefinition::new(TimeColumn::FirstTimeTyped)
        .with_dimension("Host")
        .with_propagation(true);
    let tree = build_pivot(&EventFixture::table(), &definition).unwrap();
    let view = HeatmapView::from_tree(&tree, true);

    assert_eq!(view.rows.len(), tree.len());
    assert_eq!(view.num_bins(), tree.binned_range().unwrap().num_bins());

    let json = serde_json::to_string(&view).unwrap();
    let back: HeatmapView = serde_json::from_str(&json).unwrap();
    assert_eq!(back, view);
}
