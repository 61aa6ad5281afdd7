//! FILENAME: pivot-engine/src/view.rs
//! Heatmap View - Renderable output for the charting layer.
//!
//! This module flattens a binned `PivotTree` into plain, serializable rows:
//! - One descriptor per time bin (index and bounds)
//! - One row per node, in pre-order, with its depth for indentation
//! - Drill-down results mapping a heatmap cell back to source rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use timebin::TimeRange;

use crate::source::RowId;
use crate::tree::{NodeId, NodeKey, PivotTree};

// ============================================================================
// BIN DESCRIPTORS
// ============================================================================

/// One column of the heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinDescriptor {
    pub index: usize,
    /// Inclusive.
    pub start: DateTime<Utc>,
    /// Exclusive.
    pub end: DateTime<Utc>,
}

// ============================================================================
// NODE ROWS
// ============================================================================

/// One node of the tree as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapViewRow {
    pub node: NodeId,
    /// 0 for the root, 1 for its children, and so on.
    pub depth: usize,
    pub name: Option<String>,
    pub value: Option<String>,
    /// Value decorated with the node's properties.
    pub display_value: String,
    pub category: Option<String>,
    /// Rows attached to this node itself.
    pub row_count: usize,
    /// Reported range if present, otherwise the span of the node's rows.
    pub time_range: Option<TimeRange>,
    /// Per-bin counts; empty when the tree has no active range.
    pub heatmap: Vec<u32>,
    pub has_children: bool,
}

/// A flattened, binned pivot tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapView {
    pub bins: Vec<BinDescriptor>,
    pub rows: Vec<HeatmapViewRow>,
    /// Whether each row's heatmap includes its descendants.
    pub propagated: bool,
}

impl HeatmapView {
    /// Snapshots `tree` in pre-order.
    pub fn from_tree(tree: &PivotTree, include_root: bool) -> Self {
        let bins: Vec<BinDescriptor> = tree
            .binned_range()
            .map(|range| {
                range
                    .bins()
                    .map(|(index, start, end)| BinDescriptor { index, start, end })
                    .collect()
            })
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(tree.len());
        tree.visit(include_root, |id, node| {
            rows.push(HeatmapViewRow {
                node: id,
                depth: tree.depth(id),
                name: node.name().map(str::to_string),
                value: node.value().map(str::to_string),
                display_value: node.display_value(),
                category: node.category().map(str::to_string),
                row_count: node.row_count(),
                time_range: node.time_range(),
                heatmap: node.heatmap().to_vec(),
                has_children: node.has_children(),
            });
        });

        HeatmapView {
            bins,
            rows,
            propagated: tree.propagate_heatmap_to_parent(),
        }
    }

    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }
}

// ============================================================================
// DRILL-DOWN
// ============================================================================

/// Result of a drill-down operation (source rows behind one heatmap cell).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillDownResult {
    /// The node drilled into.
    pub node: NodeId,

    /// Keys from the root down to the node.
    pub path: Vec<NodeKey>,

    /// The bin index requested.
    pub bin: usize,

    /// Bounds of the bin; `None` when the bin does not exist.
    pub bin_start: Option<DateTime<Utc>>,
    pub bin_end: Option<DateTime<Utc>>,

    /// Matching source row ids, at most `max_records` of them.
    pub row_ids: Vec<RowId>,

    /// Total count of matching rows.
    pub total_count: usize,

    /// Whether `row_ids` was cut short.
    pub is_truncated: bool,

    /// Maximum rows that were fetched.
    pub max_records: usize,
}

impl DrillDownResult {
    pub fn new(node: NodeId, path: Vec<NodeKey>, bin: usize) -> Self {
        DrillDownResult {
            node,
            path,
            bin,
            bin_start: None,
            bin_end: None,
            row_ids: Vec::new(),
            total_count: 0,
            is_truncated: false,
            max_records: 1000,
        }
    }
}
