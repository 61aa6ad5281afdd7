//! FILENAME: pivot-engine/src/binner.rs
//! PURPOSE: Heatmap computation over a pivot tree.
//! CONTEXT: The tree holds at most one active `BinnedRange`. Setting it, or
//! flipping the propagation switch, recomputes every node's heatmap:
//! - no range: heatmaps are cleared
//! - propagation off: each node counts only its own rows
//! - propagation on: post-order, each node adds its children's counts
//!
//! `TreeBinner` derives the range from the tree's global time extent.

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use timebin::{AutoBinner, BinnedRange, BinnedRangeFactory, BinningPolicy, TimeRange};

use crate::error::PivotError;
use crate::source::RowId;
use crate::tree::{NodeId, PivotTree};
use crate::view::DrillDownResult;

fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

// ============================================================================
// TREE-LEVEL BINNING STATE
// ============================================================================

impl PivotTree {
    pub fn binned_range(&self) -> Option<BinnedRange> {
        self.binned_range
    }

    pub fn propagate_heatmap_to_parent(&self) -> bool {
        self.propagate_heatmap_to_parent
    }

    /// Installs (or with `None`, removes) the active range and recomputes
    /// every heatmap.
    pub fn set_binned_range(&mut self, range: Option<BinnedRange>) {
        self.binned_range = range;
        self.recompute_heatmaps();
    }

    /// Validates and installs an explicit range.
    ///
    /// Every node then holds a `num_bins`-long heatmap, so memory grows with
    /// `num_bins * len()`. The 1000-bin cap of the auto binners does not
    /// apply here.
    pub fn set_bins(
        &mut self,
        start: DateTime<Utc>,
        bin_size: TimeDelta,
        num_bins: usize,
    ) -> Result<BinnedRange, PivotError> {
        let range = BinnedRange::new(start, bin_size, num_bins)?;
        self.set_binned_range(Some(range));
        Ok(range)
    }

    pub fn set_propagate_heatmap_to_parent(&mut self, propagate: bool) {
        if self.propagate_heatmap_to_parent != propagate {
            self.propagate_heatmap_to_parent = propagate;
            self.recompute_heatmaps();
        }
    }

    fn recompute_heatmaps(&mut self) {
        let Some(range) = self.binned_range else {
            let ids: Vec<NodeId> = self.node_ids().collect();
            for id in ids {
                let node = self.node_mut(id);
                node.heatmap.clear();
                node.min_timestamp_children = None;
                node.max_timestamp_children = None;
            }
            return;
        };

        if !self.propagate_heatmap_to_parent {
            let ids: Vec<NodeId> = self.node_ids().collect();
            for id in ids {
                let node = self.node_mut(id);
                node.heatmap = range.histogram(node.rows().iter().map(|r| r.timestamp));
                node.min_timestamp_children = None;
                node.max_timestamp_children = None;
            }
            return;
        }

        for id in self.postfix_order(true) {
            let (heatmap, min, max) = {
                let node = self.node(id);
                let mut heatmap = range.histogram(node.rows().iter().map(|r| r.timestamp));
                let mut min = node.min_timestamp();
                let mut max = node.max_timestamp();
                for &child in node.children() {
                    let child = self.node(child);
                    for (total, count) in heatmap.iter_mut().zip(child.heatmap()) {
                        *total += count;
                    }
                    min = earliest(min, child.min_timestamp_children);
                    max = latest(max, child.max_timestamp_children);
                }
                (heatmap, min, max)
            };
            let node = self.node_mut(id);
            node.heatmap = heatmap;
            node.min_timestamp_children = min;
            node.max_timestamp_children = max;
        }
    }

    // ========================================================================
    // DRILL-DOWN
    // ========================================================================

    /// Ids of the node's own rows whose timestamp maps to `bin`.
    /// Empty without an active range, for a bin past the end, or for a node
    /// without rows.
    pub fn row_ids_by_bin(&self, node: NodeId, bin: usize) -> Vec<RowId> {
        let Some(range) = self.binned_range else {
            return Vec::new();
        };
        let rows = self.node(node).rows();
        range.row_ids_in_bin(bin, rows.iter().map(|r| (r.timestamp, r.row_id)))
    }

    /// Collects up to `max_records` row ids behind one heatmap cell.
    ///
    /// With propagation on, the node's whole subtree is searched so the
    /// total agrees with the propagated heatmap.
    pub fn drill_down(&self, node: NodeId, bin: usize, max_records: usize) -> DrillDownResult {
        let path = self.path(node).into_iter().cloned().collect();
        let mut result = DrillDownResult::new(node, path, bin);
        result.max_records = max_records;

        let Some(range) = self.binned_range else {
            return result;
        };
        let (Some(start), Some(end)) = (range.bin_start(bin), range.bin_end(bin)) else {
            return result;
        };
        result.bin_start = Some(start);
        result.bin_end = Some(end);

        let nodes = if self.propagate_heatmap_to_parent {
            self.subtree(node)
        } else {
            vec![node]
        };

        let mut count = 0;
        for id in nodes {
            for row in self.node(id).rows() {
                if range.map_timestamp_to_bin(row.timestamp) == Some(bin) {
                    count += 1;
                    if result.row_ids.len() < max_records {
                        result.row_ids.push(row.row_id);
                    }
                }
            }
        }

        result.total_count = count;
        result.is_truncated = count > max_records;
        result
    }
}

// ============================================================================
// TREE BINNER
// ============================================================================

/// Row count and overall time span of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeExtent {
    pub num_points: usize,
    /// `None` when no node has rows or a reported range.
    pub range: Option<TimeRange>,
}

/// Chooses a binned range for a whole tree and applies it.
#[derive(Debug, Clone)]
pub struct TreeBinner<F = AutoBinner> {
    factory: F,
    include_root: bool,
}

impl Default for TreeBinner<AutoBinner> {
    fn default() -> Self {
        TreeBinner::new(AutoBinner::default())
    }
}

impl TreeBinner<BinningPolicy> {
    pub fn with_policy(policy: BinningPolicy) -> Self {
        TreeBinner::new(policy)
    }
}

impl<F: BinnedRangeFactory> TreeBinner<F> {
    /// Uses `factory` to turn `(num_points, min, max)` into a range.
    pub fn new(factory: F) -> Self {
        TreeBinner {
            factory,
            include_root: false,
        }
    }

    /// Whether rows attached directly to the root count toward the extent.
    pub fn include_root(mut self, include_root: bool) -> Self {
        self.include_root = include_root;
        self
    }

    /// Walks the tree once, summing rows and folding every node's row range
    /// and reported range into one span.
    pub fn extent(&self, tree: &PivotTree) -> TimeExtent {
        let mut extent = TimeExtent::default();
        tree.visit(self.include_root, |_, node| {
            extent.num_points += node.row_count();
            for range in [node.row_range(), node.reported_range()].into_iter().flatten() {
                extent.range = Some(extent.range.map_or(range, |r| r.union(range)));
            }
        });
        extent
    }

    /// The range the factory picks for this tree, without applying it.
    pub fn binned_range(&self, tree: &PivotTree) -> Option<BinnedRange> {
        let extent = self.extent(tree);
        let span = extent.range?;
        Some(self.factory.binned_range(extent.num_points, span.start, span.end))
    }

    /// Derives a range for `tree` and installs it, recomputing heatmaps.
    /// A tree with no time information ends up with no range.
    pub fn bin(&self, tree: &mut PivotTree) -> Option<BinnedRange> {
        let range = self.binned_range(tree);
        match &range {
            Some(range) => debug!(
                "Binned tree of {} nodes: start {}, width {} ms, {} bins",
                tree.len(),
                range.start(),
                range.bin_size().num_milliseconds(),
                range.num_bins()
            ),
            None => debug!("Tree has no time extent; clearing heatmaps"),
        }
        tree.set_binned_range(range);
        range
    }
}
