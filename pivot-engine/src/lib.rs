//! FILENAME: pivot-engine/src/lib.rs
//! Hierarchical pivot engine with per-node time heatmaps.
//!
//! This crate groups tabular rows into a tree and counts, per node, how the
//! rows fall into equal-width time bins. It depends on `timebin` for
//! everything about time ranges and bin sizing.
//!
//! Layers:
//! - `source`: The row-source contract and an in-memory table (WHAT we read)
//! - `definition`: Serializable configuration (what the pivot IS)
//! - `tree`: The arena-backed pivot tree and its traversals
//! - `fixed` / `graph`: The two ways of building a tree (HOW we group)
//! - `binner`: Heatmap computation and drill-down (HOW we count)
//! - `view`: Flattened output for the charting layer (WHAT we display)

pub mod binner;
pub mod definition;
pub mod error;
pub mod fixed;
pub mod graph;
pub mod source;
pub mod tree;
pub mod view;

pub use binner::{TimeExtent, TreeBinner};
pub use definition::{ColumnSelector, PivotDefinition, TimeColumn};
pub use error::PivotError;
pub use fixed::build_fixed;
pub use graph::{build_from_graph, GraphEntry, GraphNodeRef, GraphPivotBuilder};
pub use source::{
    CellValue, ColumnDef, ColumnIndex, ColumnType, MemoryTable, RowId, RowSource, SourceRow,
    NULL_VALUE,
};
pub use tree::{BuildStats, NodeId, NodeKey, PivotTree, RowEntry, TreeNode};
pub use view::{BinDescriptor, DrillDownResult, HeatmapView, HeatmapViewRow};

pub use timebin::{AutoBinner, BinnedRange, BinnedRangeFactory, BinningPolicy, TimeRange};

/// Builds, configures and bins a fixed-column pivot in one call.
/// This is the main entry point for callers holding a `PivotDefinition`.
pub fn build_pivot<S: RowSource + ?Sized>(
    source: &S,
    definition: &PivotDefinition,
) -> Result<PivotTree, PivotError> {
    let mut tree = build_fixed(source, &definition.time_column, &definition.dimensions)?;
    tree.set_propagate_heatmap_to_parent(definition.propagate_heatmap_to_parent);
    TreeBinner::with_policy(definition.binning)
        .include_root(definition.include_root_in_extent)
        .bin(&mut tree);
    Ok(tree)
}
