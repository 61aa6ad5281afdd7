//! FILENAME: pivot-engine/src/graph.rs
//! PURPOSE: Pivot construction from caller-supplied node/parent identities.
//! CONTEXT: Rows arrive in any order relative to the hierarchy, so a child
//! may be seen before its parent. Construction runs in two passes:
//!
//! 1. Collect: every row is folded into a proto-node keyed by its node id.
//!    A declared parent is recorded once and the node is registered as that
//!    parent's child. A second, different parent is a hard conflict.
//! 2. Materialize: proto-nodes without a parent are roots; their lineages are
//!    copied into the real tree with an explicit work stack.
//!
//! Proto-nodes left unreached after step 2 sit on a parent cycle.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use timebin::TimeRange;

use crate::definition::TimeColumn;
use crate::error::PivotError;
use crate::source::{CellValue, RowId, RowSource, SourceRow};
use crate::tree::{BuildStats, NodeId, PivotTree, RowEntry};

// ============================================================================
// ROW-LEVEL DECLARATIONS
// ============================================================================

/// A node as declared by one row: a stable identity plus how to display it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNodeRef {
    /// Unique across the whole row scan.
    pub id: String,
    pub name: String,
    pub value: String,
}

impl GraphNodeRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        GraphNodeRef {
            id: id.into(),
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Everything one row says about the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEntry {
    pub node: GraphNodeRef,
    pub parent: Option<GraphNodeRef>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub reported_range: Option<TimeRange>,
    #[serde(default)]
    pub category: Option<String>,
}

impl GraphEntry {
    pub fn new(node: GraphNodeRef) -> Self {
        GraphEntry {
            node,
            parent: None,
            properties: BTreeMap::new(),
            reported_range: None,
            category: None,
        }
    }

    pub fn with_parent(mut self, parent: GraphNodeRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_reported_range(mut self, range: TimeRange) -> Self {
        self.reported_range = Some(range);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

// ============================================================================
// COLLECT PASS
// ============================================================================

#[derive(Debug)]
struct ProtoNode {
    id: String,
    name: String,
    value: String,
    // Set once the node's own row has been seen.
    declared: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    child_index: FxHashMap<String, usize>,
    rows: Vec<RowEntry>,
    properties: BTreeMap<String, String>,
    reported_range: Option<TimeRange>,
    category: Option<String>,
}

impl ProtoNode {
    fn new(node: &GraphNodeRef) -> Self {
        ProtoNode {
            id: node.id.clone(),
            name: node.name.clone(),
            value: node.value.clone(),
            declared: false,
            parent: None,
            children: Vec::new(),
            child_index: FxHashMap::default(),
            rows: Vec::new(),
            properties: BTreeMap::new(),
            reported_range: None,
            category: None,
        }
    }
}

/// Incremental builder for graph-shaped pivots.
///
/// Feed rows with [`push_row`](Self::push_row) in any order, then call
/// [`finish`](Self::finish) once.
#[derive(Debug, Default)]
pub struct GraphPivotBuilder {
    protos: Vec<ProtoNode>,
    by_id: FxHashMap<String, usize>,
    stats: BuildStats,
}

impl GraphPivotBuilder {
    pub fn new() -> Self {
        GraphPivotBuilder::default()
    }

    /// Number of distinct node ids seen so far, declared parents included.
    pub fn node_count(&self) -> usize {
        self.protos.len()
    }

    fn proto_for(&mut self, node: &GraphNodeRef) -> usize {
        if let Some(&index) = self.by_id.get(&node.id) {
            return index;
        }
        let index = self.protos.len();
        self.protos.push(ProtoNode::new(node));
        self.by_id.insert(node.id.clone(), index);
        index
    }

    /// Rejects a parent that contradicts what earlier rows declared. Runs
    /// before the row touches the builder, so a rejected row leaves no trace.
    fn check_parent(&self, node: &GraphNodeRef, parent: &GraphNodeRef) -> Result<(), PivotError> {
        let index = self.by_id.get(&node.id).copied();

        if let Some(existing) = index.and_then(|index| self.protos[index].parent) {
            let existing = &self.protos[existing].id;
            if *existing != parent.id {
                warn!(
                    "Node '{}' declares parent '{}' but already has parent '{}'",
                    node.id, parent.id, existing
                );
                return Err(PivotError::ParentConflict {
                    node: node.id.clone(),
                    existing: existing.clone(),
                    proposed: parent.id.clone(),
                });
            }
        }

        if let Some(&parent_index) = self.by_id.get(&parent.id) {
            let parent_proto = &self.protos[parent_index];
            if let Some(&registered) = parent_proto.child_index.get(&node.id) {
                if Some(registered) != index {
                    warn!(
                        "Child '{}' of node '{}' is already registered as a different node",
                        node.id, parent_proto.id
                    );
                    return Err(PivotError::ChildCollision {
                        parent: parent_proto.id.clone(),
                        child: node.id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Folds one row into the collected graph.
    ///
    /// A node's name and value come from the first row declaring the node
    /// itself; a parent reference only provides them until then. A row
    /// without a timestamp still declares its node and parent but contributes
    /// no row. A parent equal to the node itself is ignored.
    ///
    /// On error the builder is left exactly as it was before the call.
    pub fn push_row(
        &mut self,
        row_id: RowId,
        timestamp: Option<DateTime<Utc>>,
        entry: GraphEntry,
    ) -> Result<(), PivotError> {
        let GraphEntry {
            node,
            parent,
            properties,
            reported_range,
            category,
        } = entry;
        let parent = parent.filter(|parent| parent.id != node.id);
        if let Some(parent) = &parent {
            self.check_parent(&node, parent)?;
        }

        self.stats.rows_seen += 1;
        let index = self.proto_for(&node);

        let proto = &mut self.protos[index];
        if !proto.declared {
            proto.name = node.name;
            proto.value = node.value;
            proto.declared = true;
        }
        match timestamp {
            Some(timestamp) => {
                proto.rows.push(RowEntry { row_id, timestamp });
                self.stats.rows_added += 1;
            }
            None => {
                trace!("Row {} for node '{}' has no usable timestamp", row_id, proto.id);
                self.stats.rows_skipped += 1;
            }
        }

        proto.properties.extend(properties);
        if let Some(range) = reported_range {
            proto.reported_range =
                Some(proto.reported_range.map_or(range, |existing| existing.union(range)));
        }
        if proto.category.is_none() {
            proto.category = category;
        }

        let Some(parent) = parent else {
            return Ok(());
        };
        let parent_index = self.proto_for(&parent);
        self.protos[index].parent = Some(parent_index);

        let child_id = self.protos[index].id.clone();
        let parent_proto = &mut self.protos[parent_index];
        if !parent_proto.child_index.contains_key(&child_id) {
            parent_proto.child_index.insert(child_id, index);
            parent_proto.children.push(index);
        }
        Ok(())
    }

    // ========================================================================
    // MATERIALIZE PASS
    // ========================================================================

    /// Copies the collected graph into a `PivotTree`.
    ///
    /// Nodes without a parent hang off the tree root in order of first
    /// sighting. Fails with `CyclicLineage` when some node cannot be reached
    /// from any of them.
    pub fn finish(self) -> Result<PivotTree, PivotError> {
        let GraphPivotBuilder {
            mut protos, stats, ..
        } = self;

        let mut tree = PivotTree::new();
        *tree.stats_mut() = stats;

        let mut reached = vec![false; protos.len()];
        let mut stack: Vec<(usize, NodeId)> = protos
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, proto)| proto.parent.is_none())
            .map(|(index, _)| (index, tree.root()))
            .collect();

        while let Some((index, parent)) = stack.pop() {
            reached[index] = true;
            let proto = &mut protos[index];

            let node = tree.add_or_get_child(parent, proto.name.as_str(), proto.value.as_str());
            for row in std::mem::take(&mut proto.rows) {
                tree.add_row(node, row.row_id, row.timestamp);
            }
            for (key, value) in std::mem::take(&mut proto.properties) {
                tree.set_property(node, key, value);
            }
            if let Some(range) = proto.reported_range {
                tree.merge_reported_range(node, range);
            }
            if tree.node(node).category().is_none() {
                tree.set_category(node, proto.category.take());
            }

            stack.extend(proto.children.iter().rev().map(|&child| (child, node)));
        }

        if let Some(unreached) = reached.iter().position(|r| !r) {
            let id = protos[unreached].id.clone();
            warn!("Node '{}' is on a parent cycle", id);
            return Err(PivotError::CyclicLineage(id));
        }

        debug!(
            "Graph pivot: {} rows seen, {} added, {} without timestamp, {} ids, {} nodes",
            stats.rows_seen,
            stats.rows_added,
            stats.rows_skipped,
            protos.len(),
            tree.len()
        );

        Ok(tree)
    }
}

/// Builds a graph-shaped pivot from every row of `source`.
///
/// `entry_for` maps a row to its node declaration; rows it returns `None`
/// for are counted as seen and otherwise ignored.
pub fn build_from_graph<S, F>(
    source: &S,
    time_column: &TimeColumn,
    mut entry_for: F,
) -> Result<PivotTree, PivotError>
where
    S: RowSource + ?Sized,
    F: FnMut(SourceRow<'_, S>) -> Option<GraphEntry>,
{
    let time_index = time_column.resolve(source)?;
    let mut builder = GraphPivotBuilder::new();

    for row in source.rows() {
        let Some(entry) = entry_for(row) else {
            trace!("Row {} declares no node, skipping", row.id());
            builder.stats.rows_seen += 1;
            builder.stats.rows_skipped += 1;
            continue;
        };
        let timestamp = row.value(time_index).and_then(CellValue::as_timestamp);
        builder.push_row(row.id(), timestamp, entry)?;
    }

    builder.finish()
}
