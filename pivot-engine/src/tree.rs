//! FILENAME: pivot-engine/src/tree.rs
//! PURPOSE: The pivot tree: an arena of nodes grouped by dimension values.
//! CONTEXT: Nodes live in one `Vec` owned by `PivotTree` and refer to each
//! other by `NodeId`. A node owns its children in the sense that it is the only
//! place their ids are listed; the parent link is a plain id set once at
//! creation and only used for lookups.
//!
//! Invariants:
//! - the root is `NodeId::ROOT` and is the only node without a key
//! - every other node has exactly one parent, fixed at creation
//! - siblings never share a `NodeKey` (add-or-get is idempotent)
//! - children are kept in insertion order of first appearance

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use timebin::{BinnedRange, TimeRange};

use crate::source::RowId;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Handle to a node inside one `PivotTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// The `(dimension name, dimension value)` pair identifying a node among
/// its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub name: String,
    pub value: String,
}

impl NodeKey {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        NodeKey {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One row assigned to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowEntry {
    pub row_id: RowId,
    pub timestamp: DateTime<Utc>,
}

/// Counters collected while building a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    /// Rows read from the source.
    pub rows_seen: usize,
    /// Rows attached to a node.
    pub rows_added: usize,
    /// Rows dropped because they had no usable timestamp.
    pub rows_skipped: usize,
}

// ============================================================================
// TREE NODE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct TreeNode {
    key: Option<NodeKey>,
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
    child_index: FxHashMap<NodeKey, NodeId>,

    rows: Vec<RowEntry>,
    min_timestamp: Option<DateTime<Utc>>,
    max_timestamp: Option<DateTime<Utc>>,

    properties: BTreeMap<String, String>,
    reported_range: Option<TimeRange>,
    category: Option<String>,

    // Filled in by heatmap recomputation.
    pub(crate) min_timestamp_children: Option<DateTime<Utc>>,
    pub(crate) max_timestamp_children: Option<DateTime<Utc>>,
    pub(crate) heatmap: Vec<u32>,
}

impl TreeNode {
    fn with_key(key: NodeKey, parent: NodeId) -> Self {
        TreeNode {
            key: Some(key),
            parent: Some(parent),
            ..TreeNode::default()
        }
    }

    pub fn is_root(&self) -> bool {
        self.key.is_none()
    }

    pub fn key(&self) -> Option<&NodeKey> {
        self.key.as_ref()
    }

    /// Dimension name; `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.key.as_ref().map(|k| k.name.as_str())
    }

    /// Raw dimension value; `None` for the root.
    pub fn value(&self) -> Option<&str> {
        self.key.as_ref().map(|k| k.value.as_str())
    }

    /// The value as shown to users: `"[k1=v1/k2=v2]: value"` when the node
    /// carries properties, the raw value otherwise.
    pub fn display_value(&self) -> String {
        let value = self.value().unwrap_or_default();
        if self.properties.is_empty() {
            return value.to_string();
        }
        let bag = self
            .properties
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("/");
        format!("[{}]: {}", bag, value)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Looks up a direct child by its key.
    pub fn child(&self, key: &NodeKey) -> Option<NodeId> {
        self.child_index.get(key).copied()
    }

    pub fn rows(&self) -> &[RowEntry] {
        &self.rows
    }

    pub fn row_ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.rows.iter().map(|r| r.row_id)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn min_timestamp(&self) -> Option<DateTime<Utc>> {
        self.min_timestamp
    }

    pub fn max_timestamp(&self) -> Option<DateTime<Utc>> {
        self.max_timestamp
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn reported_range(&self) -> Option<TimeRange> {
        self.reported_range
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Range spanned by this node's own rows.
    pub fn row_range(&self) -> Option<TimeRange> {
        Some(TimeRange::new(self.min_timestamp?, self.max_timestamp?))
    }

    /// The reported range when one was supplied, otherwise the row range.
    pub fn time_range(&self) -> Option<TimeRange> {
        self.reported_range.or_else(|| self.row_range())
    }

    /// Earliest row timestamp in this node's subtree. Only populated while
    /// heatmap propagation is active.
    pub fn min_timestamp_children(&self) -> Option<DateTime<Utc>> {
        self.min_timestamp_children
    }

    /// Latest row timestamp in this node's subtree. Only populated while
    /// heatmap propagation is active.
    pub fn max_timestamp_children(&self) -> Option<DateTime<Utc>> {
        self.max_timestamp_children
    }

    /// Per-bin counts; empty while no binned range is set.
    pub fn heatmap(&self) -> &[u32] {
        &self.heatmap
    }

    fn push_row(&mut self, row_id: RowId, timestamp: DateTime<Utc>) {
        self.rows.push(RowEntry { row_id, timestamp });
        self.min_timestamp = Some(self.min_timestamp.map_or(timestamp, |m| m.min(timestamp)));
        self.max_timestamp = Some(self.max_timestamp.map_or(timestamp, |m| m.max(timestamp)));
    }
}

// ============================================================================
// PIVOT TREE
// ============================================================================

/// A rooted tree of pivot nodes plus the binning state applied to it.
#[derive(Debug, Clone)]
pub struct PivotTree {
    nodes: Vec<TreeNode>,
    pub(crate) binned_range: Option<BinnedRange>,
    pub(crate) propagate_heatmap_to_parent: bool,
    stats: BuildStats,
}

impl Default for PivotTree {
    fn default() -> Self {
        PivotTree::new()
    }
}

impl PivotTree {
    /// Creates a tree holding only the root.
    pub fn new() -> Self {
        PivotTree {
            nodes: vec![TreeNode::default()],
            binned_range: None,
            propagate_heatmap_to_parent: false,
            stats: BuildStats::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Borrows a node.
    ///
    /// # Panics
    /// Panics if `id` did not come from this tree.
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    /// Every node id in creation order, root first.
    pub(crate) fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when the tree holds nothing but the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut BuildStats {
        &mut self.stats
    }

    /// Returns the child of `parent` keyed by `(name, value)`, creating it
    /// if it does not exist yet. Repeated calls return the same node.
    ///
    /// # Panics
    /// Panics if `parent` did not come from this tree.
    pub fn add_or_get_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> NodeId {
        let key = NodeKey::new(name, value);
        if let Some(existing) = self.nodes[parent.0].child_index.get(&key) {
            return *existing;
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode::with_key(key.clone(), parent));
        let parent_node = &mut self.nodes[parent.0];
        parent_node.children.push(id);
        parent_node.child_index.insert(key, id);
        id
    }

    /// Appends a row to a node and updates its min/max timestamps.
    pub fn add_row(&mut self, node: NodeId, row_id: RowId, timestamp: DateTime<Utc>) {
        self.nodes[node.0].push_row(row_id, timestamp);
    }

    /// Inserts or overwrites one display property.
    pub fn set_property(&mut self, node: NodeId, key: impl Into<String>, value: impl Into<String>) {
        self.nodes[node.0].properties.insert(key.into(), value.into());
    }

    pub fn set_reported_range(&mut self, node: NodeId, range: Option<TimeRange>) {
        self.nodes[node.0].reported_range = range;
    }

    pub fn set_category(&mut self, node: NodeId, category: Option<String>) {
        self.nodes[node.0].category = category;
    }

    /// Widens the reported range of `node` to cover `range`.
    pub(crate) fn merge_reported_range(&mut self, node: NodeId, range: TimeRange) {
        let slot = &mut self.nodes[node.0].reported_range;
        *slot = Some(slot.map_or(range, |existing| existing.union(range)));
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Distance from the root (root = 0).
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = node;
        while let Some(parent) = self.nodes[current.0].parent {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Keys from the root's child down to `node`.
    pub fn path(&self, node: NodeId) -> Vec<&NodeKey> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(key) = self.nodes[current.0].key.as_ref() {
            path.push(key);
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        path.reverse();
        path
    }

    /// Follows `(name, value)` pairs down from the root.
    pub fn find<N, V>(&self, path: &[(N, V)]) -> Option<NodeId>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let mut current = NodeId::ROOT;
        for (name, value) in path {
            let key = NodeKey::new(name.as_ref(), value.as_ref());
            current = self.nodes[current.0].child(&key)?;
        }
        Some(current)
    }

    /// Rows attached anywhere in the tree.
    pub fn total_rows(&self) -> usize {
        self.nodes.iter().map(TreeNode::row_count).sum()
    }

    // ------------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------------

    /// Pre-order walk: each node before its children, children in insertion
    /// order. Iterative, so deep lineages cannot overflow the stack.
    pub fn visit<F>(&self, include_root: bool, mut visitor: F)
    where
        F: FnMut(NodeId, &TreeNode),
    {
        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if include_root || id != NodeId::ROOT {
                visitor(id, node);
            }
            stack.extend(node.children.iter().rev().copied());
        }
    }

    /// Post-order walk: children (in insertion order) before their parent.
    pub fn visit_postfix<F>(&self, include_root: bool, mut visitor: F)
    where
        F: FnMut(NodeId, &TreeNode),
    {
        for id in self.postfix_order(include_root) {
            visitor(id, &self.nodes[id.0]);
        }
    }

    /// Node ids in post-order.
    pub(crate) fn postfix_order(&self, include_root: bool) -> Vec<NodeId> {
        let mut pending = vec![NodeId::ROOT];
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = pending.pop() {
            order.push(id);
            pending.extend(self.nodes[id.0].children.iter().copied());
        }
        order.reverse();
        if !include_root {
            order.pop();
        }
        order
    }

    /// Ids of `node` and all of its descendants, pre-order.
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut stack = vec![node];
        let mut ids = Vec::new();
        while let Some(id) = stack.pop() {
            ids.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        ids
    }
}
