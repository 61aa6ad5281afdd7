//! FILENAME: pivot-engine/src/definition.rs
//! Pivot Definition - The serializable configuration.
//!
//! This module contains the types needed to DESCRIBE a pivoting request.
//! These structures are designed to be:
//! - Serializable (saved alongside a chart, sent over a bridge)
//! - Resolved against a concrete `RowSource` only at build time
//! - Immutable snapshots of caller intent

use serde::{Deserialize, Serialize};
use timebin::BinningPolicy;

use crate::error::PivotError;
use crate::source::{ColumnIndex, ColumnType, RowSource};

// ============================================================================
// COLUMN SELECTORS
// ============================================================================

/// Identifies a source column by name or by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnSelector {
    Name(String),
    Index(ColumnIndex),
}

impl ColumnSelector {
    pub fn name(name: impl Into<String>) -> Self {
        ColumnSelector::Name(name.into())
    }

    /// Resolves the selector against a source.
    pub fn resolve<S: RowSource + ?Sized>(&self, source: &S) -> Result<ColumnIndex, PivotError> {
        match self {
            ColumnSelector::Name(name) => source
                .column_index(name)
                .ok_or_else(|| PivotError::UnknownColumn(name.clone())),
            ColumnSelector::Index(index) => {
                let count = source.columns().len();
                if *index < count {
                    Ok(*index)
                } else {
                    Err(PivotError::ColumnOutOfRange {
                        index: *index,
                        count,
                    })
                }
            }
        }
    }
}

impl From<&str> for ColumnSelector {
    fn from(name: &str) -> Self {
        ColumnSelector::Name(name.to_string())
    }
}

impl From<ColumnIndex> for ColumnSelector {
    fn from(index: ColumnIndex) -> Self {
        ColumnSelector::Index(index)
    }
}

/// Which column carries the row timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeColumn {
    /// An explicitly selected column, whatever its declared type.
    Column(ColumnSelector),
    /// The first column declared as `ColumnType::DateTime`.
    FirstTimeTyped,
}

impl TimeColumn {
    pub fn named(name: impl Into<String>) -> Self {
        TimeColumn::Column(ColumnSelector::Name(name.into()))
    }

    pub fn resolve<S: RowSource + ?Sized>(&self, source: &S) -> Result<ColumnIndex, PivotError> {
        match self {
            TimeColumn::Column(selector) => selector.resolve(source),
            TimeColumn::FirstTimeTyped => source
                .columns()
                .iter()
                .position(|c| c.column_type == ColumnType::DateTime)
                .ok_or(PivotError::NoTimeColumn),
        }
    }
}

impl Default for TimeColumn {
    fn default() -> Self {
        TimeColumn::FirstTimeTyped
    }
}

// ============================================================================
// PIVOT DEFINITION
// ============================================================================

/// Complete description of a fixed-column pivot plus how to bin it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotDefinition {
    /// Column holding each row's timestamp.
    #[serde(default)]
    pub time_column: TimeColumn,

    /// Dimension columns, outermost level first.
    pub dimensions: Vec<ColumnSelector>,

    /// Whether each node's heatmap includes all of its descendants.
    #[serde(default)]
    pub propagate_heatmap_to_parent: bool,

    /// Whether the root's own rows count toward the time extent.
    #[serde(default)]
    pub include_root_in_extent: bool,

    /// Bin sizing policy.
    #[serde(default)]
    pub binning: BinningPolicy,
}

impl PivotDefinition {
    pub fn new(time_column: TimeColumn) -> Self {
        PivotDefinition {
            time_column,
            dimensions: Vec::new(),
            propagate_heatmap_to_parent: false,
            include_root_in_extent: false,
            binning: BinningPolicy::default(),
        }
    }

    /// Appends a dimension level.
    pub fn with_dimension(mut self, dimension: impl Into<ColumnSelector>) -> Self {
        self.dimensions.push(dimension.into());
        self
    }

    pub fn with_propagation(mut self, propagate: bool) -> Self {
        self.propagate_heatmap_to_parent = propagate;
        self
    }

    pub fn with_binning(mut self, binning: BinningPolicy) -> Self {
        self.binning = binning;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryTable;

    fn table() -> MemoryTable {
        MemoryTable::with_columns([
            ("Region", ColumnType::Text),
            ("Created", ColumnType::DateTime),
            ("Updated", ColumnType::DateTime),
        ])
    }

    #[test]
    fn test_resolve_by_name_and_index() {
        let table = table();
        assert_eq!(ColumnSelector::name("Region").resolve(&table), Ok(0));
        assert_eq!(ColumnSelector::Index(2).resolve(&table), Ok(2));
        assert_eq!(
            ColumnSelector::name("Nope").resolve(&table),
            Err(PivotError::UnknownColumn("Nope".to_string()))
        );
        assert_eq!(
            ColumnSelector::Index(3).resolve(&table),
            Err(PivotError::ColumnOutOfRange { index: 3, count: 3 })
        );
    }

    #[test]
    fn test_first_time_typed_column() {
        let table = table();
        assert_eq!(TimeColumn::FirstTimeTyped.resolve(&table), Ok(1));
        assert_eq!(TimeColumn::named("Updated").resolve(&table), Ok(2));

        let untimed = MemoryTable::with_columns([("Region", ColumnType::Text)]);
        assert_eq!(
            TimeColumn::FirstTimeTyped.resolve(&untimed),
            Err(PivotError::NoTimeColumn)
        );
    }

    #[test]
    fn test_definition_defaults_from_json() {
        let json = r#"{ "dimensions": [ { "Name": "Region" } ] }"#;
        let definition: PivotDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(definition.time_column, TimeColumn::FirstTimeTyped);
        assert_eq!(definition.dimensions, vec![ColumnSelector::name("Region")]);
        assert!(!definition.propagate_heatmap_to_parent);
        assert_eq!(definition.binning, BinningPolicy::default());
    }

    #[test]
    fn test_definition_builder() {
        let definition = PivotDefinition::new(TimeColumn::named("Created"))
            .with_dimension("Region")
            .with_dimension(0usize)
            .with_propagation(true);
        assert_eq!(definition.dimensions.len(), 2);
        assert_eq!(definition.dimensions[1], ColumnSelector::Index(0));
        assert!(definition.propagate_heatmap_to_parent);
    }
}
