//! FILENAME: pivot-engine/src/error.rs

use thiserror::Error;
use timebin::BinError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PivotError {
    #[error("At least one dimension column is required")]
    NoDimensions,

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Column index {index} is out of range (source has {count} columns)")]
    ColumnOutOfRange { index: usize, count: usize },

    #[error("No time-typed column found in the source")]
    NoTimeColumn,

    #[error("Node '{node}' declares parent '{proposed}' but already has parent '{existing}'")]
    ParentConflict {
        node: String,
        existing: String,
        proposed: String,
    },

    #[error("Child '{child}' of node '{parent}' resolved to a different node than before")]
    ChildCollision { parent: String, child: String },

    #[error("Node '{0}' is part of a parent cycle and is not reachable from any root")]
    CyclicLineage(String),

    #[error("Binning error: {0}")]
    Bin(#[from] BinError),
}
