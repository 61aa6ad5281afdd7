//! FILENAME: timebin/src/error.rs

use chrono::TimeDelta;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BinError {
    #[error("Bin size must be positive, got {0}")]
    InvalidBinSize(TimeDelta),

    #[error("Bin count must be between 1 and {max}, got {count}")]
    InvalidBinCount { count: usize, max: usize },

    #[error("Binned range starting at {start} overflows the representable time domain")]
    Overflow { start: String },
}
