//! FILENAME: timebin/src/lib.rs
//! PURPOSE: Equal-width time binning shared by the pivot engine.
//! CONTEXT: This crate owns everything about time that the pivot tree needs
//! and nothing about trees:
//! - `time`: parsing/normalizing timestamps, inclusive `TimeRange`
//! - `range`: `BinnedRange`, the validated half-open binned interval
//! - `auto`: automatic bin sizing (catalog and target-size algorithms)

pub mod auto;
pub mod error;
pub mod range;
pub mod time;

pub use auto::{
    catalog_binned_range, pick_nice_width, target_size_binned_range, AutoBinner,
    BinnedRangeFactory, BinningPolicy, MAX_BINS_LIMIT, NICE_BIN_SIZES_MS,
};
pub use error::BinError;
pub use range::{BinnedRange, MAX_BIN_COUNT};
pub use time::{parse_timestamp, TimeRange, ONE_MILLISECOND};
