//! FILENAME: timebin/src/auto.rs
//! PURPOSE: Automatic bin sizing for an arbitrary time span.
//! CONTEXT: Given how many points fall in `[min, max]`, pick a start offset, a
//! bin width and a bin count. Two algorithms are offered:
//! - catalog: snap the width to a "round" duration (1s, 5m, 1h, ...)
//! - target size: honour a caller-chosen width as closely as possible
//!
//! Neither algorithm fails. Garbage input degrades to a single bin spanning
//! the whole range.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::range::BinnedRange;
use crate::time::{ceil_div, floor_millis};

/// Hard cap on the number of bins any policy may request.
pub const MAX_BINS_LIMIT: usize = 1000;

/// Catalog of round bin widths in milliseconds, ascending.
pub const NICE_BIN_SIZES_MS: [i64; 21] = [
    1,
    10,
    100,
    1_000,
    5_000,
    10_000,
    15_000,
    20_000,
    30_000,
    60_000,
    5 * 60_000,
    10 * 60_000,
    15 * 60_000,
    20 * 60_000,
    30 * 60_000,
    3_600_000,
    3 * 3_600_000,
    6 * 3_600_000,
    12 * 3_600_000,
    24 * 3_600_000,
    7 * 24 * 3_600_000,
];

// ============================================================================
// FACTORY SEAM
// ============================================================================

/// Anything that can turn `(num_points, min, max)` into a `BinnedRange`.
///
/// Implemented for [`AutoBinner`], [`BinningPolicy`] and plain closures, so a
/// tree binner can be driven by a fixed policy or an injected factory.
pub trait BinnedRangeFactory {
    fn binned_range(&self, num_points: usize, min: DateTime<Utc>, max: DateTime<Utc>)
        -> BinnedRange;
}

impl<F> BinnedRangeFactory for F
where
    F: Fn(usize, DateTime<Utc>, DateTime<Utc>) -> BinnedRange,
{
    fn binned_range(
        &self,
        num_points: usize,
        min: DateTime<Utc>,
        max: DateTime<Utc>,
    ) -> BinnedRange {
        self(num_points, min, max)
    }
}

// ============================================================================
// CATALOG ALGORITHM
// ============================================================================

/// The catalog algorithm bound to a `(max_bins, min_bin_size)` policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoBinner {
    pub max_bins: usize,
    pub min_bin_size: TimeDelta,
}

impl AutoBinner {
    pub fn new(max_bins: usize, min_bin_size: TimeDelta) -> Self {
        AutoBinner {
            max_bins,
            min_bin_size,
        }
    }
}

impl Default for AutoBinner {
    fn default() -> Self {
        AutoBinner::new(100, TimeDelta::seconds(1))
    }
}

impl BinnedRangeFactory for AutoBinner {
    fn binned_range(
        &self,
        num_points: usize,
        min: DateTime<Utc>,
        max: DateTime<Utc>,
    ) -> BinnedRange {
        catalog_binned_range(num_points, min, max, self.max_bins, self.min_bin_size)
    }
}

/// Picks the smallest catalog width that keeps the bin count at or below
/// `max_bins` while no bin is narrower than `min_bin_size`.
///
/// The start is `min` floored to a multiple of the width and the bin count is
/// `1 + ceil((max - start) / width)`.
pub fn catalog_binned_range(
    num_points: usize,
    min: DateTime<Utc>,
    max: DateTime<Utc>,
    max_bins: usize,
    min_bin_size: TimeDelta,
) -> BinnedRange {
    if num_points <= 1 || max <= min {
        return BinnedRange::spanning(min, max);
    }

    let max_bins = max_bins.clamp(1, MAX_BINS_LIMIT) as i64;
    let min_bin_ms = min_bin_size.num_milliseconds().max(1);

    let min_ms = min.timestamp_millis();
    let max_ms = max.timestamp_millis();
    let span_ms = max_ms - min_ms;
    if span_ms <= 0 {
        return BinnedRange::spanning(min, max);
    }

    let bin_count = (span_ms / min_bin_ms).clamp(1, max_bins);
    let candidate_ms = ceil_div(span_ms, bin_count);
    let width_ms = pick_nice_width(candidate_ms);

    let Some(start_ms) = floor_millis(min_ms, width_ms) else {
        return BinnedRange::spanning(min, max);
    };
    let num_bins = 1 + ceil_div(max_ms - start_ms, width_ms);

    log::debug!(
        "catalog binning: {} points over {} ms -> candidate {} ms, width {} ms, {} bins",
        num_points,
        span_ms,
        candidate_ms,
        width_ms,
        num_bins
    );

    build_or_span(start_ms, width_ms, num_bins, min, max)
}

/// Smallest catalog entry `>= candidate_ms`, or the largest entry when the
/// candidate exceeds the whole catalog.
pub fn pick_nice_width(candidate_ms: i64) -> i64 {
    NICE_BIN_SIZES_MS
        .iter()
        .copied()
        .find(|&width| width >= candidate_ms)
        .unwrap_or(NICE_BIN_SIZES_MS[NICE_BIN_SIZES_MS.len() - 1])
}

// ============================================================================
// TARGET-SIZE ALGORITHM
// ============================================================================

/// Builds a range whose bins are about `target_bin_size` wide.
///
/// The start is `min` floored to a multiple of the target, the bin count is
/// `clamp(span / target, 1, max_bins)` and the width is the larger of the
/// target and `ceil(span / num_bins)`. The span is measured from the floored
/// start; one more bin (or a slightly wider one, once `max_bins` is reached)
/// is added when `max` would otherwise sit on the exclusive end.
pub fn target_size_binned_range(
    num_points: usize,
    min: DateTime<Utc>,
    max: DateTime<Utc>,
    max_bins: usize,
    target_bin_size: TimeDelta,
) -> BinnedRange {
    let target_ms = target_bin_size.num_milliseconds();
    if num_points == 0 || max_bins == 0 || target_ms <= 0 || max <= min {
        return BinnedRange::spanning(min, max);
    }

    let max_bins = max_bins.min(MAX_BINS_LIMIT) as i64;
    let Some((start_ms, span_ms)) = floor_millis(min.timestamp_millis(), target_ms)
        .and_then(|start_ms| Some((start_ms, max.timestamp_millis().checked_sub(start_ms)?)))
    else {
        log::debug!("target-size binning: target {} ms overflows, using one bin", target_ms);
        return BinnedRange::spanning(min, max);
    };

    let mut num_bins = (span_ms / target_ms).clamp(1, max_bins);
    let mut width_ms = target_ms.max(ceil_div(span_ms, num_bins));

    // The range is half-open; make sure `max` itself lands in the last bin.
    if width_ms.checked_mul(num_bins).map_or(false, |covered| covered <= span_ms) {
        if num_bins < max_bins {
            num_bins += 1;
        } else {
            width_ms = ceil_div(span_ms + 1, num_bins);
        }
    }

    log::debug!(
        "target-size binning: target {} ms -> width {} ms, {} bins",
        target_ms,
        width_ms,
        num_bins
    );

    build_or_span(start_ms, width_ms, num_bins, min, max)
}

fn build_or_span(
    start_ms: i64,
    width_ms: i64,
    num_bins: i64,
    min: DateTime<Utc>,
    max: DateTime<Utc>,
) -> BinnedRange {
    let built = DateTime::from_timestamp_millis(start_ms)
        .zip(TimeDelta::try_milliseconds(width_ms))
        .and_then(|(start, width)| BinnedRange::new(start, width, num_bins as usize).ok());

    match built {
        Some(range) => range,
        None => {
            log::debug!("binned range out of domain, falling back to a single bin");
            BinnedRange::spanning(min, max)
        }
    }
}

// ============================================================================
// SERIALIZABLE POLICY
// ============================================================================

/// Serializable choice of algorithm and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinningPolicy {
    Catalog {
        max_bins: usize,
        min_bin_size_ms: i64,
    },
    TargetSize {
        max_bins: usize,
        target_bin_size_ms: i64,
    },
}

impl Default for BinningPolicy {
    fn default() -> Self {
        BinningPolicy::Catalog {
            max_bins: 100,
            min_bin_size_ms: 1_000,
        }
    }
}

impl BinnedRangeFactory for BinningPolicy {
    fn binned_range(
        &self,
        num_points: usize,
        min: DateTime<Utc>,
        max: DateTime<Utc>,
    ) -> BinnedRange {
        match *self {
            BinningPolicy::Catalog {
                max_bins,
                min_bin_size_ms,
            } => catalog_binned_range(
                num_points,
                min,
                max,
                max_bins,
                TimeDelta::try_milliseconds(min_bin_size_ms).unwrap_or(TimeDelta::zero()),
            ),
            BinningPolicy::TargetSize {
                max_bins,
                target_bin_size_ms,
            } => target_size_binned_range(
                num_points,
                min,
                max,
                max_bins,
                TimeDelta::try_milliseconds(target_bin_size_ms).unwrap_or(TimeDelta::zero()),
            ),
        }
    }
}
