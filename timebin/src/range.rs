//! FILENAME: timebin/src/range.rs
//! PURPOSE: The immutable half-open interval split into equal-width bins.
//! CONTEXT: A `BinnedRange` is what every heatmap is indexed by. It is only
//! ever built through `BinnedRange::new` (validated) or
//! `BinnedRange::spanning` (the infallible single-bin fallback), so the
//! invariants below hold for every value in circulation:
//! - `bin_size > 0`
//! - `0 < num_bins < i32::MAX`
//! - `start + bin_size * num_bins` is a representable instant

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::BinError;
use crate::time::{total_nanos, ONE_MILLISECOND};

/// Exclusive upper bound for the number of bins in a range.
pub const MAX_BIN_COUNT: usize = i32::MAX as usize;

/// A time interval `[start, start + bin_size * num_bins)` divided into
/// `num_bins` bins of equal width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinnedRange {
    start: DateTime<Utc>,
    bin_size: TimeDelta,
    num_bins: usize,
    end: DateTime<Utc>,
}

impl BinnedRange {
    /// Validates the parameters and builds the range.
    pub fn new(
        start: DateTime<Utc>,
        bin_size: TimeDelta,
        num_bins: usize,
    ) -> Result<Self, BinError> {
        if bin_size <= TimeDelta::zero() {
            return Err(BinError::InvalidBinSize(bin_size));
        }
        if num_bins == 0 || num_bins >= MAX_BIN_COUNT {
            return Err(BinError::InvalidBinCount {
                count: num_bins,
                max: MAX_BIN_COUNT - 1,
            });
        }

        let overflow = || BinError::Overflow {
            start: start.to_rfc3339(),
        };
        let total = bin_size.checked_mul(num_bins as i32).ok_or_else(overflow)?;
        let end = start.checked_add_signed(total).ok_or_else(overflow)?;

        Ok(BinnedRange {
            start,
            bin_size,
            num_bins,
            end,
        })
    }

    /// A single bin covering both `a` and `b` (in either order).
    ///
    /// This is the fallback for degenerate input and never fails.
    pub fn spanning(a: DateTime<Utc>, b: DateTime<Utc>) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let width = hi.signed_duration_since(lo) + ONE_MILLISECOND;

        match BinnedRange::new(lo, width, 1) {
            Ok(range) => range,
            // `hi` is the last representable instant; it cannot be covered by
            // a half-open range, so the bin ends exactly there.
            Err(_) => {
                let start = lo.min(hi - ONE_MILLISECOND);
                BinnedRange {
                    start,
                    bin_size: hi.signed_duration_since(start),
                    num_bins: 1,
                    end: hi,
                }
            }
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn bin_size(&self) -> TimeDelta {
        self.bin_size
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// The exclusive end of the last bin.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp < self.end
    }

    /// Maps a timestamp to its bin: `floor((t - start) / bin_size)`.
    /// Returns `None` when `t` falls outside `[start, end)`.
    pub fn map_timestamp_to_bin(&self, timestamp: DateTime<Utc>) -> Option<usize> {
        if !self.contains(timestamp) {
            return None;
        }
        let offset = total_nanos(timestamp.signed_duration_since(self.start));
        let index = offset / total_nanos(self.bin_size);
        // `index < num_bins` follows from `timestamp < end`.
        Some((index as usize).min(self.num_bins - 1))
    }

    /// Inclusive start of bin `bin`, or `None` past the last bin.
    pub fn bin_start(&self, bin: usize) -> Option<DateTime<Utc>> {
        if bin >= self.num_bins {
            return None;
        }
        let offset = self.bin_size.checked_mul(bin as i32)?;
        self.start.checked_add_signed(offset)
    }

    /// Exclusive end of bin `bin`, or `None` past the last bin.
    pub fn bin_end(&self, bin: usize) -> Option<DateTime<Utc>> {
        if bin == self.num_bins - 1 {
            return Some(self.end);
        }
        self.bin_start(bin)?.checked_add_signed(self.bin_size)
    }

    /// Iterates `(index, start, end)` for every bin.
    pub fn bins(&self) -> impl Iterator<Item = (usize, DateTime<Utc>, DateTime<Utc>)> + '_ {
        (0..self.num_bins).filter_map(move |bin| {
            Some((bin, self.bin_start(bin)?, self.bin_end(bin)?))
        })
    }

    /// Counts of `timestamps` per bin; out-of-range instants are ignored.
    pub fn histogram<I>(&self, timestamps: I) -> Vec<u32>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        let mut counts = vec![0u32; self.num_bins];
        for timestamp in timestamps {
            if let Some(bin) = self.map_timestamp_to_bin(timestamp) {
                counts[bin] += 1;
            }
        }
        counts
    }

    /// Collects the ids whose timestamp maps to `bin`, in input order.
    /// Empty for a bin index past the end.
    pub fn row_ids_in_bin<I, R>(&self, bin: usize, entries: I) -> Vec<R>
    where
        I: IntoIterator<Item = (DateTime<Utc>, R)>,
    {
        if bin >= self.num_bins {
            return Vec::new();
        }
        entries
            .into_iter()
            .filter(|(timestamp, _)| self.map_timestamp_to_bin(*timestamp) == Some(bin))
            .map(|(_, id)| id)
            .collect()
    }
}
