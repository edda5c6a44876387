//! Fingerprint ranges
//!
//! A fingerprint is the 64-bit hash of a log stream's label set. Query work is
//! sharded by splitting the fingerprint keyspace into disjoint inclusive ranges.

use serde::{Deserialize, Serialize};

/// 64-bit stream fingerprint
pub type Fingerprint = u64;

/// Inclusive fingerprint interval `[min, max]`
///
/// When passed as a slice, ranges are ascending and non-overlapping;
/// each element is one query shard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FingerprintRange {
    min: Fingerprint,
    max: Fingerprint,
}

impl FingerprintRange {
    /// The whole keyspace, used for unsharded lookups
    pub const FULL: FingerprintRange = FingerprintRange {
        min: 0,
        max: u64::MAX,
    };

    pub const fn new(min: Fingerprint, max: Fingerprint) -> Self {
        Self { min, max }
    }

    pub const fn min_fp(&self) -> Fingerprint {
        self.min
    }

    pub const fn max_fp(&self) -> Fingerprint {
        self.max
    }

    /// Whether `[min, max]` shares at least one fingerprint with this range
    pub fn overlaps(&self, min: Fingerprint, max: Fingerprint) -> bool {
        min <= self.max && max >= self.min
    }
}

impl From<(Fingerprint, Fingerprint)> for FingerprintRange {
    fn from((min, max): (Fingerprint, Fingerprint)) -> Self {
        Self::new(min, max)
    }
}

/// Returns the first and last item of an ascending slice.
///
/// Both are `T::default()` when the slice is empty.
pub fn first_last<T: Copy + Default>(items: &[T]) -> (T, T) {
    match (items.first(), items.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => (T::default(), T::default()),
    }
}

/// Overall `[min, max]` bound of an ascending shard list
pub fn overall_bounds(ranges: &[FingerprintRange]) -> (Fingerprint, Fingerprint) {
    let (first, last) = first_last(ranges);
    (first.min_fp(), last.max_fp())
}
