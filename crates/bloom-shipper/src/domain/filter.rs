//! Active block resolution
//!
//! Computes the deduplicated, non-tombstoned, in-range set of blocks from a
//! set of meta manifests and a query window.
//!
//! RULES:
//! - Inputs are never mutated
//! - Fingerprint ranges must be ascending and non-overlapping

use std::collections::HashSet;

use super::block::{BlockRef, Meta, Timestamp};
use super::fingerprint::{overall_bounds, FingerprintRange};

/// Tests whether a block lies outside the search boundaries.
///
/// A block is outside when any of the following holds:
/// 1. its time range misses `[start, end]`
/// 2. its fingerprint range misses the overall bound of `ranges`
/// 3. its fingerprint range sits entirely inside an uncovered gap between two
///    consecutive ranges
///
/// A block that straddles a shard boundary is kept, since part of it is still
/// relevant to the adjacent shard.
pub fn is_outside_range(
    block: &BlockRef,
    start: Timestamp,
    end: Timestamp,
    ranges: &[FingerprintRange],
) -> bool {
    if block.end_timestamp < start || block.start_timestamp > end {
        return true;
    }

    let (min_fp, max_fp) = overall_bounds(ranges);
    if block.max_fingerprint < min_fp || block.min_fingerprint > max_fp {
        return true;
    }

    // Linear in the number of shards; ranges per query are few.
    let mut previous = FingerprintRange::new(0, 0);
    for range in ranges {
        if block.min_fingerprint > previous.max_fp() && block.max_fingerprint < range.min_fp() {
            return true;
        }
        previous = *range;
    }

    false
}

/// Collects the active blocks referenced by `metas` that intersect the query.
///
/// Tombstones from every meta are applied to the blocks of every other meta.
/// Blocks listed by several metas are returned once, in discovery order.
pub fn find_blocks(
    metas: &[Meta],
    start: Timestamp,
    end: Timestamp,
    ranges: &[FingerprintRange],
) -> Vec<BlockRef> {
    let tombstoned: HashSet<&str> = metas
        .iter()
        .flat_map(|meta| meta.tombstones.iter())
        .map(|tombstone| tombstone.block_path.as_str())
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut blocks = Vec::new();
    for block in metas.iter().flat_map(|meta| meta.blocks.iter()) {
        if tombstoned.contains(block.block_path.as_str()) {
            continue;
        }
        if is_outside_range(block, start, end, ranges) {
            continue;
        }
        if seen.insert(block.block_path.as_str()) {
            blocks.push(block.clone());
        }
    }
    blocks
}

/// Stable ascending sort on `min_fingerprint`; ties keep their order.
pub fn sort_by_min_fingerprint(blocks: &mut [BlockRef]) {
    blocks.sort_by_key(|block| block.min_fingerprint);
}

/// [`find_blocks`] followed by [`sort_by_min_fingerprint`]
pub fn resolve_active_blocks(
    metas: &[Meta],
    start: Timestamp,
    end: Timestamp,
    ranges: &[FingerprintRange],
) -> Vec<BlockRef> {
    let mut blocks = find_blocks(metas, start, end, ranges);
    sort_by_min_fingerprint(&mut blocks);
    blocks
}
