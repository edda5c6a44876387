//! Published blocks and meta manifests
//!
//! Value types produced by the manifest store per call and consumed within a
//! single resolution. Nothing here is cached.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::fingerprint::{Fingerprint, FingerprintRange};

/// Millisecond-precision Unix timestamp
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to one published bloom block
///
/// `block_path` is globally unique.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    pub block_path: String,
    pub min_fingerprint: Fingerprint,
    pub max_fingerprint: Fingerprint,
    pub start_timestamp: Timestamp,
    pub end_timestamp: Timestamp,
}

impl BlockRef {
    pub fn new(
        block_path: impl Into<String>,
        fingerprints: FingerprintRange,
        start_timestamp: Timestamp,
        end_timestamp: Timestamp,
    ) -> Self {
        Self {
            block_path: block_path.into(),
            min_fingerprint: fingerprints.min_fp(),
            max_fingerprint: fingerprints.max_fp(),
            start_timestamp,
            end_timestamp,
        }
    }

    pub fn fingerprint_range(&self) -> FingerprintRange {
        FingerprintRange::new(self.min_fingerprint, self.max_fingerprint)
    }
}

/// Declared bounds of a meta file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRef {
    pub tenant_id: String,
    pub min_fingerprint: Fingerprint,
    pub max_fingerprint: Fingerprint,
    pub start_timestamp: Timestamp,
    pub end_timestamp: Timestamp,
    pub file_path: String,
}

impl MetaRef {
    /// Whether this meta belongs to the searched tenant and its declared
    /// fingerprint and time bounds intersect the search window (inclusive).
    pub fn intersects(&self, params: &MetaSearchParams) -> bool {
        self.tenant_id == params.tenant_id
            && FingerprintRange::new(self.min_fingerprint, self.max_fingerprint)
                .overlaps(params.min_fingerprint, params.max_fingerprint)
            && self.start_timestamp <= params.end_timestamp
            && self.end_timestamp >= params.start_timestamp
    }
}

/// Manifest snapshot of one compaction generation
///
/// A block path listed in any meta's tombstones is excluded from the active
/// set, even if another meta lists it as active.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub meta_ref: MetaRef,
    #[serde(default)]
    pub blocks: Vec<BlockRef>,
    #[serde(default)]
    pub tombstones: Vec<BlockRef>,
}

/// Search window passed to the manifest store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaSearchParams {
    pub tenant_id: String,
    pub min_fingerprint: Fingerprint,
    pub max_fingerprint: Fingerprint,
    pub start_timestamp: Timestamp,
    pub end_timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(tenant: &str, fp: (u64, u64), ts: (i64, i64)) -> MetaSearchParams {
        MetaSearchParams {
            tenant_id: tenant.to_string(),
            min_fingerprint: fp.0,
            max_fingerprint: fp.1,
            start_timestamp: Timestamp::from_millis(ts.0),
            end_timestamp: Timestamp::from_millis(ts.1),
        }
    }

    fn meta_ref(tenant: &str, fp: (u64, u64), ts: (i64, i64)) -> MetaRef {
        MetaRef {
            tenant_id: tenant.to_string(),
            min_fingerprint: fp.0,
            max_fingerprint: fp.1,
            start_timestamp: Timestamp::from_millis(ts.0),
            end_timestamp: Timestamp::from_millis(ts.1),
            file_path: "meta".to_string(),
        }
    }

    #[test]
    fn test_meta_ref_intersects_on_touching_bounds() {
        let r = meta_ref("tenant", (10, 20), (100, 200));
        assert!(r.intersects(&params("tenant", (20, 30), (200, 300))));
        assert!(r.intersects(&params("tenant", (0, 10), (0, 100))));
    }

    #[test]
    fn test_meta_ref_rejects_other_tenant() {
        let r = meta_ref("tenant-a", (0, 100), (0, 100));
        assert!(!r.intersects(&params("tenant-b", (0, 100), (0, 100))));
    }

    #[test]
    fn test_meta_ref_rejects_disjoint_windows() {
        let r = meta_ref("tenant", (10, 20), (100, 200));
        assert!(!r.intersects(&params("tenant", (21, 30), (100, 200))));
        assert!(!r.intersects(&params("tenant", (10, 20), (201, 300))));
    }

    #[test]
    fn test_meta_deserializes_with_missing_sections() {
        let json = r#"{
            "blocks": [{
                "block_path": "bloom/blocks/a",
                "min_fingerprint": 1,
                "max_fingerprint": 9,
                "start_timestamp": 1000,
                "end_timestamp": 2000
            }]
        }"#;
        let meta: Meta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.blocks.len(), 1);
        assert!(meta.tombstones.is_empty());
        assert_eq!(meta.blocks[0].start_timestamp, Timestamp::from_millis(1000));
        assert_eq!(meta.blocks[0].fingerprint_range(), FingerprintRange::new(1, 9));
    }
}
