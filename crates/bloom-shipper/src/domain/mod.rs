//! Domain Layer - Pure business logic
//!
//! This layer contains:
//! - Fingerprint ranges and the shard bound helpers
//! - Block and meta value types
//! - Active block resolution (tombstones, dedup, range filtering)
//! - Configuration
//!
//! RULES:
//! - No I/O operations
//! - No async code
//! - Pure functions where possible

pub mod block;
pub mod config;
pub mod filter;
pub mod fingerprint;

pub use block::{BlockRef, Meta, MetaRef, MetaSearchParams, Timestamp};
pub use config::{DownloadingQueueConfig, ShipperConfig, ShipperConfigBuilder};
pub use filter::{find_blocks, is_outside_range, resolve_active_blocks, sort_by_min_fingerprint};
pub use fingerprint::{first_last, overall_bounds, Fingerprint, FingerprintRange};
