//! # Bloom Shipper
//!
//! Locates the bloom-filter index blocks that cover a tenant's log streams for
//! a time window and fingerprint shard, downloads them, and hands each opened
//! block to a caller-supplied callback.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure business logic, no I/O
//!   - `FingerprintRange`: Inclusive shard range, `first_last` bound helper
//!   - `BlockRef` / `Meta`: Published blocks and manifest snapshots
//!   - `find_blocks` / `is_outside_range`: Tombstone, dedup and range filtering
//!   - `ShipperConfig`: Configuration with validation
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `BloomShipperApi`: Driving port (inbound API)
//!   - `MetaClient`, `BlockDownloader`, `BlockStore`, `Limits`: Driven ports
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `BloomShipper`: Implements `BloomShipperApi`
//!
//! - **Adapters Layer** (`adapters/`): External connections
//!   - `QueueDownloader`: Bounded-concurrency downloader over a `BlockStore`
//!   - `InMemoryMetaClient`, `InMemoryBlockStore`, `StaticLimits`
//!
//! ## Invariants
//!
//! - A block path tombstoned by any meta is never returned as active
//! - Active blocks are unique by path and sorted by `min_fingerprint` (stable)
//! - Every delivered querier is closed right after its callback returns
//! - `fetch` either runs every callback and succeeds, or returns exactly one
//!   error after zero or more callbacks already ran
//!
//! ## Usage Example
//!
//! ```ignore
//! use bloom_shipper::{
//!     BloomShipper, BloomShipperApi, InMemoryBlockStore, InMemoryMetaClient,
//!     ShipperConfig, StaticLimits, Timestamp,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let shipper = BloomShipper::new(
//!     Arc::new(InMemoryMetaClient::new()),
//!     ShipperConfig::default(),
//!     Arc::new(InMemoryBlockStore::new()),
//!     Arc::new(StaticLimits::new(4)),
//! )?;
//!
//! let ctx = CancellationToken::new();
//! let from = Timestamp::from_millis(0);
//! let through = Timestamp::from_millis(3_600_000);
//! let blocks = shipper.get_block_refs(&ctx, "tenant", from, through).await?;
//!
//! shipper
//!     .fetch(&ctx, "tenant", &blocks, |querier, min_fp, max_fp| {
//!         // query the block
//!         Ok(())
//!     })
//!     .await?;
//!
//! shipper.stop();
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use adapters::{
    InMemoryBlockStore, InMemoryMetaClient, InMemoryQuerier, QueueDownloader, StaticLimits,
};
pub use domain::{
    BlockRef, Fingerprint, FingerprintRange, Meta, MetaRef, MetaSearchParams, ShipperConfig,
    ShipperConfigBuilder, Timestamp,
};
pub use error::{DownloadError, ShipperError, StoreError};
pub use metrics::{MetricsRecorder, MetricsSnapshot, NoOpMetrics, ShipperMetrics};
pub use ports::{
    BlockDownloader, BlockQuerier, BlockStore, BlockWithQuerier, BloomShipperApi,
    DownloadStreams, Limits, MetaClient,
};
pub use service::BloomShipper;
