//! Adapters Layer (Driven Adapters)
//!
//! Implementations of the driven ports.
//!
//! ## Adapters
//!
//! - `QueueDownloader` - Bounded-concurrency downloader over a `BlockStore`
//! - `InMemoryMetaClient` - Manifest store held in process
//! - `InMemoryBlockStore` - Block store held in process
//! - `StaticLimits` - Fixed per-tenant download parallelism

pub mod downloader;
pub mod limits;
pub mod memory;

pub use downloader::QueueDownloader;
pub use limits::StaticLimits;
pub use memory::{InMemoryBlockStore, InMemoryMetaClient, InMemoryQuerier};
