//! Inbound Ports (Driving Ports)
//!
//! The API the rest of the system uses to resolve and retrieve bloom blocks.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{BlockRef, Fingerprint, Timestamp};
use crate::error::ShipperError;

use super::outbound::BlockQuerier;

/// Primary bloom shipper API (Driving Port)
#[async_trait]
pub trait BloomShipperApi: Send + Sync {
    type Querier: BlockQuerier;

    /// Resolve the active blocks of `tenant_id` overlapping `[from, through]`
    /// across the whole fingerprint keyspace.
    ///
    /// The result is sorted ascending by `min_fingerprint`.
    async fn get_block_refs(
        &self,
        ctx: &CancellationToken,
        tenant_id: &str,
        from: Timestamp,
        through: Timestamp,
    ) -> Result<Vec<BlockRef>, ShipperError>;

    /// Download `blocks` and run `callback` once per delivered block.
    ///
    /// The callback receives the opened querier and the block's fingerprint
    /// bounds. The querier is closed as soon as the callback returns.
    ///
    /// Either every callback ran and `Ok(())` is returned, or exactly one
    /// error is returned after zero or more callbacks already ran.
    async fn fetch<F>(
        &self,
        ctx: &CancellationToken,
        tenant_id: &str,
        blocks: &[BlockRef],
        callback: F,
    ) -> Result<(), ShipperError>
    where
        F: FnMut(&mut Self::Querier, Fingerprint, Fingerprint) -> anyhow::Result<()> + Send;

    /// Release the manifest client and shut the downloader down
    fn stop(&self);
}
