//! Bloom Shipper Service
//!
//! Resolves the active blocks for a query window and drives the concurrent
//! fetch-and-deliver loop over the downloader's result and error streams.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::QueueDownloader;
use crate::domain::{
    overall_bounds, resolve_active_blocks, BlockRef, Fingerprint, FingerprintRange,
    MetaSearchParams, ShipperConfig, Timestamp,
};
use crate::error::{DownloadError, ShipperError};
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::{
    BlockDownloader, BlockStore, BlockWithQuerier, BloomShipperApi, DownloadStreams, Limits,
    MetaClient,
};

use super::callback::{release_undelivered, run_callback};

/// Bloom shipper implementation
///
/// Holds only its collaborators; every call is otherwise stateless.
pub struct BloomShipper<C: MetaClient, D: BlockDownloader> {
    /// Manifest store client (driven port)
    client: Arc<C>,
    /// Block downloader (driven port)
    downloader: D,
    metrics: Arc<dyn MetricsRecorder>,
}

/// One wake-up of the fetch loop
enum FetchEvent<Q> {
    Cancelled,
    Failed(DownloadError),
    Delivered(BlockWithQuerier<Q>),
    ErrorsClosed,
    ResultsClosed,
}

impl<C, S, L> BloomShipper<C, QueueDownloader<S, L>>
where
    C: MetaClient,
    S: BlockStore,
    L: Limits,
{
    /// Create a shipper backed by a [`QueueDownloader`] over `store`
    ///
    /// `limits` is handed to the downloader, which sizes each tenant's
    /// download parallelism from it.
    pub fn new(
        client: Arc<C>,
        config: ShipperConfig,
        store: Arc<S>,
        limits: Arc<L>,
    ) -> Result<Self, ShipperError> {
        let downloader = QueueDownloader::new(config.blocks_downloading_queue, store, limits)
            .map_err(ShipperError::DownloaderInit)?;

        info!(component = "bloom-shipper", "Bloom shipper created");
        Ok(Self::with_downloader(client, downloader))
    }
}

impl<C: MetaClient, D: BlockDownloader> BloomShipper<C, D> {
    /// Create a shipper around an existing downloader
    pub fn with_downloader(client: Arc<C>, downloader: D) -> Self {
        Self {
            client,
            downloader,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Record operations into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Resolve active blocks restricted to the given fingerprint shards.
    ///
    /// `ranges` must be ascending and non-overlapping.
    pub async fn get_block_refs_for_ranges(
        &self,
        ctx: &CancellationToken,
        tenant_id: &str,
        from: Timestamp,
        through: Timestamp,
        ranges: &[FingerprintRange],
    ) -> Result<Vec<BlockRef>, ShipperError> {
        debug!(
            tenant = tenant_id,
            %from,
            %through,
            shards = ranges.len(),
            "GetBlockRefs for shards"
        );
        self.active_block_refs(ctx, tenant_id, from, through, ranges)
            .await
    }

    async fn active_block_refs(
        &self,
        ctx: &CancellationToken,
        tenant_id: &str,
        from: Timestamp,
        through: Timestamp,
        ranges: &[FingerprintRange],
    ) -> Result<Vec<BlockRef>, ShipperError> {
        let (min_fp, max_fp) = overall_bounds(ranges);
        let params = MetaSearchParams {
            tenant_id: tenant_id.to_string(),
            min_fingerprint: min_fp,
            max_fingerprint: max_fp,
            start_timestamp: from,
            end_timestamp: through,
        };

        let metas = tokio::select! {
            _ = ctx.cancelled() => {
                debug!(tenant = tenant_id, "context is done while fetching metas");
                self.metrics.record_cancellation();
                return Err(ShipperError::Cancelled);
            }
            result = self.client.get_metas(params) => result.map_err(ShipperError::MetaFetch)?,
        };
        debug!(tenant = tenant_id, count = metas.len(), "downloaded metas");
        self.metrics.record_metas_fetched(metas.len());

        let blocks = resolve_active_blocks(&metas, from, through, ranges);
        self.metrics.record_block_refs_resolved(blocks.len());
        Ok(blocks)
    }
}

#[async_trait]
impl<C, D> BloomShipperApi for BloomShipper<C, D>
where
    C: MetaClient + 'static,
    D: BlockDownloader + 'static,
{
    type Querier = D::Querier;

    async fn get_block_refs(
        &self,
        ctx: &CancellationToken,
        tenant_id: &str,
        from: Timestamp,
        through: Timestamp,
    ) -> Result<Vec<BlockRef>, ShipperError> {
        debug!(tenant = tenant_id, %from, %through, "GetBlockRefs");
        self.active_block_refs(ctx, tenant_id, from, through, &[FingerprintRange::FULL])
            .await
    }

    async fn fetch<F>(
        &self,
        ctx: &CancellationToken,
        tenant_id: &str,
        blocks: &[BlockRef],
        mut callback: F,
    ) -> Result<(), ShipperError>
    where
        F: FnMut(&mut Self::Querier, Fingerprint, Fingerprint) -> anyhow::Result<()> + Send,
    {
        if blocks.is_empty() {
            debug!(tenant = tenant_id, "no blocks requested");
            return Ok(());
        }

        // Downloads are scoped to this call and cancelled on every return path.
        let scoped = ctx.child_token();
        let _cancel_on_exit = scoped.clone().drop_guard();

        let DownloadStreams {
            mut results,
            mut errors,
        } = self
            .downloader
            .fetch(scoped, tenant_id, blocks)
            .map_err(ShipperError::DownloadSetup)?;

        let mut remaining = blocks.len();
        let mut errors_open = true;

        let outcome = loop {
            let event = tokio::select! {
                _ = ctx.cancelled() => FetchEvent::Cancelled,
                error = errors.recv(), if errors_open => match error {
                    Some(error) => FetchEvent::Failed(error),
                    None => FetchEvent::ErrorsClosed,
                },
                result = results.recv() => match result {
                    Some(delivered) => FetchEvent::Delivered(delivered),
                    None => FetchEvent::ResultsClosed,
                },
            };

            match event {
                FetchEvent::Cancelled => {
                    debug!(
                        tenant = tenant_id,
                        remaining,
                        "context is done while downloading blocks"
                    );
                    self.metrics.record_cancellation();
                    break Err(ShipperError::Cancelled);
                }
                FetchEvent::Failed(error) => {
                    debug!(
                        tenant = tenant_id,
                        error = %error,
                        "received error while downloading block"
                    );
                    self.metrics.record_download_error();
                    break Err(ShipperError::Download(error));
                }
                FetchEvent::ErrorsClosed => {
                    errors_open = false;
                }
                FetchEvent::ResultsClosed => {
                    // A download error sent before the streams closed still wins.
                    if let Ok(error) = errors.try_recv() {
                        debug!(
                            tenant = tenant_id,
                            error = %error,
                            "received error while downloading block"
                        );
                        self.metrics.record_download_error();
                        break Err(ShipperError::Download(error));
                    }
                    warn!(
                        tenant = tenant_id,
                        remaining,
                        "result stream closed before all blocks were delivered"
                    );
                    break Err(ShipperError::StreamClosed { remaining });
                }
                FetchEvent::Delivered(delivered) => {
                    debug!(block = %delivered.block.block_path, "received downloaded block");
                    if let Err(e) = run_callback(&mut callback, delivered) {
                        self.metrics.record_callback_failure();
                        break Err(e);
                    }
                    self.metrics.record_block_delivered();

                    remaining -= 1;
                    debug!(tenant = tenant_id, remaining, "block delivered");
                    if remaining == 0 {
                        debug!(tenant = tenant_id, "all blocks delivered");
                        break Ok(());
                    }
                }
            }
        };

        if outcome.is_err() {
            release_undelivered(&mut results).await;
        }
        outcome
    }

    fn stop(&self) {
        info!(component = "bloom-shipper", "Stopping bloom shipper");
        self.client.stop();
        self.downloader.stop();
    }
}
