//! Queue-backed block downloader
//!
//! Opens blocks through a [`BlockStore`] with bounded concurrency:
//! - at most `blocks_downloading_parallelism(tenant)` blocks in flight per fetch
//! - at most `workers_count` blocks in flight across every fetch
//!
//! Result and error channels are sized to the number of requested blocks, so
//! workers never block on a consumer that has stopped reading.

use futures::StreamExt;
use std::pin::pin;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{BlockRef, DownloadingQueueConfig};
use crate::error::DownloadError;
use crate::ports::{
    BlockDownloader, BlockQuerier, BlockStore, BlockWithQuerier, DownloadStreams, Limits,
};

/// Worker-pool downloader over a [`BlockStore`]
pub struct QueueDownloader<S: BlockStore, L: Limits> {
    config: DownloadingQueueConfig,
    store: Arc<S>,
    limits: Arc<L>,
    /// Shared across tenants; closed on stop
    workers: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl<S: BlockStore, L: Limits> QueueDownloader<S, L> {
    pub fn new(
        config: DownloadingQueueConfig,
        store: Arc<S>,
        limits: Arc<L>,
    ) -> Result<Self, DownloadError> {
        if config.workers_count == 0 {
            return Err(DownloadError::InvalidConfig(
                "workers_count cannot be 0".to_string(),
            ));
        }
        if config.max_tasks_enqueued_per_tenant == 0 {
            return Err(DownloadError::InvalidConfig(
                "max_tasks_enqueued_per_tenant cannot be 0".to_string(),
            ));
        }

        Ok(Self {
            workers: Arc::new(Semaphore::new(config.workers_count)),
            config,
            store,
            limits,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl<S: BlockStore, L: Limits> BlockDownloader for QueueDownloader<S, L> {
    type Querier = S::Querier;

    fn fetch(
        &self,
        ctx: CancellationToken,
        tenant_id: &str,
        blocks: &[BlockRef],
    ) -> Result<DownloadStreams<Self::Querier>, DownloadError> {
        if self.is_stopped() {
            return Err(DownloadError::Stopped);
        }

        let max = self.config.max_tasks_enqueued_per_tenant;
        if blocks.len() > max {
            return Err(DownloadError::QueueFull {
                tenant_id: tenant_id.to_string(),
                requested: blocks.len(),
                max,
            });
        }

        let runtime = Handle::try_current().map_err(|e| DownloadError::Runtime(e.to_string()))?;

        let capacity = blocks.len().max(1);
        let (results_tx, results_rx) = mpsc::channel(capacity);
        let (errors_tx, errors_rx) = mpsc::channel(capacity);

        let task = DownloadTask {
            tenant_id: tenant_id.to_string(),
            blocks: blocks.to_vec(),
            parallelism: self.limits.blocks_downloading_parallelism(tenant_id).max(1),
            store: Arc::clone(&self.store),
            workers: Arc::clone(&self.workers),
            ctx,
            shutdown: self.shutdown.clone(),
        };
        debug!(
            tenant = tenant_id,
            blocks = task.blocks.len(),
            parallelism = task.parallelism,
            "enqueued block downloads"
        );
        runtime.spawn(task.run(results_tx, errors_tx));

        Ok(DownloadStreams {
            results: results_rx,
            errors: errors_rx,
        })
    }

    fn stop(&self) {
        debug!("stopping block downloader");
        self.shutdown.cancel();
        self.workers.close();
    }
}

/// Downloads for one `fetch` call
struct DownloadTask<S: BlockStore> {
    tenant_id: String,
    blocks: Vec<BlockRef>,
    parallelism: usize,
    store: Arc<S>,
    workers: Arc<Semaphore>,
    ctx: CancellationToken,
    shutdown: CancellationToken,
}

impl<S: BlockStore> DownloadTask<S> {
    async fn run(
        self,
        results: mpsc::Sender<BlockWithQuerier<S::Querier>>,
        errors: mpsc::Sender<DownloadError>,
    ) {
        let DownloadTask {
            tenant_id,
            blocks,
            parallelism,
            store,
            workers,
            ctx,
            shutdown,
        } = self;

        let downloads = futures::stream::iter(blocks)
            .map(|block| {
                let store = Arc::clone(&store);
                let workers = Arc::clone(&workers);
                async move {
                    let _permit = workers
                        .acquire()
                        .await
                        .map_err(|_| DownloadError::Stopped)?;
                    let querier = store.open_block(&block).await?;
                    Ok::<_, DownloadError>(BlockWithQuerier::new(block, querier))
                }
            })
            .buffer_unordered(parallelism);
        let mut downloads = pin!(downloads);

        loop {
            let next = tokio::select! {
                _ = ctx.cancelled() => {
                    debug!(tenant = %tenant_id, "download cancelled by caller");
                    break;
                }
                _ = shutdown.cancelled() => {
                    debug!(tenant = %tenant_id, "download aborted by shutdown");
                    break;
                }
                next = downloads.next() => next,
            };

            match next {
                None => break,
                Some(Ok(delivered)) => {
                    if let Err(mpsc::error::SendError(mut undelivered)) =
                        results.send(delivered).await
                    {
                        debug!(
                            tenant = %tenant_id,
                            block = %undelivered.block.block_path,
                            "consumer gone; closing undelivered block"
                        );
                        if let Err(e) = undelivered.querier.close() {
                            warn!(
                                block = %undelivered.block.block_path,
                                error = %e,
                                "failed to close block querier"
                            );
                        }
                        break;
                    }
                }
                Some(Err(error)) => {
                    debug!(tenant = %tenant_id, error = %error, "block download failed");
                    if errors.send(error).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
