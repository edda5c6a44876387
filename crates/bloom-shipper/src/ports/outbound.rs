//! Outbound Ports (Driven Ports)
//!
//! Dependencies the shipper needs from external components: the manifest
//! store, the block downloader, the block store it downloads from, and the
//! per-tenant limits provider.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::{BlockRef, Meta, MetaSearchParams};
use crate::error::{DownloadError, StoreError};

/// Manifest store client (Driven Port)
#[async_trait]
pub trait MetaClient: Send + Sync {
    /// All metas whose declared bounds intersect the search window
    async fn get_metas(&self, params: MetaSearchParams) -> Result<Vec<Meta>, StoreError>;

    /// Release the client's resources
    fn stop(&self);
}

/// An opened, queryable block
///
/// The probabilistic query engine lives behind this handle; the shipper only
/// needs to release it.
pub trait BlockQuerier: Send + 'static {
    fn close(&mut self) -> Result<(), DownloadError>;
}

/// A fetched block paired with its opened querier
///
/// Owned by the fetch loop for one callback invocation, then closed.
#[derive(Debug)]
pub struct BlockWithQuerier<Q> {
    pub block: BlockRef,
    pub querier: Q,
}

impl<Q> BlockWithQuerier<Q> {
    pub fn new(block: BlockRef, querier: Q) -> Self {
        Self { block, querier }
    }
}

/// Delivery channels handed out by [`BlockDownloader::fetch`]
///
/// Results arrive in completion order, not request order.
pub struct DownloadStreams<Q> {
    pub results: mpsc::Receiver<BlockWithQuerier<Q>>,
    pub errors: mpsc::Receiver<DownloadError>,
}

/// Block downloader (Driven Port)
///
/// Implementations must honor cancellation of the passed token and must not
/// deadlock when the caller stops consuming the streams mid-way.
pub trait BlockDownloader: Send + Sync {
    type Querier: BlockQuerier;

    /// Start downloading `blocks` for `tenant_id`
    fn fetch(
        &self,
        ctx: CancellationToken,
        tenant_id: &str,
        blocks: &[BlockRef],
    ) -> Result<DownloadStreams<Self::Querier>, DownloadError>;

    /// Shut the downloader down
    fn stop(&self);
}

/// Raw block storage (Driven Port)
///
/// Downloads a block and opens it for querying.
#[async_trait]
pub trait BlockStore: Send + Sync + 'static {
    type Querier: BlockQuerier;

    async fn open_block(&self, block: &BlockRef) -> Result<Self::Querier, DownloadError>;
}

/// Per-tenant limits provider (Driven Port)
pub trait Limits: Send + Sync + 'static {
    /// Number of blocks a tenant may download concurrently
    fn blocks_downloading_parallelism(&self, tenant_id: &str) -> usize;
}
