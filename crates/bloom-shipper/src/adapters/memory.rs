//! In-memory manifest store and block store
//!
//! Used by tests and by embedders that keep manifests in process.
//! Production deployments back these ports with object storage.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::{BlockRef, Fingerprint, Meta, MetaSearchParams};
use crate::error::{DownloadError, StoreError};
use crate::ports::{BlockQuerier, BlockStore, MetaClient};

/// Manifest store holding metas in memory
#[derive(Default)]
pub struct InMemoryMetaClient {
    metas: RwLock<Vec<Meta>>,
    stopped: AtomicBool,
}

impl InMemoryMetaClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_meta(&self, meta: Meta) {
        self.metas.write().push(meta);
    }

    /// Parse and store a meta from its JSON form
    pub fn put_meta_json(&self, json: &str) -> Result<(), StoreError> {
        let meta: Meta = serde_json::from_str(json)?;
        self.put_meta(meta);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.metas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MetaClient for InMemoryMetaClient {
    async fn get_metas(&self, params: MetaSearchParams) -> Result<Vec<Meta>, StoreError> {
        if self.is_stopped() {
            return Err(StoreError::Stopped);
        }

        let metas: Vec<Meta> = self
            .metas
            .read()
            .iter()
            .filter(|meta| meta.meta_ref.intersects(&params))
            .cloned()
            .collect();
        debug!(tenant = %params.tenant_id, count = metas.len(), "metas matched search");
        Ok(metas)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

/// Querier over an in-memory block's fingerprints
#[derive(Debug)]
pub struct InMemoryQuerier {
    block_path: String,
    fingerprints: Vec<Fingerprint>,
    open_handles: Arc<AtomicUsize>,
    closed: bool,
}

impl InMemoryQuerier {
    pub fn block_path(&self) -> &str {
        &self.block_path
    }

    pub fn fingerprints(&self) -> &[Fingerprint] {
        &self.fingerprints
    }

    pub fn contains(&self, fp: Fingerprint) -> bool {
        self.fingerprints.binary_search(&fp).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl BlockQuerier for InMemoryQuerier {
    fn close(&mut self) -> Result<(), DownloadError> {
        if !self.closed {
            self.closed = true;
            self.open_handles.fetch_sub(1, Ordering::AcqRel);
        }
        Ok(())
    }
}

impl Drop for InMemoryQuerier {
    fn drop(&mut self) {
        if !self.closed {
            debug!(block = %self.block_path, "closing block querier dropped while open");
            self.closed = true;
            self.open_handles.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

enum StoredBlock {
    Present(Vec<Fingerprint>),
    Broken(String),
}

/// Block store serving blocks from memory
///
/// Tracks how many opened queriers have not been closed yet.
#[derive(Default)]
pub struct InMemoryBlockStore {
    blocks: RwLock<HashMap<String, StoredBlock>>,
    open_handles: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every open by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Store a block holding the given stream fingerprints
    pub fn insert(&self, block: BlockRef, mut fingerprints: Vec<Fingerprint>) {
        fingerprints.sort_unstable();
        self.blocks
            .write()
            .insert(block.block_path, StoredBlock::Present(fingerprints));
    }

    /// Make opening `block_path` fail with `reason`
    pub fn insert_broken(&self, block_path: impl Into<String>, reason: impl Into<String>) {
        self.blocks
            .write()
            .insert(block_path.into(), StoredBlock::Broken(reason.into()));
    }

    /// Queriers opened and not yet closed
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::Acquire)
    }
}

#[async_trait]
impl BlockStore for InMemoryBlockStore {
    type Querier = InMemoryQuerier;

    async fn open_block(&self, block: &BlockRef) -> Result<InMemoryQuerier, DownloadError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let fingerprints = match self.blocks.read().get(&block.block_path) {
            Some(StoredBlock::Present(fingerprints)) => fingerprints.clone(),
            Some(StoredBlock::Broken(reason)) => {
                return Err(DownloadError::Failed {
                    block_path: block.block_path.clone(),
                    reason: reason.clone(),
                })
            }
            None => {
                return Err(DownloadError::BlockNotFound {
                    block_path: block.block_path.clone(),
                })
            }
        };

        self.open_handles.fetch_add(1, Ordering::AcqRel);
        Ok(InMemoryQuerier {
            block_path: block.block_path.clone(),
            fingerprints,
            open_handles: Arc::clone(&self.open_handles),
            closed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FingerprintRange, MetaRef, Timestamp};

    fn meta_ref(tenant: &str, fp: (u64, u64), ts: (i64, i64)) -> MetaRef {
        MetaRef {
            tenant_id: tenant.to_string(),
            min_fingerprint: fp.0,
            max_fingerprint: fp.1,
            start_timestamp: Timestamp::from_millis(ts.0),
            end_timestamp: Timestamp::from_millis(ts.1),
            file_path: format!("{tenant}/metas/{}-{}", fp.0, fp.1),
        }
    }

    fn search(tenant: &str, fp: (u64, u64), ts: (i64, i64)) -> MetaSearchParams {
        MetaSearchParams {
            tenant_id: tenant.to_string(),
            min_fingerprint: fp.0,
            max_fingerprint: fp.1,
            start_timestamp: Timestamp::from_millis(ts.0),
            end_timestamp: Timestamp::from_millis(ts.1),
        }
    }

    #[tokio::test]
    async fn test_get_metas_filters_by_declared_bounds() {
        let client = InMemoryMetaClient::new();
        client.put_meta(Meta {
            meta_ref: meta_ref("tenant", (0, 100), (0, 1000)),
            ..Default::default()
        });
        client.put_meta(Meta {
            meta_ref: meta_ref("tenant", (200, 300), (0, 1000)),
            ..Default::default()
        });
        client.put_meta(Meta {
            meta_ref: meta_ref("other", (0, 100), (0, 1000)),
            ..Default::default()
        });

        let metas = client
            .get_metas(search("tenant", (50, 150), (500, 600)))
            .await
            .unwrap();
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].meta_ref.min_fingerprint, 0);
    }

    #[tokio::test]
    async fn test_put_meta_json() {
        let client = InMemoryMetaClient::new();
        client
            .put_meta_json(
                r#"{
                    "meta_ref": {
                        "tenant_id": "tenant",
                        "min_fingerprint": 0,
                        "max_fingerprint": 10,
                        "start_timestamp": 0,
                        "end_timestamp": 10,
                        "file_path": "tenant/metas/0-10"
                    },
                    "tombstones": [{
                        "block_path": "old",
                        "min_fingerprint": 0,
                        "max_fingerprint": 10,
                        "start_timestamp": 0,
                        "end_timestamp": 10
                    }]
                }"#,
            )
            .unwrap();

        assert_eq!(client.len(), 1);
        let metas = client.get_metas(search("tenant", (0, 10), (0, 10))).await.unwrap();
        assert_eq!(metas[0].tombstones[0].block_path, "old");
    }

    #[test]
    fn test_put_meta_json_rejects_garbage() {
        let client = InMemoryMetaClient::new();
        assert!(matches!(
            client.put_meta_json("not json"),
            Err(StoreError::InvalidMeta(_))
        ));
        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn test_stopped_client_fails() {
        let client = InMemoryMetaClient::new();
        client.stop();
        assert!(matches!(
            client.get_metas(search("tenant", (0, 1), (0, 1))).await,
            Err(StoreError::Stopped)
        ));
    }

    #[tokio::test]
    async fn test_block_store_tracks_open_handles() {
        let store = InMemoryBlockStore::new();
        let block = BlockRef::new(
            "blocks/a",
            FingerprintRange::new(1, 9),
            Timestamp::from_millis(0),
            Timestamp::from_millis(10),
        );
        store.insert(block.clone(), vec![9, 1, 5]);

        let mut querier = store.open_block(&block).await.unwrap();
        assert_eq!(store.open_handles(), 1);
        assert!(querier.contains(5));
        assert!(!querier.contains(4));
        assert_eq!(querier.block_path(), "blocks/a");

        querier.close().unwrap();
        querier.close().unwrap();
        assert!(querier.is_closed());
        assert_eq!(store.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_dropped_querier_releases_its_handle() {
        let store = InMemoryBlockStore::new();
        let block = BlockRef::new(
            "blocks/dropped",
            FingerprintRange::new(0, 1),
            Timestamp::from_millis(0),
            Timestamp::from_millis(1),
        );
        store.insert(block.clone(), vec![0, 1]);

        let first = store.open_block(&block).await.unwrap();
        let mut second = store.open_block(&block).await.unwrap();
        assert_eq!(store.open_handles(), 2);

        drop(first);
        assert_eq!(store.open_handles(), 1);

        second.close().unwrap();
        drop(second);
        assert_eq!(store.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_broken_block_fails_to_open() {
        let store = InMemoryBlockStore::new();
        store.insert_broken("blocks/bad", "checksum mismatch");
        let block = BlockRef::new(
            "blocks/bad",
            FingerprintRange::new(0, 1),
            Timestamp::from_millis(0),
            Timestamp::from_millis(1),
        );

        let err = store.open_block(&block).await.unwrap_err();
        assert!(matches!(err, DownloadError::Failed { .. }));
        assert_eq!(store.open_handles(), 0);
    }
}
