//! Metrics hooks for shipper operations
//!
//! Counts resolutions, deliveries and the ways a fetch can end early.
//!
//! ## Usage
//!
//! ```ignore
//! use bloom_shipper::metrics::ShipperMetrics;
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(ShipperMetrics::new());
//! let shipper = BloomShipper::with_downloader(client, downloader)
//!     .with_metrics(metrics.clone());
//!
//! // ... later
//! let snapshot = metrics.snapshot();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters for shipper operations
#[derive(Default)]
pub struct ShipperMetrics {
    /// Metas returned by the manifest store
    pub metas_fetched: AtomicU64,
    /// Active block refs handed back to callers
    pub block_refs_resolved: AtomicU64,
    /// Blocks whose callback completed successfully
    pub blocks_delivered: AtomicU64,
    /// Callbacks that returned an error
    pub callback_failures: AtomicU64,
    /// Errors received from the downloader
    pub download_errors: AtomicU64,
    /// Fetches or resolutions ended by cancellation
    pub cancellations: AtomicU64,
}

impl ShipperMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            metas_fetched: self.metas_fetched.load(Ordering::Relaxed),
            block_refs_resolved: self.block_refs_resolved.load(Ordering::Relaxed),
            blocks_delivered: self.blocks_delivered.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            download_errors: self.download_errors.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.metas_fetched.store(0, Ordering::Relaxed);
        self.block_refs_resolved.store(0, Ordering::Relaxed);
        self.blocks_delivered.store(0, Ordering::Relaxed);
        self.callback_failures.store(0, Ordering::Relaxed);
        self.download_errors.store(0, Ordering::Relaxed);
        self.cancellations.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub metas_fetched: u64,
    pub block_refs_resolved: u64,
    pub blocks_delivered: u64,
    pub callback_failures: u64,
    pub download_errors: u64,
    pub cancellations: u64,
}

/// Trait for custom metrics recording implementations
///
/// Implement this trait to integrate with external metrics systems.
pub trait MetricsRecorder: Send + Sync {
    fn record_metas_fetched(&self, count: usize);
    fn record_block_refs_resolved(&self, count: usize);
    fn record_block_delivered(&self);
    fn record_callback_failure(&self);
    fn record_download_error(&self);
    fn record_cancellation(&self);
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_metas_fetched(&self, _: usize) {}
    fn record_block_refs_resolved(&self, _: usize) {}
    fn record_block_delivered(&self) {}
    fn record_callback_failure(&self) {}
    fn record_download_error(&self) {}
    fn record_cancellation(&self) {}
}

impl MetricsRecorder for ShipperMetrics {
    fn record_metas_fetched(&self, count: usize) {
        self.metas_fetched.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record_block_refs_resolved(&self, count: usize) {
        self.block_refs_resolved
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record_block_delivered(&self) {
        self.blocks_delivered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_callback_failure(&self) {
        self.callback_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_download_error(&self) {
        self.download_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let snapshot = ShipperMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_record_and_reset() {
        let metrics = ShipperMetrics::new();

        metrics.record_metas_fetched(3);
        metrics.record_block_refs_resolved(5);
        metrics.record_block_delivered();
        metrics.record_block_delivered();
        metrics.record_callback_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.metas_fetched, 3);
        assert_eq!(snapshot.block_refs_resolved, 5);
        assert_eq!(snapshot.blocks_delivered, 2);
        assert_eq!(snapshot.callback_failures, 1);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        metrics.record_metas_fetched(1);
        metrics.record_block_refs_resolved(1);
        metrics.record_block_delivered();
        metrics.record_callback_failure();
        metrics.record_download_error();
        metrics.record_cancellation();
    }
}
