//! Per-block callback execution with guaranteed querier release

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::{BlockRef, Fingerprint};
use crate::error::ShipperError;
use crate::ports::{BlockQuerier, BlockWithQuerier};

/// Owns a delivered block for the length of one callback and closes its
/// querier when dropped, whichever way the callback exits.
pub(crate) struct QuerierGuard<Q: BlockQuerier> {
    inner: BlockWithQuerier<Q>,
}

impl<Q: BlockQuerier> QuerierGuard<Q> {
    pub(crate) fn new(inner: BlockWithQuerier<Q>) -> Self {
        Self { inner }
    }

    pub(crate) fn block(&self) -> &BlockRef {
        &self.inner.block
    }

    pub(crate) fn querier_mut(&mut self) -> &mut Q {
        &mut self.inner.querier
    }
}

impl<Q: BlockQuerier> Drop for QuerierGuard<Q> {
    fn drop(&mut self) {
        let block_path = &self.inner.block.block_path;
        debug!(block = %block_path, "closing block");
        if let Err(e) = self.inner.querier.close() {
            warn!(block = %block_path, error = %e, "failed to close block querier");
            return;
        }
        debug!(block = %block_path, "the block has been closed");
    }
}

/// Runs `callback` for one delivered block, then closes the block's querier.
///
/// The querier is closed before any callback error is returned.
pub(crate) fn run_callback<Q, F>(
    callback: &mut F,
    delivered: BlockWithQuerier<Q>,
) -> Result<(), ShipperError>
where
    Q: BlockQuerier,
    F: FnMut(&mut Q, Fingerprint, Fingerprint) -> anyhow::Result<()>,
{
    let mut guard = QuerierGuard::new(delivered);
    let (min_fp, max_fp) = (guard.block().min_fingerprint, guard.block().max_fingerprint);

    debug!(block = %guard.block().block_path, "start running callback");
    let result = callback(guard.querier_mut(), min_fp, max_fp);
    debug!(block = %guard.block().block_path, ok = result.is_ok(), "end running callback");

    let result = result.map_err(|source| ShipperError::Callback {
        block_path: guard.block().block_path.clone(),
        source,
    });
    drop(guard);
    result
}

/// Closes the result stream and releases every block still buffered in it.
///
/// Waits for sends already holding a reserved slot, so no opened block is left
/// behind. Later sends fail and hand the block back to the worker.
pub(crate) async fn release_undelivered<Q: BlockQuerier>(
    results: &mut mpsc::Receiver<BlockWithQuerier<Q>>,
) {
    results.close();
    let mut released = 0usize;
    while let Some(undelivered) = results.recv().await {
        drop(QuerierGuard::new(undelivered));
        released += 1;
    }
    if released > 0 {
        debug!(released, "released undelivered blocks");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FingerprintRange, Timestamp};
    use crate::error::DownloadError;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingQuerier {
        closed: Arc<AtomicUsize>,
        fail_close: bool,
    }

    impl BlockQuerier for CountingQuerier {
        fn close(&mut self) -> Result<(), DownloadError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(DownloadError::Close {
                    block_path: "blocks/x".to_string(),
                    reason: "disk gone".to_string(),
                });
            }
            Ok(())
        }
    }

    fn delivered(closed: &Arc<AtomicUsize>, fail_close: bool) -> BlockWithQuerier<CountingQuerier> {
        BlockWithQuerier::new(
            BlockRef::new(
                "blocks/x",
                FingerprintRange::new(7, 42),
                Timestamp::from_millis(0),
                Timestamp::from_millis(10),
            ),
            CountingQuerier {
                closed: Arc::clone(closed),
                fail_close,
            },
        )
    }

    #[test]
    fn test_callback_receives_fingerprint_bounds_and_querier_is_closed() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut seen = None;
        let mut callback = |q: &mut CountingQuerier, min: Fingerprint, max: Fingerprint| {
            seen = Some((min, max, q.closed.load(Ordering::SeqCst)));
            Ok(())
        };

        run_callback(&mut callback, delivered(&closed, false)).unwrap();

        // Querier was still open while the callback ran.
        assert_eq!(seen, Some((7, 42, 0)));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_querier_closed_before_callback_error_is_returned() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut callback =
            |_: &mut CountingQuerier, _: Fingerprint, _: Fingerprint| Err(anyhow::anyhow!("boom"));

        let err = run_callback(&mut callback, delivered(&closed, false)).unwrap_err();

        assert_eq!(closed.load(Ordering::SeqCst), 1);
        match err {
            ShipperError::Callback { block_path, source } => {
                assert_eq!(block_path, "blocks/x");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_querier_closed_when_callback_panics() {
        let closed = Arc::new(AtomicUsize::new(0));
        let block = delivered(&closed, false);

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut callback =
                |_: &mut CountingQuerier, _: Fingerprint, _: Fingerprint| -> anyhow::Result<()> {
                    panic!("callback exploded")
                };
            run_callback(&mut callback, block)
        }));

        assert!(outcome.is_err());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_undelivered_closes_buffered_blocks() {
        let closed = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::channel(4);
        tx.try_send(delivered(&closed, false)).unwrap();
        tx.try_send(delivered(&closed, true)).unwrap();

        release_undelivered(&mut rx).await;

        assert_eq!(closed.load(Ordering::SeqCst), 2);
        let rejected = tx.try_send(delivered(&closed, false));
        assert!(matches!(rejected, Err(mpsc::error::TrySendError::Closed(_))));
    }

    #[tokio::test]
    async fn test_release_undelivered_waits_for_reserved_send() {
        let closed = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::channel(4);
        let permit = tx.reserve().await.unwrap();

        let release = tokio::spawn(async move {
            release_undelivered(&mut rx).await;
        });
        tokio::task::yield_now().await;
        assert!(!release.is_finished());

        // Slot was reserved before the stream closed; the block still arrives.
        permit.send(delivered(&closed, false));
        release.await.unwrap();

        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_failure_does_not_fail_callback() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut callback = |_: &mut CountingQuerier, _: Fingerprint, _: Fingerprint| Ok(());

        assert!(run_callback(&mut callback, delivered(&closed, true)).is_ok());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
