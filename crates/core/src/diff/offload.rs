//! Background diff computation for large decks.
//!
//! Small decks are diffed inline; decks at or above [`OFFLOAD_THRESHOLD`]
//! total cards are sent to a dedicated worker task over a channel. The worker
//! shares no mutable state with callers, so no locking is needed around
//! diff computation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::DiffError;
use crate::models::Deck;

use super::{compute_diff, DeckDiff};

/// Total card count at which diffs are routed to the background worker.
pub const OFFLOAD_THRESHOLD: usize = 100;

/// How long a pending offloaded request may wait for its reply.
pub const OFFLOAD_TIMEOUT: Duration = Duration::from_secs(30);

struct DiffRequest {
    old: Deck,
    new: Deck,
    reply: oneshot::Sender<DeckDiff>,
}

/// Handle to the background diff worker.
///
/// The worker is reusable across calls and torn down explicitly via
/// [`DiffWorker::shutdown`]; dropping the handle also stops the task once the
/// channel drains.
pub struct DiffWorker {
    tx: mpsc::Sender<DiffRequest>,
    handle: JoinHandle<()>,
    timeout: Duration,
    threshold: usize,
    offloaded: Arc<AtomicU64>,
}

impl DiffWorker {
    /// Spawn a worker with the default threshold and timeout.
    pub fn spawn() -> Self {
        Self::with_limits(OFFLOAD_THRESHOLD, OFFLOAD_TIMEOUT)
    }

    /// Spawn a worker with explicit threshold/timeout (used by config and
    /// tests).
    pub fn with_limits(threshold: usize, timeout: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<DiffRequest>(32);
        let offloaded = Arc::new(AtomicU64::new(0));
        let counter = offloaded.clone();

        let handle = tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                let diff = compute_diff(&req.old, &req.new);
                counter.fetch_add(1, Ordering::Relaxed);
                // A dropped receiver means the caller timed out or went away.
                let _ = req.reply.send(diff);
            }
            debug!("diff worker channel closed, stopping");
        });

        info!(threshold, timeout_secs = timeout.as_secs(), "spawned diff worker");
        Self {
            tx,
            handle,
            timeout,
            threshold,
            offloaded,
        }
    }

    /// Diff two decks without blocking the caller's execution context.
    ///
    /// Decks below the threshold are computed inline; larger decks round-trip
    /// through the worker and time out after the configured deadline.
    pub async fn compute_diff_async(&self, old: &Deck, new: &Deck) -> Result<DeckDiff, DiffError> {
        let old_total = old.total_cards();
        let new_total = new.total_cards();
        if old_total < self.threshold && new_total < self.threshold {
            return Ok(compute_diff(old, new));
        }

        debug!(old_total, new_total, "offloading diff to background worker");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(DiffRequest {
                old: old.clone(),
                new: new.clone(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| DiffError::WorkerGone)?;

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(diff)) => Ok(diff),
            Ok(Err(_)) => Err(DiffError::WorkerGone),
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "offloaded diff timed out"
                );
                Err(DiffError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }

    /// Number of requests the worker has completed (inline diffs excluded).
    pub fn offloaded_requests(&self) -> u64 {
        self.offloaded.load(Ordering::Relaxed)
    }

    /// Tear the worker down, waiting for the task to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.handle.await;
        info!("diff worker shut down");
    }
}
