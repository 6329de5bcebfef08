//! Push-on-mutation.
//!
//! Mutations enqueue a [`PushOp`] and return immediately. A single worker
//! drains the queue in FIFO order (so writes to one entity land in mutation
//! order), retrying each op a bounded number of times. A failed or dropped
//! op is logged and forgotten; the next successful refresh is authoritative.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::rows::{MarketStatusRow, OfferRow, TransferRow};
use crate::{RemoteStore, RemoteSyncError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOp {
    UpsertOffer(OfferRow),
    UpsertTransfer(TransferRow),
    DeleteTransfer(Uuid),
    UpsertMarketStatus(MarketStatusRow),
}

impl PushOp {
    pub fn kind(&self) -> &'static str {
        match self {
            PushOp::UpsertOffer(_) => "upsert_offer",
            PushOp::UpsertTransfer(_) => "upsert_transfer",
            PushOp::DeleteTransfer(_) => "delete_transfer",
            PushOp::UpsertMarketStatus(_) => "upsert_market_status",
        }
    }

    pub fn entity_id(&self) -> String {
        match self {
            PushOp::UpsertOffer(r) => r.id.to_string(),
            PushOp::UpsertTransfer(r) => r.id.to_string(),
            PushOp::DeleteTransfer(id) => id.to_string(),
            PushOp::UpsertMarketStatus(r) => r.id.to_string(),
        }
    }

    pub async fn apply(&self, store: &dyn RemoteStore) -> Result<(), RemoteSyncError> {
        match self {
            PushOp::UpsertOffer(r) => store.upsert_offer(r).await,
            PushOp::UpsertTransfer(r) => store.upsert_transfer(r).await,
            PushOp::DeleteTransfer(id) => store.delete_transfer(*id).await,
            PushOp::UpsertMarketStatus(r) => store.upsert_market_status(r).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub capacity: usize,
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `backoff * n`.
    pub backoff: Duration,
    pub timeout: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            max_attempts: 3,
            backoff: Duration::from_millis(250),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushStats {
    pub enqueued: u64,
    pub pushed: u64,
    pub failed: u64,
    /// Rejected at enqueue because the queue was full or closed.
    pub dropped: u64,
    pub in_flight: usize,
}

#[derive(Default)]
struct Shared {
    enqueued: AtomicU64,
    pushed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl Shared {
    fn settle_one(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct PushQueue {
    tx: mpsc::Sender<PushOp>,
    shared: Arc<Shared>,
}

impl PushQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn RemoteStore>, config: PushConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let shared = Arc::new(Shared::default());
        tokio::spawn(run_worker(store, config, rx, Arc::clone(&shared)));
        Self { tx, shared }
    }

    /// Never blocks. Returns `false` if the op was dropped.
    pub fn enqueue(&self, op: PushOp) -> bool {
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        match self.tx.try_send(op) {
            Ok(()) => {
                self.shared.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(op)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                self.shared.settle_one();
                tracing::warn!(
                    op = op.kind(),
                    entity_id = %op.entity_id(),
                    "push queue full; dropping op"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(op)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                self.shared.settle_one();
                tracing::error!(
                    op = op.kind(),
                    entity_id = %op.entity_id(),
                    error = %RemoteSyncError::QueueClosed,
                    "push dropped"
                );
                false
            }
        }
    }

    pub fn stats(&self) -> PushStats {
        PushStats {
            enqueued: self.shared.enqueued.load(Ordering::Relaxed),
            pushed: self.shared.pushed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            in_flight: self.shared.in_flight.load(Ordering::SeqCst),
        }
    }

    /// Resolves once every op enqueued so far has been delivered or given up on.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

async fn run_worker(
    store: Arc<dyn RemoteStore>,
    config: PushConfig,
    mut rx: mpsc::Receiver<PushOp>,
    shared: Arc<Shared>,
) {
    while let Some(op) = rx.recv().await {
        match deliver(store.as_ref(), &op, &config).await {
            Ok(attempts) => {
                shared.pushed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(op = op.kind(), entity_id = %op.entity_id(), attempts, "pushed");
            }
            Err((err, attempts)) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    op = op.kind(),
                    entity_id = %op.entity_id(),
                    attempts,
                    error = %err,
                    "remote push failed; local state stays authoritative"
                );
            }
        }
        shared.settle_one();
    }
}

async fn deliver(
    store: &dyn RemoteStore,
    op: &PushOp,
    config: &PushConfig,
) -> Result<u32, (RemoteSyncError, u32)> {
    let max = config.max_attempts.max(1);
    let mut last = RemoteSyncError::Unavailable("no attempt made".to_string());

    for attempt in 1..=max {
        match tokio::time::timeout(config.timeout, op.apply(store)).await {
            Ok(Ok(())) => return Ok(attempt),
            Ok(Err(e)) => last = e,
            Err(_) => last = RemoteSyncError::Timeout(config.timeout),
        }
        if attempt < max {
            tracing::debug!(op = op.kind(), attempt, error = %last, "push attempt failed; retrying");
            tokio::time::sleep(config.backoff * attempt).await;
        }
    }
    Err((last, max))
}
