use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tm_sync::{MarketStatusRow, MemoryRemoteStore, OfferRow, RemoteStore, RemoteSyncError, TransferRow};
use uuid::Uuid;

/// [`MemoryRemoteStore`] with switchable failures.
///
/// Each switch applies to every call of its kind until flipped back. Counters
/// include failed calls.
#[derive(Default)]
pub struct FlakyRemoteStore {
    inner: MemoryRemoteStore,
    fail_push: AtomicBool,
    fail_pull: AtomicBool,
    pull_delay_ms: AtomicU64,
    push_calls: AtomicU64,
    pull_calls: AtomicU64,
}

impl FlakyRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryRemoteStore {
        &self.inner
    }

    pub fn fail_push(&self, on: bool) {
        self.fail_push.store(on, Ordering::SeqCst);
    }

    pub fn fail_pull(&self, on: bool) {
        self.fail_pull.store(on, Ordering::SeqCst);
    }

    /// Every fetch sleeps this long first. Zero disables.
    pub fn delay_pull(&self, delay: Duration) {
        self.pull_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn push_calls(&self) -> u64 {
        self.push_calls.load(Ordering::SeqCst)
    }

    pub fn pull_calls(&self) -> u64 {
        self.pull_calls.load(Ordering::SeqCst)
    }

    fn before_push(&self) -> Result<(), RemoteSyncError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(RemoteSyncError::Unavailable("injected push failure".to_string()));
        }
        Ok(())
    }

    async fn before_pull(&self) -> Result<(), RemoteSyncError> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.pull_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(RemoteSyncError::Unavailable("injected pull failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FlakyRemoteStore {
    async fn upsert_offer(&self, row: &OfferRow) -> Result<(), RemoteSyncError> {
        self.before_push()?;
        self.inner.upsert_offer(row).await
    }

    async fn upsert_transfer(&self, row: &TransferRow) -> Result<(), RemoteSyncError> {
        self.before_push()?;
        self.inner.upsert_transfer(row).await
    }

    async fn delete_transfer(&self, id: Uuid) -> Result<(), RemoteSyncError> {
        self.before_push()?;
        self.inner.delete_transfer(id).await
    }

    async fn upsert_market_status(&self, row: &MarketStatusRow) -> Result<(), RemoteSyncError> {
        self.before_push()?;
        self.inner.upsert_market_status(row).await
    }

    async fn fetch_offers(&self) -> Result<Vec<OfferRow>, RemoteSyncError> {
        self.before_pull().await?;
        self.inner.fetch_offers().await
    }

    async fn fetch_transfers(&self) -> Result<Vec<TransferRow>, RemoteSyncError> {
        self.before_pull().await?;
        self.inner.fetch_transfers().await
    }

    async fn fetch_market_status(&self) -> Result<Option<MarketStatusRow>, RemoteSyncError> {
        self.before_pull().await?;
        self.inner.fetch_market_status().await
    }
}
