//! Remote store seam.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::rows::{MarketStatusRow, OfferRow, TransferRow};
use crate::RemoteSyncError;

/// Authoritative durable store. Every write is an upsert keyed by id
/// (transfer delete excepted).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn upsert_offer(&self, row: &OfferRow) -> Result<(), RemoteSyncError>;
    async fn upsert_transfer(&self, row: &TransferRow) -> Result<(), RemoteSyncError>;
    async fn delete_transfer(&self, id: Uuid) -> Result<(), RemoteSyncError>;
    async fn upsert_market_status(&self, row: &MarketStatusRow) -> Result<(), RemoteSyncError>;

    async fn fetch_offers(&self) -> Result<Vec<OfferRow>, RemoteSyncError>;
    async fn fetch_transfers(&self) -> Result<Vec<TransferRow>, RemoteSyncError>;
    async fn fetch_market_status(&self) -> Result<Option<MarketStatusRow>, RemoteSyncError>;
}

#[derive(Default)]
struct Tables {
    offers: BTreeMap<Uuid, OfferRow>,
    transfers: BTreeMap<Uuid, TransferRow>,
    market: Option<MarketStatusRow>,
}

/// In-process store holding wire rows. Share it through an `Arc` to stand
/// in for a remote that several engines talk to.
#[derive(Default)]
pub struct MemoryRemoteStore {
    tables: Mutex<Tables>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer_count(&self) -> usize {
        self.lock().offers.len()
    }

    pub fn transfer_count(&self) -> usize {
        self.lock().transfers.len()
    }

    pub fn offer_row(&self, id: Uuid) -> Option<OfferRow> {
        self.lock().offers.get(&id).cloned()
    }

    pub fn market_row(&self) -> Option<MarketStatusRow> {
        self.lock().market
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn upsert_offer(&self, row: &OfferRow) -> Result<(), RemoteSyncError> {
        self.lock().offers.insert(row.id, row.clone());
        Ok(())
    }

    async fn upsert_transfer(&self, row: &TransferRow) -> Result<(), RemoteSyncError> {
        self.lock().transfers.insert(row.id, row.clone());
        Ok(())
    }

    async fn delete_transfer(&self, id: Uuid) -> Result<(), RemoteSyncError> {
        self.lock().transfers.remove(&id);
        Ok(())
    }

    async fn upsert_market_status(&self, row: &MarketStatusRow) -> Result<(), RemoteSyncError> {
        self.lock().market = Some(*row);
        Ok(())
    }

    async fn fetch_offers(&self) -> Result<Vec<OfferRow>, RemoteSyncError> {
        Ok(self.lock().offers.values().cloned().collect())
    }

    async fn fetch_transfers(&self) -> Result<Vec<TransferRow>, RemoteSyncError> {
        Ok(self.lock().transfers.values().cloned().collect())
    }

    async fn fetch_market_status(&self) -> Result<Option<MarketStatusRow>, RemoteSyncError> {
        Ok(self.lock().market)
    }
}
