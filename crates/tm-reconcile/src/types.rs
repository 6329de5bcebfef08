use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One observed difference. Ordering is total so reports are stable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncDiff {
    /// Present remotely, unknown locally.
    OfferAdded { offer_id: Uuid },
    /// Present locally, absent remotely. Refresh replaces it away.
    OfferDropped { offer_id: Uuid },
    OfferChanged {
        offer_id: Uuid,
        field: String,
        local: String,
        remote: String,
    },
    TransferAdded { transfer_id: Uuid },
    TransferDropped { transfer_id: Uuid },
    TransferChanged {
        transfer_id: Uuid,
        field: String,
        local: String,
        remote: String,
    },
    MarketChanged {
        field: String,
        local: String,
        remote: String,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub local_offers: usize,
    pub remote_offers: usize,
    pub local_transfers: usize,
    pub remote_transfers: usize,
    pub diffs: Vec<SyncDiff>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.diffs.is_empty()
    }

    pub fn dropped_offers(&self) -> Vec<Uuid> {
        self.diffs
            .iter()
            .filter_map(|d| match d {
                SyncDiff::OfferDropped { offer_id } => Some(*offer_id),
                _ => None,
            })
            .collect()
    }

    pub fn changed_offer_count(&self) -> usize {
        let mut ids: Vec<Uuid> = self
            .diffs
            .iter()
            .filter_map(|d| match d {
                SyncDiff::OfferChanged { offer_id, .. } => Some(*offer_id),
                _ => None,
            })
            .collect();
        ids.dedup();
        ids.len()
    }
}
