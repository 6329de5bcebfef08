//! Offer Ledger and Transfer Ledger.
//!
//! Both are plain ordered maps keyed by entity id. They own no locks; the
//! engine serializes mutation and swaps whole versions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tm_schemas::{Offer, OfferStatus, Transfer};
use uuid::Uuid;

use crate::NegotiationError;

// ---------------------------------------------------------------------------
// OfferFilter
// ---------------------------------------------------------------------------

/// Read-side filter for [`OfferLedger::list`]. Every `Some` field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferFilter {
    pub player_id: Option<String>,
    /// Buying club (`to_club`).
    pub buyer_club: Option<String>,
    /// Selling club (`from_club`).
    pub seller_club: Option<String>,
    /// Club on either side.
    pub club: Option<String>,
    pub status: Option<OfferStatus>,
    pub actor_id: Option<String>,
    /// Exclude accepted/rejected offers.
    #[serde(default)]
    pub active_only: bool,
}

impl OfferFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn buyer(club: impl Into<String>) -> Self {
        Self {
            buyer_club: Some(club.into()),
            ..Self::default()
        }
    }

    pub fn seller(club: impl Into<String>) -> Self {
        Self {
            seller_club: Some(club.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, o: &Offer) -> bool {
        if self.active_only && !o.is_active() {
            return false;
        }
        if let Some(p) = &self.player_id {
            if &o.player_id != p {
                return false;
            }
        }
        if let Some(c) = &self.buyer_club {
            if &o.to_club != c {
                return false;
            }
        }
        if let Some(c) = &self.seller_club {
            if &o.from_club != c {
                return false;
            }
        }
        if let Some(c) = &self.club {
            if &o.to_club != c && &o.from_club != c {
                return false;
            }
        }
        if let Some(s) = self.status {
            if o.status != s {
                return false;
            }
        }
        if let Some(a) = &self.actor_id {
            if o.actor_id.as_deref() != Some(a.as_str()) {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// OfferLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferLedger {
    offers: BTreeMap<Uuid, Offer>,
}

impl OfferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(offers: BTreeMap<Uuid, Offer>) -> Self {
        Self { offers }
    }

    pub fn as_map(&self) -> &BTreeMap<Uuid, Offer> {
        &self.offers
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Offer> {
        self.offers.get(&id)
    }

    pub fn require(&self, id: Uuid) -> Result<&Offer, NegotiationError> {
        self.offers
            .get(&id)
            .ok_or(NegotiationError::OfferNotFound(id))
    }

    /// Insert or replace by id.
    pub fn put(&mut self, offer: Offer) {
        self.offers.insert(offer.id, offer);
    }

    /// Matching offers ordered by `date`, then `id`.
    pub fn list(&self, filter: &OfferFilter) -> Vec<Offer> {
        let mut out: Vec<Offer> = self
            .offers
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        out
    }
}

// ---------------------------------------------------------------------------
// TransferLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferLedger {
    transfers: BTreeMap<Uuid, Transfer>,
}

impl TransferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(transfers: BTreeMap<Uuid, Transfer>) -> Self {
        Self { transfers }
    }

    pub fn as_map(&self) -> &BTreeMap<Uuid, Transfer> {
        &self.transfers
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Transfer> {
        self.transfers.get(&id)
    }

    /// Insert `transfer` unless one with the same id already exists.
    ///
    /// Returns the stored record and `true` when it was newly created.
    pub fn materialize(&mut self, transfer: Transfer) -> (Transfer, bool) {
        if let Some(existing) = self.transfers.get(&transfer.id) {
            return (existing.clone(), false);
        }
        self.transfers.insert(transfer.id, transfer.clone());
        (transfer, true)
    }

    pub fn remove(&mut self, id: Uuid) -> Result<Transfer, NegotiationError> {
        self.transfers
            .remove(&id)
            .ok_or(NegotiationError::TransferNotFound(id))
    }

    /// All transfers, newest first.
    pub fn list(&self) -> Vec<Transfer> {
        let mut out: Vec<Transfer> = self.transfers.values().cloned().collect();
        out.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
        out
    }
}
