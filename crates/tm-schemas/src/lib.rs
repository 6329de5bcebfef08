//! Shared data model for the transfer market.
//!
//! Club-pair convention, applied everywhere:
//! - `from_club` is the **selling** club (current owner of the player).
//! - `to_club` is the **buying** club (the bidder).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deriving a Transfer id from the Offer id that produced it.
const TRANSFER_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6f, 0x8e, 0x2b, 0x41, 0x3c, 0x5d, 0x4a, 0x17, 0x9b, 0x02, 0xd4, 0x7e, 0x15, 0xa3, 0xc8, 0x90,
]);

/// Current UTC time truncated to microseconds (the precision of a Postgres
/// `timestamptz`), so timestamps survive a remote round-trip unchanged.
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

// ---------------------------------------------------------------------------
// OfferStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OfferStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "rejected")]
    Rejected,
    #[serde(rename = "counter-offer")]
    CounterOffer,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
            OfferStatus::CounterOffer => "counter-offer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "pending" => Some(OfferStatus::Pending),
            "accepted" => Some(OfferStatus::Accepted),
            "rejected" => Some(OfferStatus::Rejected),
            "counter-offer" => Some(OfferStatus::CounterOffer),
            _ => None,
        }
    }

    /// `accepted` and `rejected` admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OfferStatus::Accepted | OfferStatus::Rejected)
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Offer
// ---------------------------------------------------------------------------

/// One status change in an offer's local history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEvent {
    pub at: DateTime<Utc>,
    pub from: Option<OfferStatus>,
    pub to: OfferStatus,
    pub actor_id: Option<String>,
    pub counter_amount: Option<i64>,
    pub counter_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub player_id: String,
    pub player_name: String,
    /// Selling club.
    pub from_club: String,
    /// Buying club.
    pub to_club: String,
    pub amount: i64,
    pub status: OfferStatus,
    /// Set only while `status` is `counter-offer`.
    pub counter_amount: Option<i64>,
    /// Set only while `status` is `counter-offer`.
    pub counter_message: Option<String>,
    pub date: DateTime<Utc>,
    pub actor_id: Option<String>,
    /// Local only; never replicated to the remote store.
    #[serde(default)]
    pub history: Vec<OfferEvent>,
}

impl Offer {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn buyer(&self) -> &str {
        &self.to_club
    }

    pub fn seller(&self) -> &str {
        &self.from_club
    }

    /// Equality on every replicated field (i.e. everything except `history`).
    pub fn same_replicated_fields(&self, other: &Offer) -> bool {
        self.id == other.id
            && self.player_id == other.player_id
            && self.player_name == other.player_name
            && self.from_club == other.from_club
            && self.to_club == other.to_club
            && self.amount == other.amount
            && self.status == other.status
            && self.counter_amount == other.counter_amount
            && self.counter_message == other.counter_message
            && self.date == other.date
            && self.actor_id == other.actor_id
    }
}

// ---------------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub player_id: String,
    pub player_name: String,
    pub from_club: String,
    pub to_club: String,
    pub fee: i64,
    pub date: DateTime<Utc>,
}

impl Transfer {
    /// Transfer id for the given offer. Deterministic, so every process that
    /// finalizes the same offer produces the same transfer row.
    pub fn id_for_offer(offer_id: Uuid) -> Uuid {
        Uuid::new_v5(&TRANSFER_ID_NAMESPACE, offer_id.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// MarketStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub is_open: bool,
    pub updated_at: DateTime<Utc>,
}

impl MarketStatus {
    pub fn new(is_open: bool, updated_at: DateTime<Utc>) -> Self {
        Self {
            is_open,
            updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// MarketSnapshot
// ---------------------------------------------------------------------------

/// Whole-market view: what the local cache persists and what a remote pull
/// returns. Maps are keyed by entity id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub offers: BTreeMap<Uuid, Offer>,
    pub transfers: BTreeMap<Uuid, Transfer>,
    pub market: Option<MarketStatus>,
}

impl MarketSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_parts(
        offers: impl IntoIterator<Item = Offer>,
        transfers: impl IntoIterator<Item = Transfer>,
        market: Option<MarketStatus>,
    ) -> Self {
        Self {
            offers: offers.into_iter().map(|o| (o.id, o)).collect(),
            transfers: transfers.into_iter().map(|t| (t.id, t)).collect(),
            market,
        }
    }
}
