//! Remote wire shapes and their conversion to/from the local model.
//!
//! The remote `user_id` column is a UUID. Local actor identities are opaque
//! strings, so anything that is not a well-formed UUID is sent as `NULL`
//! rather than rejecting the whole row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tm_schemas::{MarketStatus, Offer, OfferStatus, Transfer};
use uuid::Uuid;

use crate::RemoteSyncError;

/// Primary key of the singleton `market_status` row.
pub const MARKET_STATUS_ROW_ID: i32 = 1;

/// Coerce an actor identity to a UUID, or `None` when malformed.
pub fn normalize_actor_id(actor_id: Option<&str>) -> Option<Uuid> {
    let raw = actor_id?.trim();
    if raw.is_empty() {
        return None;
    }
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!(actor = %raw, "actor id is not a well-formed identifier; sending none");
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRow {
    pub id: Uuid,
    pub player_id: String,
    pub player_name: String,
    pub from_club: String,
    pub to_club: String,
    pub amount: i64,
    pub status: String,
    pub user_id: Option<Uuid>,
    pub date: DateTime<Utc>,
    pub counter_amount: Option<i64>,
    pub counter_message: Option<String>,
}

impl OfferRow {
    pub fn from_offer(o: &Offer) -> Self {
        Self {
            id: o.id,
            player_id: o.player_id.clone(),
            player_name: o.player_name.clone(),
            from_club: o.from_club.clone(),
            to_club: o.to_club.clone(),
            amount: o.amount,
            status: o.status.as_str().to_string(),
            user_id: normalize_actor_id(o.actor_id.as_deref()),
            date: o.date,
            counter_amount: o.counter_amount,
            counter_message: o.counter_message.clone(),
        }
    }

    /// Remote rows carry no history; it is filled in locally on refresh.
    pub fn into_offer(self) -> Result<Offer, RemoteSyncError> {
        let status = OfferStatus::parse(&self.status).ok_or_else(|| {
            RemoteSyncError::Decode(format!("offer {}: unknown status {:?}", self.id, self.status))
        })?;
        Ok(Offer {
            id: self.id,
            player_id: self.player_id,
            player_name: self.player_name,
            from_club: self.from_club,
            to_club: self.to_club,
            amount: self.amount,
            status,
            counter_amount: self.counter_amount,
            counter_message: self.counter_message,
            date: self.date,
            actor_id: self.user_id.map(|u| u.to_string()),
            history: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRow {
    pub id: Uuid,
    pub player_id: String,
    pub player_name: String,
    pub from_club: String,
    pub to_club: String,
    pub fee: i64,
    pub date: DateTime<Utc>,
}

impl From<&Transfer> for TransferRow {
    fn from(t: &Transfer) -> Self {
        Self {
            id: t.id,
            player_id: t.player_id.clone(),
            player_name: t.player_name.clone(),
            from_club: t.from_club.clone(),
            to_club: t.to_club.clone(),
            fee: t.fee,
            date: t.date,
        }
    }
}

impl From<TransferRow> for Transfer {
    fn from(r: TransferRow) -> Self {
        Self {
            id: r.id,
            player_id: r.player_id,
            player_name: r.player_name,
            from_club: r.from_club,
            to_club: r.to_club,
            fee: r.fee,
            date: r.date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatusRow {
    pub id: i32,
    pub is_open: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<MarketStatus> for MarketStatusRow {
    fn from(m: MarketStatus) -> Self {
        Self {
            id: MARKET_STATUS_ROW_ID,
            is_open: m.is_open,
            updated_at: m.updated_at,
        }
    }
}

impl From<MarketStatusRow> for MarketStatus {
    fn from(r: MarketStatusRow) -> Self {
        MarketStatus::new(r.is_open, r.updated_at)
    }
}
