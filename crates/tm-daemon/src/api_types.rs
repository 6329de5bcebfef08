//! Request and response types for all tm-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests.  No business logic lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tm_audit::ActionKind;
use tm_negotiation::{NewOffer, OfferChanges};
use tm_schemas::{MarketStatus, OfferStatus};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Response body when a route is refused because a gate is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRefusedResponse {
    pub error: String,
    /// Which gate failed. Currently always "market_open".
    pub gate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// 502 body for a failed refresh. The local state was not touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshFailedResponse {
    pub error: String,
    pub local_cache_preserved: bool,
}

// ---------------------------------------------------------------------------
// /v1/market
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketResponse {
    pub is_open: bool,
    pub updated_at: DateTime<Utc>,
    pub sync_enabled: bool,
}

impl MarketResponse {
    pub fn new(status: MarketStatus, sync_enabled: bool) -> Self {
        Self {
            is_open: status.is_open,
            updated_at: status.updated_at,
            sync_enabled,
        }
    }
}

// ---------------------------------------------------------------------------
// /v1/offers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOfferRequest {
    pub player_id: String,
    #[serde(default)]
    pub player_name: String,
    /// Selling club.
    pub from_club: String,
    /// Buying club.
    pub to_club: String,
    pub amount: i64,
}

impl From<CreateOfferRequest> for NewOffer {
    fn from(r: CreateOfferRequest) -> Self {
        NewOffer {
            player_id: r.player_id,
            player_name: r.player_name,
            from_club: r.from_club,
            to_club: r.to_club,
            amount: r.amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub status: OfferStatus,
    #[serde(default)]
    pub counter_amount: Option<i64>,
    #[serde(default)]
    pub counter_message: Option<String>,
}

impl TransitionRequest {
    pub fn changes(&self) -> OfferChanges {
        OfferChanges {
            counter_amount: self.counter_amount,
            counter_message: self.counter_message.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// /v1/notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenResponse {
    pub offer_id: Uuid,
    /// false if the offer was already dismissed.
    pub newly_seen: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionableQuery {
    pub club: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionableResponse {
    pub actor_id: String,
    pub club: String,
    pub actionable: usize,
}

// ---------------------------------------------------------------------------
// /v1/activity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendActivityRequest {
    pub kind: ActionKind,
    #[serde(default)]
    pub details: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearedResponse {
    pub cleared: bool,
}
