//! Local negotiation errors.
//!
//! Every variant is returned synchronously to the caller and is never retried.

use thiserror::Error;
use tm_schemas::OfferStatus;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    /// Offer creation or transfer finalization attempted while the gate is closed.
    #[error("market is closed")]
    MarketClosed,

    /// The requested status change is not an edge of the offer state machine.
    /// The offer is left unchanged.
    #[error("illegal offer transition: {from} -> {to}")]
    InvalidTransition { from: OfferStatus, to: OfferStatus },

    /// Negative or missing monetary value.
    #[error("invalid amount for {field}: {value:?}")]
    InvalidAmount {
        field: &'static str,
        value: Option<i64>,
    },

    /// Malformed offer input (empty ids, a club bidding for its own player).
    #[error("invalid offer: {0}")]
    InvalidOffer(String),

    #[error("offer not found: {0}")]
    OfferNotFound(Uuid),

    #[error("transfer not found: {0}")]
    TransferNotFound(Uuid),
}
