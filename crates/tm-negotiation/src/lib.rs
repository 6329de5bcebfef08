//! tm-negotiation
//!
//! Offer state machine, Offer Ledger and Transfer Ledger.
//!
//! Deterministic, pure logic. No IO. No remote calls. The caller supplies the
//! clock (`now`) so every operation is reproducible in tests.

mod book;
mod error;
mod ledger;
mod state_machine;

pub use book::{MarketBook, NewOffer, TransitionOutcome};
pub use error::NegotiationError;
pub use ledger::{OfferFilter, OfferLedger, TransferLedger};
pub use state_machine::{
    agreed_fee, apply_transition, check_transition, is_legal, transfer_for, OfferChanges,
};
