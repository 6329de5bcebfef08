//! `MarketBook`: the composed local market state.
//!
//! Offer Ledger + Transfer Ledger + Market Gate. All negotiation operations
//! go through here so the gate precondition has a single choke-point.
//! Every operation validates fully before writing, so an `Err` leaves the
//! book untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tm_gate::{GateDisagreement, MarketGate};
use tm_schemas::{MarketSnapshot, MarketStatus, Offer, OfferEvent, OfferStatus, Transfer};
use uuid::Uuid;

use crate::ledger::{OfferLedger, TransferLedger};
use crate::state_machine::{apply_transition, check_transition, transfer_for, OfferChanges};
use crate::NegotiationError;

/// Input to [`MarketBook::create_offer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOffer {
    pub player_id: String,
    pub player_name: String,
    /// Selling club (current owner).
    pub from_club: String,
    /// Buying club (bidder).
    pub to_club: String,
    pub amount: i64,
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub previous: OfferStatus,
    pub offer: Offer,
    /// Present only for `→ accepted`.
    pub transfer: Option<Transfer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketBook {
    pub offers: OfferLedger,
    pub transfers: TransferLedger,
    pub gate: MarketGate,
}

impl MarketBook {
    pub fn new(gate: MarketGate) -> Self {
        Self {
            offers: OfferLedger::new(),
            transfers: TransferLedger::new(),
            gate,
        }
    }

    /// Build from a snapshot. A snapshot without a market row boots closed.
    pub fn from_snapshot(snapshot: MarketSnapshot, now: DateTime<Utc>) -> Self {
        let gate = match snapshot.market {
            Some(m) => MarketGate::from_status(m),
            None => MarketGate::closed(now),
        };
        Self {
            offers: OfferLedger::from_map(snapshot.offers),
            transfers: TransferLedger::from_map(snapshot.transfers),
            gate,
        }
    }

    pub fn to_snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            offers: self.offers.as_map().clone(),
            transfers: self.transfers.as_map().clone(),
            market: Some(self.gate.status()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.gate.is_open()
    }

    pub fn create_offer(
        &mut self,
        new: NewOffer,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Offer, NegotiationError> {
        if !self.gate.is_open() {
            return Err(NegotiationError::MarketClosed);
        }
        if new.amount < 0 {
            return Err(NegotiationError::InvalidAmount {
                field: "amount",
                value: Some(new.amount),
            });
        }
        validate_new_offer(&new)?;

        let offer = Offer {
            id: Uuid::new_v4(),
            player_id: new.player_id,
            player_name: new.player_name,
            from_club: new.from_club,
            to_club: new.to_club,
            amount: new.amount,
            status: OfferStatus::Pending,
            counter_amount: None,
            counter_message: None,
            date: now,
            actor_id: Some(actor_id.to_string()),
            history: vec![OfferEvent {
                at: now,
                from: None,
                to: OfferStatus::Pending,
                actor_id: Some(actor_id.to_string()),
                counter_amount: None,
                counter_message: None,
            }],
        };
        self.offers.put(offer.clone());
        Ok(offer)
    }

    /// Move an offer along the state machine.
    ///
    /// `→ accepted` additionally requires an open market and materializes the
    /// Transfer exactly once (a second accept fails as an illegal transition
    /// because the offer is already terminal).
    pub fn transition_offer(
        &mut self,
        offer_id: Uuid,
        to: OfferStatus,
        changes: &OfferChanges,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, NegotiationError> {
        let current = self.offers.require(offer_id)?;
        check_transition(current.status, to)?;

        if to == OfferStatus::Accepted && !self.gate.is_open() {
            return Err(NegotiationError::MarketClosed);
        }

        let next = apply_transition(current, to, changes, actor_id, now)?;
        let transfer = (to == OfferStatus::Accepted).then(|| transfer_for(current, now));
        let previous = current.status;

        self.offers.put(next.clone());
        let transfer = transfer.map(|t| self.transfers.materialize(t).0);

        Ok(TransitionOutcome {
            previous,
            offer: next,
            transfer,
        })
    }

    /// Administrative removal. Not gated by the market state.
    pub fn remove_transfer(&mut self, transfer_id: Uuid) -> Result<Transfer, NegotiationError> {
        self.transfers.remove(transfer_id)
    }

    pub fn set_open(&mut self, open: bool, actor_id: &str, now: DateTime<Utc>) -> MarketStatus {
        self.gate.set_open(open, actor_id, now)
    }

    /// Replace every collection with the remote snapshot.
    ///
    /// Local `history` survives for offers present on both sides. When the
    /// remote has no market row the local gate is kept. Returns the gate
    /// disagreement, if the remote contradicts the last local toggle.
    pub fn replace_with_remote(&mut self, remote: MarketSnapshot) -> Option<GateDisagreement> {
        let disagreement = remote
            .market
            .as_ref()
            .and_then(|m| self.gate.check_remote(m));

        let mut offers = remote.offers;
        for (id, offer) in offers.iter_mut() {
            if offer.history.is_empty() {
                if let Some(local) = self.offers.get(*id) {
                    offer.history = local.history.clone();
                }
            }
        }

        self.offers = OfferLedger::from_map(offers);
        self.transfers = TransferLedger::from_map(remote.transfers);
        if let Some(m) = remote.market {
            self.gate.replace(m);
        }

        disagreement
    }
}

fn validate_new_offer(new: &NewOffer) -> Result<(), NegotiationError> {
    if new.player_id.trim().is_empty() {
        return Err(NegotiationError::InvalidOffer("player_id is empty".to_string()));
    }
    if new.from_club.trim().is_empty() || new.to_club.trim().is_empty() {
        return Err(NegotiationError::InvalidOffer("club id is empty".to_string()));
    }
    if new.from_club == new.to_club {
        return Err(NegotiationError::InvalidOffer(format!(
            "club {} cannot bid for its own player",
            new.to_club
        )));
    }
    Ok(())
}
