//! Offer state machine.
//!
//! # State diagram
//!
//! ```text
//!              ┌──────────────► Accepted (term.)
//!              │
//!   create ─► Pending ────────► Rejected (term.)
//!              │                   ▲
//!              ▼                   │
//!         CounterOffer ────────────┘
//!           │    ▲  │
//!           └────┘  └─────────► Accepted (term.)
//!         (re-counter)
//! ```
//!
//! Every call to [`apply_transition`] is pure: it returns the next version of
//! the offer and never mutates its input, so a rejected transition leaves the
//! stored offer exactly as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tm_schemas::{Offer, OfferEvent, OfferStatus, Transfer};

use crate::NegotiationError;

/// Mutable fields a transition may carry. Only read for `→ counter-offer`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferChanges {
    pub counter_amount: Option<i64>,
    pub counter_message: Option<String>,
}

impl OfferChanges {
    pub fn counter(amount: i64, message: impl Into<String>) -> Self {
        Self {
            counter_amount: Some(amount),
            counter_message: Some(message.into()),
        }
    }
}

/// `true` iff `from → to` is an edge of the state machine.
pub fn is_legal(from: OfferStatus, to: OfferStatus) -> bool {
    use OfferStatus::*;

    matches!(
        (from, to),
        (Pending | CounterOffer, Accepted | Rejected | CounterOffer)
    )
}

pub fn check_transition(from: OfferStatus, to: OfferStatus) -> Result<(), NegotiationError> {
    if is_legal(from, to) {
        Ok(())
    } else {
        Err(NegotiationError::InvalidTransition { from, to })
    }
}

/// Fee a transfer would carry if `offer` were accepted right now.
///
/// Accepting a counter-offer accepts the counter terms.
pub fn agreed_fee(offer: &Offer) -> i64 {
    match (offer.status, offer.counter_amount) {
        (OfferStatus::CounterOffer, Some(counter)) => counter,
        _ => offer.amount,
    }
}

/// Compute the next version of `offer` for a move to `to`.
///
/// Does **not** consult the market gate; callers gate `→ accepted`.
pub fn apply_transition(
    offer: &Offer,
    to: OfferStatus,
    changes: &OfferChanges,
    actor_id: &str,
    now: DateTime<Utc>,
) -> Result<Offer, NegotiationError> {
    check_transition(offer.status, to)?;

    let mut next = offer.clone();

    if to == OfferStatus::CounterOffer {
        let counter = match changes.counter_amount {
            Some(v) if v >= 0 => v,
            other => {
                return Err(NegotiationError::InvalidAmount {
                    field: "counter_amount",
                    value: other,
                })
            }
        };
        // Last write wins on re-negotiation.
        next.counter_amount = Some(counter);
        next.counter_message = changes.counter_message.clone();
    } else {
        // Counter terms only live on a counter-offer; an accepted counter's
        // fee is carried by the Transfer.
        next.counter_amount = None;
        next.counter_message = None;
    }

    next.status = to;
    next.history.push(OfferEvent {
        at: now,
        from: Some(offer.status),
        to,
        actor_id: Some(actor_id.to_string()),
        counter_amount: next.counter_amount.filter(|_| to == OfferStatus::CounterOffer),
        counter_message: next
            .counter_message
            .clone()
            .filter(|_| to == OfferStatus::CounterOffer),
    });

    Ok(next)
}

/// The Transfer record for an offer being accepted. `offer` is the version
/// **before** acceptance so the counter terms are still visible.
pub fn transfer_for(offer: &Offer, now: DateTime<Utc>) -> Transfer {
    Transfer {
        id: Transfer::id_for_offer(offer.id),
        player_id: offer.player_id.clone(),
        player_name: offer.player_name.clone(),
        from_club: offer.from_club.clone(),
        to_club: offer.to_club.clone(),
        fee: agreed_fee(offer),
        date: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_schemas::now_micros;
    use uuid::Uuid;

    fn pending_offer() -> Offer {
        Offer {
            id: Uuid::new_v4(),
            player_id: "p-9".to_string(),
            player_name: "Nine".to_string(),
            from_club: "club-b".to_string(),
            to_club: "club-a".to_string(),
            amount: 10_000_000,
            status: OfferStatus::Pending,
            counter_amount: None,
            counter_message: None,
            date: now_micros(),
            actor_id: Some("buyer".to_string()),
            history: Vec::new(),
        }
    }

    #[test]
    fn edge_table_is_exact() {
        use OfferStatus::*;
        let all = [Pending, Accepted, Rejected, CounterOffer];
        let legal = [
            (Pending, Accepted),
            (Pending, Rejected),
            (Pending, CounterOffer),
            (CounterOffer, Accepted),
            (CounterOffer, Rejected),
            (CounterOffer, CounterOffer),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    is_legal(from, to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn input_offer_is_not_mutated() {
        let o = pending_offer();
        let next = apply_transition(
            &o,
            OfferStatus::CounterOffer,
            &OfferChanges::counter(15_000_000, "more"),
            "seller",
            now_micros(),
        )
        .unwrap();
        assert_eq!(o.status, OfferStatus::Pending);
        assert!(o.history.is_empty());
        assert_eq!(next.status, OfferStatus::CounterOffer);
        assert_eq!(next.counter_amount, Some(15_000_000));
        assert_eq!(next.history.len(), 1);
        assert_eq!(next.history[0].from, Some(OfferStatus::Pending));
    }

    #[test]
    fn counter_requires_non_negative_amount() {
        let o = pending_offer();
        let missing = apply_transition(
            &o,
            OfferStatus::CounterOffer,
            &OfferChanges::default(),
            "seller",
            now_micros(),
        )
        .unwrap_err();
        assert_eq!(
            missing,
            NegotiationError::InvalidAmount {
                field: "counter_amount",
                value: None
            }
        );

        let negative = apply_transition(
            &o,
            OfferStatus::CounterOffer,
            &OfferChanges::counter(-1, ""),
            "seller",
            now_micros(),
        )
        .unwrap_err();
        assert!(matches!(
            negative,
            NegotiationError::InvalidAmount { value: Some(-1), .. }
        ));
    }

    #[test]
    fn recounter_overwrites_terms() {
        let o = pending_offer();
        let c1 = apply_transition(
            &o,
            OfferStatus::CounterOffer,
            &OfferChanges::counter(15_000_000, "first"),
            "seller",
            now_micros(),
        )
        .unwrap();
        let c2 = apply_transition(
            &c1,
            OfferStatus::CounterOffer,
            &OfferChanges {
                counter_amount: Some(12_500_000),
                counter_message: None,
            },
            "buyer",
            now_micros(),
        )
        .unwrap();
        assert_eq!(c2.counter_amount, Some(12_500_000));
        assert_eq!(c2.counter_message, None);
        assert_eq!(c2.history.len(), 2);
    }

    #[test]
    fn terminal_states_reject_every_move() {
        let o = pending_offer();
        let rejected =
            apply_transition(&o, OfferStatus::Rejected, &OfferChanges::default(), "s", now_micros())
                .unwrap();
        for to in [
            OfferStatus::Pending,
            OfferStatus::Accepted,
            OfferStatus::Rejected,
            OfferStatus::CounterOffer,
        ] {
            let err = apply_transition(
                &rejected,
                to,
                &OfferChanges::counter(1, ""),
                "s",
                now_micros(),
            )
            .unwrap_err();
            assert_eq!(
                err,
                NegotiationError::InvalidTransition {
                    from: OfferStatus::Rejected,
                    to
                }
            );
        }
    }

    #[test]
    fn fee_follows_counter_terms() {
        let mut o = pending_offer();
        assert_eq!(agreed_fee(&o), 10_000_000);
        o.status = OfferStatus::CounterOffer;
        o.counter_amount = Some(15_000_000);
        assert_eq!(agreed_fee(&o), 15_000_000);

        let t = transfer_for(&o, now_micros());
        assert_eq!(t.fee, 15_000_000);
        assert_eq!(t.id, Transfer::id_for_offer(o.id));
        assert_eq!(t.from_club, "club-b");
        assert_eq!(t.to_club, "club-a");
    }
}
