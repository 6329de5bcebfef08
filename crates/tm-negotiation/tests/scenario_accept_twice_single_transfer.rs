//! Scenario: accepting twice materializes exactly one Transfer.
//!
//! The second accept fails with `InvalidTransition` (the offer is terminal)
//! and neither the offer nor the Transfer Ledger changes.

use chrono::Utc;
use tm_gate::MarketGate;
use tm_negotiation::{MarketBook, NegotiationError, NewOffer, OfferChanges};
use tm_schemas::{MarketStatus, OfferStatus};

#[test]
fn second_accept_is_rejected_and_changes_nothing() {
    let mut book = MarketBook::new(MarketGate::from_status(MarketStatus::new(true, Utc::now())));
    let offer = book
        .create_offer(
            NewOffer {
                player_id: "p1".to_string(),
                player_name: "One".to_string(),
                from_club: "seller".to_string(),
                to_club: "buyer".to_string(),
                amount: 500,
            },
            "buyer-admin",
            Utc::now(),
        )
        .unwrap();

    book.transition_offer(
        offer.id,
        OfferStatus::Accepted,
        &OfferChanges::default(),
        "seller-admin",
        Utc::now(),
    )
    .unwrap();
    let before = book.clone();

    let err = book
        .transition_offer(
            offer.id,
            OfferStatus::Accepted,
            &OfferChanges::default(),
            "seller-admin",
            Utc::now(),
        )
        .unwrap_err();
    assert_eq!(
        err,
        NegotiationError::InvalidTransition {
            from: OfferStatus::Accepted,
            to: OfferStatus::Accepted
        }
    );
    assert_eq!(book, before);
    assert_eq!(book.transfers.len(), 1);
}

#[test]
fn rejected_offer_cannot_be_resurrected() {
    let mut book = MarketBook::new(MarketGate::from_status(MarketStatus::new(true, Utc::now())));
    let offer = book
        .create_offer(
            NewOffer {
                player_id: "p2".to_string(),
                player_name: "Two".to_string(),
                from_club: "seller".to_string(),
                to_club: "buyer".to_string(),
                amount: 1,
            },
            "buyer-admin",
            Utc::now(),
        )
        .unwrap();
    book.transition_offer(
        offer.id,
        OfferStatus::Rejected,
        &OfferChanges::default(),
        "seller-admin",
        Utc::now(),
    )
    .unwrap();

    let err = book
        .transition_offer(
            offer.id,
            OfferStatus::CounterOffer,
            &OfferChanges::counter(2, "again?"),
            "seller-admin",
            Utc::now(),
        )
        .unwrap_err();
    assert!(matches!(err, NegotiationError::InvalidTransition { .. }));
    assert_eq!(book.offers.get(offer.id).unwrap().status, OfferStatus::Rejected);
    assert!(book.transfers.is_empty());
}
