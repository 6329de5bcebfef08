//! Scenario: a closed market blocks creation and finalization.
//!
//! - `create_offer` fails with `MarketClosed` and the ledger size is unchanged.
//! - Accepting an open offer after the market closes fails with `MarketClosed`.
//! - Rejecting and countering remain possible.
//! - Administrative transfer removal is never gated.

use chrono::Utc;
use tm_gate::MarketGate;
use tm_negotiation::{MarketBook, NegotiationError, NewOffer, OfferChanges};
use tm_schemas::{MarketStatus, OfferStatus};

fn bid(amount: i64) -> NewOffer {
    NewOffer {
        player_id: "p".to_string(),
        player_name: "P".to_string(),
        from_club: "b".to_string(),
        to_club: "a".to_string(),
        amount,
    }
}

#[test]
fn create_fails_when_closed() {
    let mut book = MarketBook::new(MarketGate::closed(Utc::now()));
    let err = book.create_offer(bid(10), "a-admin", Utc::now()).unwrap_err();
    assert_eq!(err, NegotiationError::MarketClosed);
    assert!(book.offers.is_empty());
}

#[test]
fn closed_check_precedes_amount_check() {
    let mut book = MarketBook::new(MarketGate::closed(Utc::now()));
    let err = book.create_offer(bid(-5), "a-admin", Utc::now()).unwrap_err();
    assert_eq!(err, NegotiationError::MarketClosed);
}

#[test]
fn negative_amount_rejected_when_open() {
    let mut book = MarketBook::new(MarketGate::from_status(MarketStatus::new(true, Utc::now())));
    let err = book.create_offer(bid(-5), "a-admin", Utc::now()).unwrap_err();
    assert_eq!(
        err,
        NegotiationError::InvalidAmount {
            field: "amount",
            value: Some(-5)
        }
    );
    assert!(book.offers.is_empty());
}

#[test]
fn self_bid_is_invalid() {
    let mut book = MarketBook::new(MarketGate::from_status(MarketStatus::new(true, Utc::now())));
    let mut n = bid(5);
    n.to_club = n.from_club.clone();
    assert!(matches!(
        book.create_offer(n, "a-admin", Utc::now()),
        Err(NegotiationError::InvalidOffer(_))
    ));
}

#[test]
fn accept_gated_but_reject_and_counter_are_not() {
    let mut book = MarketBook::new(MarketGate::from_status(MarketStatus::new(true, Utc::now())));
    let o1 = book.create_offer(bid(10), "a-admin", Utc::now()).unwrap();
    let o2 = book.create_offer(bid(20), "a-admin", Utc::now()).unwrap();
    let o3 = book.create_offer(bid(30), "a-admin", Utc::now()).unwrap();
    book.set_open(false, "league", Utc::now());

    let err = book
        .transition_offer(o1.id, OfferStatus::Accepted, &OfferChanges::default(), "b-admin", Utc::now())
        .unwrap_err();
    assert_eq!(err, NegotiationError::MarketClosed);
    assert_eq!(book.offers.get(o1.id).unwrap().status, OfferStatus::Pending);
    assert!(book.transfers.is_empty());

    book.transition_offer(o2.id, OfferStatus::Rejected, &OfferChanges::default(), "b-admin", Utc::now())
        .unwrap();
    book.transition_offer(
        o3.id,
        OfferStatus::CounterOffer,
        &OfferChanges::counter(40, "closing soon"),
        "b-admin",
        Utc::now(),
    )
    .unwrap();
}

#[test]
fn transfer_removal_is_not_gated() {
    let mut book = MarketBook::new(MarketGate::from_status(MarketStatus::new(true, Utc::now())));
    let o = book.create_offer(bid(10), "a-admin", Utc::now()).unwrap();
    let out = book
        .transition_offer(o.id, OfferStatus::Accepted, &OfferChanges::default(), "b-admin", Utc::now())
        .unwrap();
    book.set_open(false, "league", Utc::now());

    let t = out.transfer.unwrap();
    let removed = book.remove_transfer(t.id).unwrap();
    assert_eq!(removed.id, t.id);
    assert!(book.transfers.is_empty());
}
