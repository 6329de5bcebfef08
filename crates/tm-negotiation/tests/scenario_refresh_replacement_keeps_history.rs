//! Scenario: wholesale replacement from a remote snapshot.
//!
//! Remote collections replace local ones; local-only history is carried over
//! for offers that survive; a remote market row replaces the gate and is
//! checked against the last local toggle.

use chrono::{Duration, Utc};
use tm_gate::MarketGate;
use tm_negotiation::{MarketBook, NewOffer};
use tm_schemas::{MarketSnapshot, MarketStatus};

#[test]
fn replace_keeps_history_and_drops_unknown_local_offers() {
    let mut book = MarketBook::new(MarketGate::from_status(MarketStatus::new(true, Utc::now())));
    let keep = book
        .create_offer(
            NewOffer {
                player_id: "keep".to_string(),
                player_name: "Keep".to_string(),
                from_club: "b".to_string(),
                to_club: "a".to_string(),
                amount: 1,
            },
            "a-admin",
            Utc::now(),
        )
        .unwrap();
    let lost = book
        .create_offer(
            NewOffer {
                player_id: "lost".to_string(),
                player_name: "Lost".to_string(),
                from_club: "b".to_string(),
                to_club: "a".to_string(),
                amount: 2,
            },
            "a-admin",
            Utc::now(),
        )
        .unwrap();

    let mut remote_copy = keep.clone();
    remote_copy.history.clear();
    let remote = MarketSnapshot::from_parts(
        vec![remote_copy],
        vec![],
        Some(MarketStatus::new(true, Utc::now())),
    );

    let disagreement = book.replace_with_remote(remote);
    assert!(disagreement.is_none());
    assert_eq!(book.offers.len(), 1);
    assert!(book.offers.get(lost.id).is_none());
    assert_eq!(book.offers.get(keep.id).unwrap().history, keep.history);
}

#[test]
fn remote_contradicting_last_toggle_is_reported() {
    let mut book = MarketBook::new(MarketGate::closed(Utc::now()));
    book.set_open(true, "admin-1", Utc::now());

    let remote = MarketSnapshot::from_parts(
        vec![],
        vec![],
        Some(MarketStatus::new(false, Utc::now() + Duration::seconds(1))),
    );
    let d = book.replace_with_remote(remote).expect("disagreement");
    assert!(d.local_is_open);
    assert!(!d.remote_is_open);
    assert!(!book.is_open(), "remote value wins");
}

#[test]
fn remote_without_market_row_keeps_local_gate() {
    let mut book = MarketBook::new(MarketGate::from_status(MarketStatus::new(true, Utc::now())));
    book.replace_with_remote(MarketSnapshot::empty());
    assert!(book.is_open());
}
