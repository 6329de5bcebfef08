//! Pending -> counter-offer -> counter-offer -> accepted: the transfer fee is
//! the last counter amount, history records every step, and the remote ends
//! up with exactly one transfer row.

use std::sync::Arc;

use tm_audit::{ActionKind, ActivityFilter};
use tm_engine::MarketEngine;
use tm_negotiation::{NegotiationError, OfferChanges};
use tm_schemas::{OfferStatus, Transfer};
use tm_testkit::{actor, new_offer, synced_options, FlakyRemoteStore};

#[tokio::test]
async fn accepted_counter_sets_fee_and_materializes_once() {
    let store = Arc::new(FlakyRemoteStore::new());
    let engine = MarketEngine::bootstrap(synced_options(store.clone()))
        .await
        .unwrap();
    let (seller, buyer) = (actor(), actor());
    engine.set_open(true, &seller);

    let o = engine
        .create_offer(new_offer("p7", "ajax", "psv", 10_000_000), &buyer)
        .unwrap();
    engine
        .transition_offer(
            o.id,
            OfferStatus::CounterOffer,
            &OfferChanges::counter(18_000_000, "not enough"),
            &seller,
        )
        .unwrap();
    engine
        .transition_offer(
            o.id,
            OfferStatus::CounterOffer,
            &OfferChanges::counter(15_000_000, "final"),
            &buyer,
        )
        .unwrap();

    // A counter without an amount is refused and changes nothing.
    let err = engine
        .transition_offer(o.id, OfferStatus::CounterOffer, &OfferChanges::default(), &seller)
        .unwrap_err();
    assert!(matches!(err, NegotiationError::InvalidAmount { .. }));

    let out = engine
        .transition_offer(o.id, OfferStatus::Accepted, &OfferChanges::default(), &seller)
        .unwrap();
    let t = out.transfer.unwrap();
    assert_eq!(t.fee, 15_000_000);
    assert_eq!(t.id, Transfer::id_for_offer(o.id));
    assert_eq!((t.from_club.as_str(), t.to_club.as_str()), ("ajax", "psv"));

    let stored = engine.get_offer(o.id).unwrap();
    let steps: Vec<OfferStatus> = stored.history.iter().map(|e| e.to).collect();
    assert_eq!(
        steps,
        vec![
            OfferStatus::Pending,
            OfferStatus::CounterOffer,
            OfferStatus::CounterOffer,
            OfferStatus::Accepted,
        ]
    );

    let err = engine
        .transition_offer(o.id, OfferStatus::Accepted, &OfferChanges::default(), &seller)
        .unwrap_err();
    assert!(matches!(err, NegotiationError::InvalidTransition { .. }));

    engine.wait_for_pushes().await;
    assert_eq!(store.inner().transfer_count(), 1);
    assert_eq!(engine.list_transfers().len(), 1);

    let completed = engine.list_activity(&ActivityFilter {
        kind: Some(ActionKind::TransferCompleted),
        ..ActivityFilter::default()
    });
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].details["fee"], 15_000_000);
}
