use chrono::{TimeZone, Utc};
use tm_reconcile::*;
use tm_schemas::{MarketSnapshot, MarketStatus, Offer, OfferStatus, Transfer};
use uuid::Uuid;

fn offer(status: OfferStatus) -> Offer {
    Offer {
        id: Uuid::new_v4(),
        player_id: "p9".to_string(),
        player_name: "Nine".to_string(),
        from_club: "club-b".to_string(),
        to_club: "club-a".to_string(),
        amount: 10_000_000,
        status,
        counter_amount: None,
        counter_message: None,
        date: Utc.timestamp_opt(1_760_000_000, 0).unwrap(),
        actor_id: None,
        history: Vec::new(),
    }
}

#[test]
fn scenario_drift_report_is_deterministic() {
    let at = Utc.timestamp_opt(1_760_000_100, 0).unwrap();
    let a = offer(OfferStatus::Pending);
    let b = offer(OfferStatus::Pending);
    let mut b_remote = b.clone();
    b_remote.status = OfferStatus::Rejected;

    let t = Transfer {
        id: Transfer::id_for_offer(a.id),
        player_id: a.player_id.clone(),
        player_name: a.player_name.clone(),
        from_club: a.from_club.clone(),
        to_club: a.to_club.clone(),
        fee: a.amount,
        date: at,
    };

    let local = MarketSnapshot::from_parts([a.clone(), b], [], Some(MarketStatus::new(true, at)));
    let remote = MarketSnapshot::from_parts([b_remote], [t.clone()], Some(MarketStatus::new(true, at)));

    let r1 = diff(&local, &remote);
    let r2 = diff(&local, &remote);
    assert_eq!(r1, r2);

    assert!(!r1.is_clean());
    assert_eq!(r1.dropped_offers(), vec![a.id]);
    assert!(r1.diffs.contains(&SyncDiff::TransferAdded { transfer_id: t.id }));
    assert_eq!(r1.changed_offer_count(), 1);
    assert_eq!((r1.local_offers, r1.remote_offers), (2, 1));
    assert_eq!((r1.local_transfers, r1.remote_transfers), (0, 1));
}

#[test]
fn scenario_market_row_missing_remotely() {
    let at = Utc.timestamp_opt(1_760_000_100, 0).unwrap();
    let local = MarketSnapshot::from_parts([], [], Some(MarketStatus::new(false, at)));
    let remote = MarketSnapshot::empty();
    let r = diff(&local, &remote);
    assert_eq!(r.diffs.len(), 2, "is_open and updated_at both differ from none");
}
