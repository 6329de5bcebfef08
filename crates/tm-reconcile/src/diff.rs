use tm_schemas::{MarketSnapshot, MarketStatus, Offer, Transfer};
use uuid::Uuid;

use crate::{SyncDiff, SyncReport};

fn field(
    diffs: &mut Vec<SyncDiff>,
    offer_id: Uuid,
    name: &str,
    local: impl ToString,
    remote: impl ToString,
) {
    let (local, remote) = (local.to_string(), remote.to_string());
    if local != remote {
        diffs.push(SyncDiff::OfferChanged {
            offer_id,
            field: name.to_string(),
            local,
            remote,
        });
    }
}

fn opt<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map(|x| x.to_string()).unwrap_or_else(|| "none".to_string())
}

/// Replicated fields only; `history` is local and never compared.
fn compare_offers(local: &Offer, remote: &Offer, diffs: &mut Vec<SyncDiff>) {
    let id = local.id;
    field(diffs, id, "player_id", &local.player_id, &remote.player_id);
    field(diffs, id, "player_name", &local.player_name, &remote.player_name);
    field(diffs, id, "from_club", &local.from_club, &remote.from_club);
    field(diffs, id, "to_club", &local.to_club, &remote.to_club);
    field(diffs, id, "amount", local.amount, remote.amount);
    field(diffs, id, "status", local.status, remote.status);
    field(diffs, id, "counter_amount", opt(&local.counter_amount), opt(&remote.counter_amount));
    field(diffs, id, "counter_message", opt(&local.counter_message), opt(&remote.counter_message));
    field(diffs, id, "date", local.date.to_rfc3339(), remote.date.to_rfc3339());
    field(diffs, id, "actor_id", opt(&local.actor_id), opt(&remote.actor_id));
}

fn compare_transfers(local: &Transfer, remote: &Transfer, diffs: &mut Vec<SyncDiff>) {
    let pairs = [
        ("player_id", local.player_id.clone(), remote.player_id.clone()),
        ("player_name", local.player_name.clone(), remote.player_name.clone()),
        ("from_club", local.from_club.clone(), remote.from_club.clone()),
        ("to_club", local.to_club.clone(), remote.to_club.clone()),
        ("fee", local.fee.to_string(), remote.fee.to_string()),
        ("date", local.date.to_rfc3339(), remote.date.to_rfc3339()),
    ];
    for (name, l, r) in pairs {
        if l != r {
            diffs.push(SyncDiff::TransferChanged {
                transfer_id: local.id,
                field: name.to_string(),
                local: l,
                remote: r,
            });
        }
    }
}

fn compare_market(local: Option<MarketStatus>, remote: Option<MarketStatus>, diffs: &mut Vec<SyncDiff>) {
    let show_open = |m: Option<MarketStatus>| m.map(|m| m.is_open.to_string()).unwrap_or_else(|| "none".to_string());
    let show_at = |m: Option<MarketStatus>| m.map(|m| m.updated_at.to_rfc3339()).unwrap_or_else(|| "none".to_string());

    for (name, l, r) in [
        ("is_open", show_open(local), show_open(remote)),
        ("updated_at", show_at(local), show_at(remote)),
    ] {
        if l != r {
            diffs.push(SyncDiff::MarketChanged {
                field: name.to_string(),
                local: l,
                remote: r,
            });
        }
    }
}

/// Diff `local` against `remote`. Output order is deterministic.
pub fn diff(local: &MarketSnapshot, remote: &MarketSnapshot) -> SyncReport {
    let mut diffs = Vec::new();

    for (id, r) in &remote.offers {
        match local.offers.get(id) {
            Some(l) => compare_offers(l, r, &mut diffs),
            None => diffs.push(SyncDiff::OfferAdded { offer_id: *id }),
        }
    }
    for id in local.offers.keys() {
        if !remote.offers.contains_key(id) {
            diffs.push(SyncDiff::OfferDropped { offer_id: *id });
        }
    }

    for (id, r) in &remote.transfers {
        match local.transfers.get(id) {
            Some(l) => compare_transfers(l, r, &mut diffs),
            None => diffs.push(SyncDiff::TransferAdded { transfer_id: *id }),
        }
    }
    for id in local.transfers.keys() {
        if !remote.transfers.contains_key(id) {
            diffs.push(SyncDiff::TransferDropped { transfer_id: *id });
        }
    }

    compare_market(local.market, remote.market, &mut diffs);

    diffs.sort();

    SyncReport {
        local_offers: local.offers.len(),
        remote_offers: remote.offers.len(),
        local_transfers: local.transfers.len(),
        remote_transfers: remote.transfers.len(),
        diffs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tm_schemas::{OfferEvent, OfferStatus};

    fn offer() -> Offer {
        Offer {
            id: Uuid::new_v4(),
            player_id: "p1".to_string(),
            player_name: "P One".to_string(),
            from_club: "seller".to_string(),
            to_club: "buyer".to_string(),
            amount: 100,
            status: OfferStatus::Pending,
            counter_amount: None,
            counter_message: None,
            date: Utc.timestamp_opt(1_760_000_000, 0).unwrap(),
            actor_id: None,
            history: Vec::new(),
        }
    }

    #[test]
    fn identical_snapshots_are_clean() {
        let o = offer();
        let s = MarketSnapshot::from_parts([o], [], None);
        let r = diff(&s, &s.clone());
        assert!(r.is_clean());
        assert_eq!(r.local_offers, 1);
    }

    #[test]
    fn history_is_ignored() {
        let o = offer();
        let mut with_history = o.clone();
        with_history.history.push(OfferEvent {
            at: o.date,
            from: None,
            to: OfferStatus::Pending,
            actor_id: None,
            counter_amount: None,
            counter_message: None,
        });
        let local = MarketSnapshot::from_parts([with_history], [], None);
        let remote = MarketSnapshot::from_parts([o], [], None);
        assert!(diff(&local, &remote).is_clean());
    }

    #[test]
    fn field_changes_are_reported_per_field() {
        let o = offer();
        let mut changed = o.clone();
        changed.status = OfferStatus::CounterOffer;
        changed.counter_amount = Some(150);

        let r = diff(
            &MarketSnapshot::from_parts([o.clone()], [], None),
            &MarketSnapshot::from_parts([changed], [], None),
        );
        let fields: Vec<&str> = r
            .diffs
            .iter()
            .filter_map(|d| match d {
                SyncDiff::OfferChanged { field, .. } => Some(field.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(fields.len(), 2);
        assert!(fields.contains(&"status"));
        assert!(fields.contains(&"counter_amount"));
        assert_eq!(r.changed_offer_count(), 1);
    }

    #[test]
    fn added_and_dropped() {
        let only_local = offer();
        let only_remote = offer();
        let r = diff(
            &MarketSnapshot::from_parts([only_local.clone()], [], None),
            &MarketSnapshot::from_parts([only_remote.clone()], [], None),
        );
        assert!(r.diffs.contains(&SyncDiff::OfferAdded { offer_id: only_remote.id }));
        assert_eq!(r.dropped_offers(), vec![only_local.id]);
    }

    #[test]
    fn market_flip_is_reported() {
        let at = Utc.timestamp_opt(1_760_000_000, 0).unwrap();
        let r = diff(
            &MarketSnapshot::from_parts([], [], Some(MarketStatus::new(true, at))),
            &MarketSnapshot::from_parts([], [], Some(MarketStatus::new(false, at))),
        );
        assert_eq!(
            r.diffs,
            vec![SyncDiff::MarketChanged {
                field: "is_open".to_string(),
                local: "true".to_string(),
                remote: "false".to_string(),
            }]
        );
    }
}
