//! tm-notify: Notification Dedup Tracker.
//!
//! Only the `accepted` state is deduplicated. `pending` and `counter-offer`
//! stay actionable until the offer moves, so they always count.

mod store;

pub use store::{DismissalRecord, DismissalStore, FileDismissalStore, MemoryDismissalStore};

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use tm_schemas::{now_micros, Offer, OfferStatus};
use uuid::Uuid;

/// Actionable count over an already-loaded dismissal set.
///
/// Buyer side: `counter-offer`, or `accepted` and unseen.
/// Seller side: `pending`, or `accepted` and unseen.
pub fn actionable_count(
    seen: &BTreeSet<Uuid>,
    offers_as_buyer: &[Offer],
    offers_as_seller: &[Offer],
) -> usize {
    let unseen_accept = |o: &Offer| o.status == OfferStatus::Accepted && !seen.contains(&o.id);

    let buyer = offers_as_buyer
        .iter()
        .filter(|o| o.status == OfferStatus::CounterOffer || unseen_accept(o))
        .count();
    let seller = offers_as_seller
        .iter()
        .filter(|o| o.status == OfferStatus::Pending || unseen_accept(o))
        .count();
    buyer + seller
}

pub struct NotificationTracker {
    store: Box<dyn DismissalStore>,
    cache: Mutex<HashMap<String, DismissalRecord>>,
}

impl NotificationTracker {
    pub fn new(store: Box<dyn DismissalStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryDismissalStore::new()))
    }

    /// Add `offer_id` to the actor's set. Returns `true` if it was not
    /// already there. A second call is a no-op and writes nothing.
    pub fn mark_seen(&self, actor_id: &str, offer_id: Uuid) -> Result<bool> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let current = match cache.get(actor_id) {
            Some(r) => r.clone(),
            None => self
                .store
                .load(actor_id)?
                .unwrap_or_else(|| DismissalRecord::new(actor_id)),
        };

        if current.seen.contains(&offer_id) {
            cache.insert(actor_id.to_string(), current);
            return Ok(false);
        }

        let mut next = current;
        next.seen.insert(offer_id);
        next.updated_at = Some(now_micros());
        self.store.save(&next)?;
        cache.insert(actor_id.to_string(), next);
        Ok(true)
    }

    pub fn is_seen(&self, actor_id: &str, offer_id: Uuid) -> bool {
        self.with_seen(actor_id, |seen| seen.contains(&offer_id))
    }

    pub fn seen(&self, actor_id: &str) -> BTreeSet<Uuid> {
        self.with_seen(actor_id, |seen| seen.clone())
    }

    pub fn compute_actionable(
        &self,
        actor_id: &str,
        offers_as_buyer: &[Offer],
        offers_as_seller: &[Offer],
    ) -> usize {
        self.with_seen(actor_id, |seen| {
            actionable_count(seen, offers_as_buyer, offers_as_seller)
        })
    }

    /// Explicit actor reset. The only way entries leave a record.
    pub fn clear(&self, actor_id: &str) -> Result<()> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.remove(actor_id)?;
        cache.remove(actor_id);
        Ok(())
    }

    /// A store read failure is treated as an empty set (the actor may be
    /// re-notified) and is not cached.
    fn with_seen<T>(&self, actor_id: &str, f: impl FnOnce(&BTreeSet<Uuid>) -> T) -> T {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(r) = cache.get(actor_id) {
            return f(&r.seen);
        }
        match self.store.load(actor_id) {
            Ok(loaded) => {
                let record = loaded.unwrap_or_else(|| DismissalRecord::new(actor_id));
                let out = f(&record.seen);
                cache.insert(actor_id.to_string(), record);
                out
            }
            Err(err) => {
                tracing::warn!(actor = %actor_id, error = %err, "dismissal load failed; treating as none seen");
                f(&BTreeSet::new())
            }
        }
    }
}
