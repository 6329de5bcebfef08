//! `MarketEngine`, the service object handed to every collaborator.
//!
//! # Concurrency
//!
//! The composed state lives behind `RwLock<Arc<MarketBook>>`. Readers clone
//! the `Arc` and work on an immutable snapshot. Writers hold the `writes`
//! mutex, clone the current book, mutate the clone, and swap it in whole, so
//! a reader sees either the old or the new version and never a partial one.
//! Pushes and activity entries are emitted while the write mutex is held, so
//! their order matches mutation order.
//!
//! The `writes` mutex also guards the commit generation, bumped by every
//! install. A refresh only installs a pulled snapshot if no local commit
//! landed since it started pulling; otherwise it pulls again.
//!
//! # Remote
//!
//! Mutations never wait on the remote store. Their pushes go to a bounded
//! queue; failures there are logged and never reach the caller. `refresh`
//! pulls the whole remote snapshot and replaces the local one, or leaves it
//! untouched on failure.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};
use tm_audit::{ActionKind, ActivityEntry, ActivityFilter, ActivityLog};
use tm_config::MarketConfig;
use tm_gate::MarketGate;
use tm_negotiation::{MarketBook, NegotiationError, NewOffer, OfferChanges, OfferFilter, TransitionOutcome};
use tm_notify::{FileDismissalStore, NotificationTracker};
use tm_schemas::{now_micros, MarketSnapshot, MarketStatus, Offer, OfferStatus, Transfer};
use tm_sync::{pull_snapshot, OfferRow, PushConfig, PushOp, PushQueue, RemoteStore, RemoteSyncError, TransferRow};
use uuid::Uuid;

use crate::cache::LocalCache;
use crate::status::{RefreshOutcome, SyncStatus};

/// Pulls a refresh may spend racing local commits before it gives up.
pub const REFRESH_ATTEMPTS: usize = 3;

/// Remote sync wiring. Absent means sync is disabled.
pub struct SyncOptions {
    pub store: Arc<dyn RemoteStore>,
    pub push: PushConfig,
    pub timeout: Duration,
}

/// Everything `bootstrap` needs. Absent paths keep that concern in memory.
#[derive(Default)]
pub struct EngineOptions {
    pub cache_path: Option<PathBuf>,
    pub activity_log_path: Option<PathBuf>,
    pub dismissals_dir: Option<PathBuf>,
    pub hash_chain: bool,
    pub sync: Option<SyncOptions>,
}

impl EngineOptions {
    /// `store` is only used when `sync.enabled` is set.
    pub fn from_config(cfg: &MarketConfig, store: Option<Arc<dyn RemoteStore>>) -> Self {
        let sync = if cfg.sync.enabled {
            store.map(|store| SyncOptions {
                store,
                push: PushConfig {
                    capacity: cfg.sync.push_queue_capacity,
                    max_attempts: cfg.sync.push_max_attempts,
                    backoff: cfg.sync.push_backoff(),
                    timeout: cfg.sync.timeout(),
                },
                timeout: cfg.sync.timeout(),
            })
        } else {
            None
        };
        Self {
            cache_path: cfg.storage.cache_path.clone(),
            activity_log_path: cfg.storage.activity_log_path.clone(),
            dismissals_dir: cfg.storage.dismissals_dir.clone(),
            hash_chain: cfg.storage.hash_chain,
            sync,
        }
    }
}

struct RemoteLink {
    store: Arc<dyn RemoteStore>,
    push: PushQueue,
    timeout: Duration,
}

pub struct MarketEngine {
    book: RwLock<Arc<MarketBook>>,
    /// Commit generation.
    writes: Mutex<u64>,
    activity: ActivityLog,
    notifications: NotificationTracker,
    cache: Option<LocalCache>,
    remote: Option<RemoteLink>,
    sync_status: Mutex<SyncStatus>,
}

impl MarketEngine {
    /// Engine with no persistence and no remote. The market starts closed.
    pub fn in_memory() -> Self {
        Self::from_parts(
            MarketBook::new(MarketGate::closed(now_micros())),
            ActivityLog::in_memory(),
            NotificationTracker::in_memory(),
            None,
            None,
            SyncStatus::default(),
        )
    }

    fn from_parts(
        book: MarketBook,
        activity: ActivityLog,
        notifications: NotificationTracker,
        cache: Option<LocalCache>,
        remote: Option<RemoteLink>,
        sync_status: SyncStatus,
    ) -> Self {
        Self {
            book: RwLock::new(Arc::new(book)),
            writes: Mutex::new(0),
            activity,
            notifications,
            cache,
            remote,
            sync_status: Mutex::new(sync_status),
        }
    }

    /// Load the local cache, pull the remote (when sync is enabled), and boot
    /// the gate from whichever side has the later `updated_at`.
    ///
    /// A failed pull is not fatal: the engine starts from the local cache and
    /// the failure shows up in [`MarketEngine::sync_status`].
    pub async fn bootstrap(opts: EngineOptions) -> Result<Self> {
        let now = now_micros();

        let cache = opts.cache_path.as_ref().map(LocalCache::new).transpose()?;
        let local = match &cache {
            Some(c) => c.load()?,
            None => None,
        };
        let activity = match &opts.activity_log_path {
            Some(p) => ActivityLog::open(p, opts.hash_chain)?,
            None => ActivityLog::in_memory(),
        };
        let notifications = match &opts.dismissals_dir {
            Some(d) => NotificationTracker::new(Box::new(FileDismissalStore::new(d)?)),
            None => NotificationTracker::in_memory(),
        };

        let local_market = local.as_ref().and_then(|s| s.market);
        let mut book = MarketBook::from_snapshot(local.unwrap_or_default(), now);
        let mut status = SyncStatus::default();
        let mut remote_market: Option<MarketStatus> = None;

        let remote = match opts.sync {
            None => None,
            Some(sync) => {
                status.enabled = true;
                status.last_refresh_at = Some(now);
                match pull_snapshot(sync.store.as_ref(), sync.timeout).await {
                    Ok(snapshot) => {
                        remote_market = snapshot.market;
                        book.replace_with_remote(snapshot);
                        status.last_refresh_ok = Some(true);
                        tracing::info!(
                            offers = book.offers.len(),
                            transfers = book.transfers.len(),
                            "bootstrap pull complete"
                        );
                    }
                    Err(err) => {
                        status.last_refresh_ok = Some(false);
                        status.last_error = Some(err.to_string());
                        tracing::warn!(error = %err, "bootstrap pull failed; starting from local cache");
                    }
                }
                let push = PushQueue::spawn(Arc::clone(&sync.store), sync.push);
                Some(RemoteLink {
                    store: sync.store,
                    push,
                    timeout: sync.timeout,
                })
            }
        };

        let (gate, source) = MarketGate::boot(local_market, remote_market, now);
        book.gate = gate;
        tracing::info!(
            source = ?source,
            is_open = book.is_open(),
            offers = book.offers.len(),
            transfers = book.transfers.len(),
            sync_enabled = remote.is_some(),
            "market engine booted"
        );

        let engine = Self::from_parts(book, activity, notifications, cache, remote, status);
        engine.persist(&engine.snapshot());
        Ok(engine)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Current immutable version of the whole book.
    pub fn snapshot(&self) -> Arc<MarketBook> {
        Arc::clone(&self.book.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_open(&self) -> bool {
        self.snapshot().is_open()
    }

    pub fn market_status(&self) -> MarketStatus {
        self.snapshot().gate.status()
    }

    pub fn list_offers(&self, filter: &OfferFilter) -> Vec<Offer> {
        self.snapshot().offers.list(filter)
    }

    pub fn get_offer(&self, offer_id: Uuid) -> Option<Offer> {
        self.snapshot().offers.get(offer_id).cloned()
    }

    pub fn list_transfers(&self) -> Vec<Transfer> {
        self.snapshot().transfers.list()
    }

    pub fn get_transfer(&self, transfer_id: Uuid) -> Option<Transfer> {
        self.snapshot().transfers.get(transfer_id).cloned()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub fn create_offer(&self, new: NewOffer, actor_id: &str) -> Result<Offer, NegotiationError> {
        let mut w = self.lock_writes();
        let mut next = self.clone_book();
        let offer = next.create_offer(new, actor_id, now_micros())?;
        self.install(&mut w, next);

        self.push(PushOp::UpsertOffer(OfferRow::from_offer(&offer)));
        self.activity.append(
            actor_id,
            ActionKind::OfferCreated,
            json!({
                "offer_id": offer.id,
                "player_id": offer.player_id,
                "from_club": offer.from_club,
                "to_club": offer.to_club,
                "amount": offer.amount,
            }),
        );
        tracing::info!(offer_id = %offer.id, actor = %actor_id, amount = offer.amount, "offer created");
        Ok(offer)
    }

    pub fn transition_offer(
        &self,
        offer_id: Uuid,
        to: OfferStatus,
        changes: &OfferChanges,
        actor_id: &str,
    ) -> Result<TransitionOutcome, NegotiationError> {
        let mut w = self.lock_writes();
        let mut next = self.clone_book();
        let outcome = next.transition_offer(offer_id, to, changes, actor_id, now_micros())?;
        self.install(&mut w, next);

        self.push(PushOp::UpsertOffer(OfferRow::from_offer(&outcome.offer)));
        self.activity.append(
            actor_id,
            action_for(to),
            json!({
                "offer_id": offer_id,
                "from": outcome.previous,
                "to": to,
                "counter_amount": outcome.offer.counter_amount,
            }),
        );

        if let Some(t) = &outcome.transfer {
            self.push(PushOp::UpsertTransfer(TransferRow::from(t)));
            self.activity.append(
                actor_id,
                ActionKind::TransferCompleted,
                json!({
                    "transfer_id": t.id,
                    "offer_id": offer_id,
                    "player_id": t.player_id,
                    "from_club": t.from_club,
                    "to_club": t.to_club,
                    "fee": t.fee,
                }),
            );
            tracing::info!(offer_id = %offer_id, transfer_id = %t.id, fee = t.fee, "transfer materialized");
        }

        tracing::info!(
            offer_id = %offer_id,
            actor = %actor_id,
            from = %outcome.previous,
            to = %to,
            "offer transitioned"
        );
        Ok(outcome)
    }

    /// Administrative correction. Allowed whether the market is open or not.
    pub fn remove_transfer(&self, transfer_id: Uuid, actor_id: &str) -> Result<Transfer, NegotiationError> {
        let mut w = self.lock_writes();
        let mut next = self.clone_book();
        let removed = next.remove_transfer(transfer_id)?;
        self.install(&mut w, next);

        self.push(PushOp::DeleteTransfer(transfer_id));
        self.activity.append(
            actor_id,
            ActionKind::TransferRemoved,
            json!({ "transfer_id": transfer_id, "player_id": removed.player_id }),
        );
        tracing::info!(transfer_id = %transfer_id, actor = %actor_id, "transfer removed");
        Ok(removed)
    }

    /// Unconditional overwrite. Never consults the remote first.
    pub fn set_open(&self, open: bool, actor_id: &str) -> MarketStatus {
        let mut w = self.lock_writes();
        let mut next = self.clone_book();
        let previous = next.is_open();
        let status = next.set_open(open, actor_id, now_micros());
        self.install(&mut w, next);

        self.push(PushOp::UpsertMarketStatus(status.into()));
        let kind = if open {
            ActionKind::MarketOpened
        } else {
            ActionKind::MarketClosed
        };
        self.activity.append(
            actor_id,
            kind,
            json!({ "previous": previous, "is_open": open, "updated_at": status.updated_at }),
        );
        tracing::info!(actor = %actor_id, previous, is_open = open, "market toggled");
        status
    }

    // -----------------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------------

    pub fn sync_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Pull the remote snapshot and replace the local book wholesale.
    ///
    /// Outstanding pushes get up to one timeout to drain first, so this
    /// process's own recent writes are visible in the pull. A local commit
    /// that lands while the pull is in flight invalidates it and the pull is
    /// retried, up to [`REFRESH_ATTEMPTS`] times. On failure the local book
    /// and cache are left exactly as they were.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RemoteSyncError> {
        let link = self
            .remote
            .as_ref()
            .ok_or_else(|| RemoteSyncError::Unavailable("remote sync is disabled".to_string()))?;

        for attempt in 1..=REFRESH_ATTEMPTS {
            // Read under the lock: a mutation bumps the generation and
            // enqueues its push before releasing it.
            let generation = *self.lock_writes();

            if tokio::time::timeout(link.timeout, link.push.wait_idle()).await.is_err() {
                tracing::warn!(stats = ?link.push.stats(), "pushes still in flight at refresh");
            }

            let remote = match pull_snapshot(link.store.as_ref(), link.timeout).await {
                Ok(r) => r,
                Err(err) => {
                    self.record_refresh(now_micros(), Some(err.to_string()));
                    tracing::warn!(error = %err, "refresh failed; local cache preserved");
                    return Err(err);
                }
            };

            let mut w = self.lock_writes();
            if *w != generation {
                tracing::debug!(attempt, "local commit landed during pull; pulling again");
                continue;
            }
            return Ok(self.adopt_remote(&mut w, remote));
        }

        let err = RemoteSyncError::Contended(REFRESH_ATTEMPTS);
        self.record_refresh(now_micros(), Some(err.to_string()));
        tracing::warn!(error = %err, "refresh abandoned; local cache preserved");
        Err(err)
    }

    pub fn sync_status(&self) -> SyncStatus {
        let mut s = self
            .sync_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        s.push = self.remote.as_ref().map(|l| l.push.stats());
        s
    }

    /// Resolves when every push enqueued so far has settled. No-op without sync.
    pub async fn wait_for_pushes(&self) {
        if let Some(link) = &self.remote {
            link.push.wait_idle().await;
        }
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    pub fn mark_seen(&self, actor_id: &str, offer_id: Uuid) -> Result<bool> {
        self.notifications.mark_seen(actor_id, offer_id)
    }

    pub fn is_seen(&self, actor_id: &str, offer_id: Uuid) -> bool {
        self.notifications.is_seen(actor_id, offer_id)
    }

    pub fn clear_seen(&self, actor_id: &str) -> Result<()> {
        self.notifications.clear(actor_id)
    }

    pub fn compute_actionable(
        &self,
        actor_id: &str,
        offers_as_buyer: &[Offer],
        offers_as_seller: &[Offer],
    ) -> usize {
        self.notifications
            .compute_actionable(actor_id, offers_as_buyer, offers_as_seller)
    }

    /// Actionable count for `actor_id` acting on behalf of `club`.
    pub fn actionable_for_club(&self, actor_id: &str, club: &str) -> usize {
        let book = self.snapshot();
        let as_buyer = book.offers.list(&OfferFilter::buyer(club));
        let as_seller = book.offers.list(&OfferFilter::seller(club));
        self.compute_actionable(actor_id, &as_buyer, &as_seller)
    }

    // -----------------------------------------------------------------------
    // Activity
    // -----------------------------------------------------------------------

    pub fn append_activity(&self, actor_id: &str, kind: ActionKind, details: Value) -> ActivityEntry {
        self.activity.append(actor_id, kind, details)
    }

    pub fn list_activity(&self, filter: &ActivityFilter) -> Vec<ActivityEntry> {
        self.activity.list(filter)
    }

    pub fn clear_activity(&self) -> Result<()> {
        self.activity.clear()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn lock_writes(&self) -> MutexGuard<'_, u64> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Second half of `refresh`, under the write mutex.
    fn adopt_remote(&self, generation: &mut u64, remote: MarketSnapshot) -> RefreshOutcome {
        let refreshed_at = now_micros();
        let current = self.snapshot();
        let report = tm_reconcile::diff(&current.to_snapshot(), &remote);
        for offer_id in report.dropped_offers() {
            tracing::warn!(offer_id = %offer_id, "offer present locally but absent remotely; replaced away");
        }

        let mut next = (*current).clone();
        let gate_disagreement = next.replace_with_remote(remote);
        if let Some(d) = &gate_disagreement {
            tracing::warn!(
                local_is_open = d.local_is_open,
                remote_is_open = d.remote_is_open,
                toggled_by = %d.toggled_by,
                local_toggled_at = %d.local_toggled_at,
                remote_updated_at = %d.remote_updated_at,
                "market gate disagrees with remote after local toggle; possible missed update"
            );
        }
        let (offers, transfers) = (next.offers.len(), next.transfers.len());
        self.install(generation, next);
        self.record_refresh(refreshed_at, None);

        tracing::info!(
            offers,
            transfers,
            drift = report.diffs.len(),
            changed_offers = report.changed_offer_count(),
            "refresh complete"
        );
        RefreshOutcome {
            refreshed_at,
            report,
            gate_disagreement,
        }
    }

    fn clone_book(&self) -> MarketBook {
        (*self.snapshot()).clone()
    }

    /// Swap `next` in, bump the generation, and persist. `generation` is the
    /// caller's write-mutex guard.
    fn install(&self, generation: &mut u64, next: MarketBook) {
        *generation += 1;
        let next = Arc::new(next);
        *self.book.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
        self.persist(&next);
    }

    /// A cache write failure is logged; the in-memory book stays committed.
    fn persist(&self, book: &MarketBook) {
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.save(&book.to_snapshot()) {
                tracing::error!(path = ?cache.path(), error = %err, "market cache write failed");
            }
        }
    }

    fn push(&self, op: PushOp) {
        if let Some(link) = &self.remote {
            link.push.enqueue(op);
        }
    }

    fn record_refresh(&self, at: chrono::DateTime<chrono::Utc>, error: Option<String>) {
        let mut s = self.sync_status.lock().unwrap_or_else(PoisonError::into_inner);
        s.last_refresh_at = Some(at);
        s.last_refresh_ok = Some(error.is_none());
        s.last_error = error;
    }
}

fn action_for(to: OfferStatus) -> ActionKind {
    match to {
        OfferStatus::Accepted => ActionKind::OfferAccepted,
        OfferStatus::Rejected => ActionKind::OfferRejected,
        OfferStatus::CounterOffer => ActionKind::OfferCountered,
        // Not a legal transition target; listed for exhaustiveness.
        OfferStatus::Pending => ActionKind::OfferCreated,
    }
}
