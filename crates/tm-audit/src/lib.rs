//! tm-audit: Activity Recorder.
//!
//! Append-only log of market-affecting actions. Entries live in memory for
//! `list`; an optional JSONL sink makes them durable and tamper-evident.
//! A failing sink never drops an entry: the write error is logged and the
//! in-memory log keeps it.

mod sink;

pub use sink::{compute_entry_hash, verify_hash_chain, verify_hash_chain_str, JsonlSink, VerifyResult};

use std::fmt;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    MarketOpened,
    MarketClosed,
    OfferCreated,
    OfferCountered,
    OfferAccepted,
    OfferRejected,
    TransferCompleted,
    TransferRemoved,
    /// Free-form entry appended by a collaborator.
    Note,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::MarketOpened => "market_opened",
            ActionKind::MarketClosed => "market_closed",
            ActionKind::OfferCreated => "offer_created",
            ActionKind::OfferCountered => "offer_countered",
            ActionKind::OfferAccepted => "offer_accepted",
            ActionKind::OfferRejected => "offer_rejected",
            ActionKind::TransferCompleted => "transfer_completed",
            ActionKind::TransferRemoved => "transfer_removed",
            ActionKind::Note => "note",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let all = [
            ActionKind::MarketOpened,
            ActionKind::MarketClosed,
            ActionKind::OfferCreated,
            ActionKind::OfferCountered,
            ActionKind::OfferAccepted,
            ActionKind::OfferRejected,
            ActionKind::TransferCompleted,
            ActionKind::TransferRemoved,
            ActionKind::Note,
        ];
        all.into_iter().find(|k| k.as_str() == s.trim())
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub entry_id: Uuid,
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub actor_id: String,
    pub kind: ActionKind,
    pub details: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Read-side filter. `limit` keeps the most recent N matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub actor_id: Option<String>,
    pub kind: Option<ActionKind>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ActivityFilter {
    fn matches(&self, e: &ActivityEntry) -> bool {
        self.actor_id.as_ref().map_or(true, |a| &e.actor_id == a)
            && self.kind.map_or(true, |k| e.kind == k)
            && self.since.map_or(true, |s| e.ts_utc >= s)
    }
}

struct Inner {
    entries: Vec<ActivityEntry>,
    seq: u64,
    last_hash: Option<String>,
    sink: Option<JsonlSink>,
}

pub struct ActivityLog {
    inner: Mutex<Inner>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ActivityLog {
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                seq: 0,
                last_hash: None,
                sink: None,
            }),
        }
    }

    /// Open (or create) a durable log. Existing lines are loaded so listing
    /// and the hash chain resume where the previous process stopped.
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let sink = JsonlSink::new(path, hash_chain)?;
        let entries = sink.load()?;
        let seq = entries.last().map(|e| e.seq + 1).unwrap_or(0);
        let last_hash = entries.last().and_then(|e| e.hash_self.clone());
        Ok(Self {
            inner: Mutex::new(Inner {
                entries,
                seq,
                last_hash,
                sink: Some(sink),
            }),
        })
    }

    pub fn append(&self, actor_id: &str, kind: ActionKind, details: Value) -> ActivityEntry {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let ts_utc = Utc::now();
        let seq = inner.seq;
        inner.seq += 1;

        let mut entry = ActivityEntry {
            entry_id: Uuid::new_v4(),
            seq,
            ts_utc,
            actor_id: actor_id.to_string(),
            kind,
            details,
            hash_prev: None,
            hash_self: None,
        };

        if let Some(sink) = &inner.sink {
            match sink.append(&mut entry, inner.last_hash.clone()) {
                Ok(()) => {
                    if entry.hash_self.is_some() {
                        inner.last_hash = entry.hash_self.clone();
                    }
                }
                Err(err) => {
                    tracing::error!(
                        path = ?sink.path(),
                        kind = %kind,
                        error = %err,
                        "activity sink write failed; entry kept in memory only"
                    );
                    entry.hash_prev = None;
                    entry.hash_self = None;
                }
            }
        }

        inner.entries.push(entry.clone());
        entry
    }

    /// Matching entries in append order (oldest first).
    pub fn list(&self, filter: &ActivityFilter) -> Vec<ActivityEntry> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let matched: Vec<&ActivityEntry> =
            inner.entries.iter().filter(|e| filter.matches(e)).collect();
        let skip = filter
            .limit
            .map(|n| matched.len().saturating_sub(n))
            .unwrap_or(0);
        matched.into_iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Administrative / test reset. Truncates the sink and restarts the chain.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = &inner.sink {
            sink.truncate()?;
        }
        inner.entries.clear();
        inner.seq = 0;
        inner.last_hash = None;
        Ok(())
    }
}
