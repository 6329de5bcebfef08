use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tm_gate::GateDisagreement;
use tm_reconcile::SyncReport;
use tm_sync::PushStats;

/// The "could not sync" signal surfaced to collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub enabled: bool,
    pub last_refresh_at: Option<DateTime<Utc>>,
    /// `None` until the first refresh attempt.
    pub last_refresh_ok: Option<bool>,
    pub last_error: Option<String>,
    pub push: Option<PushStats>,
}

/// Returned by a successful [`crate::MarketEngine::refresh`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub refreshed_at: DateTime<Utc>,
    /// Local-vs-remote drift observed just before the replacement.
    pub report: SyncReport,
    /// Set when the remote market flag contradicts the last local toggle.
    pub gate_disagreement: Option<GateDisagreement>,
}
