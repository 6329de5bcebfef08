//! Market Gate
//!
//! # Invariants
//!
//! - **Boot picks the latest value**: the gate starts from whichever of the
//!   locally cached and the remote [`MarketStatus`] has the later
//!   `updated_at`. With neither present the market boots **closed**.
//!
//! - **Toggle is an unconditional overwrite**: [`MarketGate::set_open`]
//!   always succeeds and never consults the remote store first.
//!
//! - **Missed updates are reported, not prevented**: every toggle arms a
//!   one-shot check. On the next remote read, [`MarketGate::check_remote`]
//!   returns a [`GateDisagreement`] if the remote value differs from the
//!   value this process wrote, which means another actor moved the switch
//!   (or our push was lost).
//!
//! All logic is pure and deterministic. The caller supplies the clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tm_schemas::MarketStatus;

/// Which store the boot value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootSource {
    Local,
    Remote,
    Default,
}

/// Record of the last local toggle, pending verification against the remote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingToggle {
    pub previous: bool,
    pub written: bool,
    pub at: DateTime<Utc>,
    pub actor_id: String,
}

/// Evidence that the remote value disagrees with the last local toggle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDisagreement {
    pub local_is_open: bool,
    pub remote_is_open: bool,
    pub local_toggled_at: DateTime<Utc>,
    pub remote_updated_at: DateTime<Utc>,
    pub toggled_by: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketGate {
    status: MarketStatus,
    pending: Option<PendingToggle>,
}

impl MarketGate {
    /// Closed gate stamped at `now`.
    pub fn closed(now: DateTime<Utc>) -> Self {
        Self {
            status: MarketStatus::new(false, now),
            pending: None,
        }
    }

    pub fn from_status(status: MarketStatus) -> Self {
        Self {
            status,
            pending: None,
        }
    }

    /// Boot selection.
    ///
    /// | local      | remote     | result                          |
    /// |------------|------------|---------------------------------|
    /// | `None`     | `None`     | closed at `now` (`Default`)     |
    /// | `Some(l)`  | `None`     | `l` (`Local`)                   |
    /// | `None`     | `Some(r)`  | `r` (`Remote`)                  |
    /// | `Some(l)`  | `Some(r)`  | later `updated_at`; ties → remote |
    pub fn boot(
        local: Option<MarketStatus>,
        remote: Option<MarketStatus>,
        now: DateTime<Utc>,
    ) -> (Self, BootSource) {
        match (local, remote) {
            (None, None) => (Self::closed(now), BootSource::Default),
            (Some(l), None) => (Self::from_status(l), BootSource::Local),
            (None, Some(r)) => (Self::from_status(r), BootSource::Remote),
            (Some(l), Some(r)) => {
                if l.updated_at > r.updated_at {
                    (Self::from_status(l), BootSource::Local)
                } else {
                    (Self::from_status(r), BootSource::Remote)
                }
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open
    }

    pub fn status(&self) -> MarketStatus {
        self.status
    }

    pub fn pending_toggle(&self) -> Option<&PendingToggle> {
        self.pending.as_ref()
    }

    /// Overwrite the flag. Returns the new status.
    pub fn set_open(&mut self, open: bool, actor_id: &str, now: DateTime<Utc>) -> MarketStatus {
        let previous = self.status.is_open;
        self.status = MarketStatus::new(open, now);
        self.pending = Some(PendingToggle {
            previous,
            written: open,
            at: now,
            actor_id: actor_id.to_string(),
        });
        self.status
    }

    /// Compare a freshly pulled remote value with the last local toggle.
    ///
    /// Consumes the pending toggle; a second call without an intervening
    /// toggle always returns `None`.
    pub fn check_remote(&mut self, remote: &MarketStatus) -> Option<GateDisagreement> {
        let pending = self.pending.take()?;
        if remote.is_open == pending.written {
            return None;
        }
        Some(GateDisagreement {
            local_is_open: pending.written,
            remote_is_open: remote.is_open,
            local_toggled_at: pending.at,
            remote_updated_at: remote.updated_at,
            toggled_by: pending.actor_id,
        })
    }

    /// Replace the status wholesale (remote refresh). Clears any pending check.
    pub fn replace(&mut self, status: MarketStatus) {
        self.status = status;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn boot_with_nothing_is_closed() {
        let (g, src) = MarketGate::boot(None, None, t(0));
        assert!(!g.is_open());
        assert_eq!(src, BootSource::Default);
    }

    #[test]
    fn boot_prefers_later_value() {
        let local = MarketStatus::new(true, t(10));
        let remote = MarketStatus::new(false, t(5));
        let (g, src) = MarketGate::boot(Some(local), Some(remote), t(20));
        assert!(g.is_open());
        assert_eq!(src, BootSource::Local);

        let remote_newer = MarketStatus::new(false, t(30));
        let (g, src) = MarketGate::boot(Some(local), Some(remote_newer), t(40));
        assert!(!g.is_open());
        assert_eq!(src, BootSource::Remote);
    }

    #[test]
    fn boot_tie_goes_to_remote() {
        let local = MarketStatus::new(true, t(10));
        let remote = MarketStatus::new(false, t(10));
        let (g, src) = MarketGate::boot(Some(local), Some(remote), t(20));
        assert!(!g.is_open());
        assert_eq!(src, BootSource::Remote);
    }

    #[test]
    fn set_open_overwrites_and_stamps() {
        let mut g = MarketGate::closed(t(0));
        let st = g.set_open(true, "admin", t(1));
        assert!(st.is_open);
        assert_eq!(st.updated_at, t(1));
        // Same value again still succeeds.
        let st = g.set_open(true, "admin", t(2));
        assert!(st.is_open);
        assert_eq!(st.updated_at, t(2));
    }

    #[test]
    fn matching_remote_is_not_a_disagreement() {
        let mut g = MarketGate::closed(t(0));
        g.set_open(true, "admin", t(1));
        assert!(g.check_remote(&MarketStatus::new(true, t(1))).is_none());
        assert!(g.pending_toggle().is_none());
    }

    #[test]
    fn differing_remote_after_toggle_is_reported_once() {
        let mut g = MarketGate::closed(t(0));
        g.set_open(true, "admin-1", t(1));
        let remote = MarketStatus::new(false, t(1) + Duration::seconds(5));
        let d = g.check_remote(&remote).expect("disagreement expected");
        assert!(d.local_is_open);
        assert!(!d.remote_is_open);
        assert_eq!(d.toggled_by, "admin-1");
        assert!(g.check_remote(&remote).is_none(), "check is one-shot");
    }

    #[test]
    fn no_toggle_means_no_check() {
        let mut g = MarketGate::from_status(MarketStatus::new(true, t(0)));
        assert!(g.check_remote(&MarketStatus::new(false, t(9))).is_none());
    }
}
