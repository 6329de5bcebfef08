use std::path::Path;

use anyhow::{Context, Result};
use tm_engine::LocalCache;
use tm_schemas::{MarketSnapshot, MarketStatus};

/// `key=value` summary of a pulled snapshot.
pub fn snapshot_lines(prefix: &str, snap: &MarketSnapshot) -> Vec<String> {
    let mut out = vec![
        format!("{prefix}_offers={}", snap.offers.len()),
        format!("{prefix}_transfers={}", snap.transfers.len()),
    ];
    out.extend(market_lines(prefix, snap.market.as_ref()));
    out
}

pub fn market_lines(prefix: &str, market: Option<&MarketStatus>) -> Vec<String> {
    match market {
        Some(m) => vec![
            format!("{prefix}_market_is_open={}", m.is_open),
            format!("{prefix}_market_updated_at={}", m.updated_at.to_rfc3339()),
        ],
        None => vec![format!("{prefix}_market=none")],
    }
}

/// Drift of `cache_path` against `remote`, as pretty JSON.
pub fn drift_against_cache(cache_path: &Path, remote: &MarketSnapshot) -> Result<String> {
    let local = LocalCache::new(cache_path)?.load()?.unwrap_or_default();
    let report = tm_reconcile::diff(&local, remote);
    serde_json::to_string_pretty(&report).context("serialize drift report failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_schemas::now_micros;

    #[test]
    fn empty_snapshot_reports_no_market() {
        let lines = snapshot_lines("remote", &MarketSnapshot::empty());
        assert_eq!(
            lines,
            vec!["remote_offers=0", "remote_transfers=0", "remote_market=none"]
        );
    }

    #[test]
    fn missing_cache_diffs_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut remote = MarketSnapshot::empty();
        remote.market = Some(MarketStatus::new(true, now_micros()));
        let json = drift_against_cache(&dir.path().join("none.json"), &remote).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["remote_offers"], 0);
        assert_eq!(v["diffs"].as_array().unwrap().len(), 2);
    }
}
