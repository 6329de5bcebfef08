//! Typed view over the merged config JSON.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub push_queue_capacity: usize,
    pub push_max_attempts: u32,
    pub push_backoff_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 180,
            timeout_secs: 30,
            push_queue_capacity: 1024,
            push_max_attempts: 3,
            push_backoff_ms: 250,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn push_backoff(&self) -> Duration {
        Duration::from_millis(self.push_backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// NAME of the env var holding the Postgres URL. Never the URL itself.
    pub url_env: String,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url_env: "TM_DATABASE_URL".to_string(),
            max_connections: 5,
        }
    }
}

/// Local persistence. An absent path means that concern is in-memory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub cache_path: Option<PathBuf>,
    pub activity_log_path: Option<PathBuf>,
    pub dismissals_dir: Option<PathBuf>,
    pub hash_chain: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_path: None,
            activity_log_path: None,
            dismissals_dir: None,
            hash_chain: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub addr: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8899".to_string(),
        }
    }
}

impl DaemonConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.addr
            .parse()
            .with_context(|| format!("CONFIG_INVALID daemon.addr={:?}", self.addr))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub sync: SyncConfig,
    pub store: StoreConfig,
    pub storage: StorageConfig,
    pub daemon: DaemonConfig,
}

impl MarketConfig {
    /// Every key is optional; missing keys take their defaults.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: MarketConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: config does not match the market config shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.sync.interval_secs == 0 {
            bail!("CONFIG_INVALID sync.interval_secs must be > 0");
        }
        if self.sync.timeout_secs == 0 {
            bail!("CONFIG_INVALID sync.timeout_secs must be > 0");
        }
        if self.sync.push_queue_capacity == 0 {
            bail!("CONFIG_INVALID sync.push_queue_capacity must be > 0");
        }
        if self.sync.push_max_attempts == 0 {
            bail!("CONFIG_INVALID sync.push_max_attempts must be >= 1");
        }
        if self.store.url_env.trim().is_empty() {
            bail!("CONFIG_INVALID store.url_env must name an env var");
        }
        if self.store.max_connections == 0 {
            bail!("CONFIG_INVALID store.max_connections must be > 0");
        }
        self.daemon.socket_addr()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_takes_defaults() {
        let cfg = MarketConfig::from_json(&json!({})).unwrap();
        assert!(!cfg.sync.enabled);
        assert_eq!(cfg.sync.interval(), Duration::from_secs(180));
        assert_eq!(cfg.sync.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.store.url_env, "TM_DATABASE_URL");
        assert!(cfg.storage.hash_chain);
        assert!(cfg.storage.cache_path.is_none());
        assert_eq!(cfg.daemon.socket_addr().unwrap().port(), 8899);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = MarketConfig::from_json(&json!({
            "sync": { "enabled": true, "interval_secs": 60 }
        }))
        .unwrap();
        assert!(cfg.sync.enabled);
        assert_eq!(cfg.sync.interval_secs, 60);
        assert_eq!(cfg.sync.push_max_attempts, 3);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = MarketConfig::from_json(&json!({ "sync": { "interval_secs": 0 } })).unwrap_err();
        assert!(err.to_string().contains("sync.interval_secs"));
    }

    #[test]
    fn bad_addr_is_rejected() {
        let err = MarketConfig::from_json(&json!({ "daemon": { "addr": "nowhere" } })).unwrap_err();
        assert!(err.to_string().contains("daemon.addr"));
    }
}
