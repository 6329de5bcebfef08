//! Local durable cache of the whole market snapshot.
//!
//! One JSON document, rewritten via temp file + rename so a crash mid-write
//! leaves the previous version intact. Unlike the remote store the cache
//! keeps each offer's local `history`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tm_schemas::MarketSnapshot;

#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no cache has been written yet.
    pub fn load(&self) -> Result<Option<MarketSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read market cache {:?}", self.path))?;
        let snap: MarketSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parse market cache {:?}", self.path))?;
        Ok(Some(snap))
    }

    pub fn save(&self, snapshot: &MarketSnapshot) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(snapshot).context("serialize market cache failed")?;
        fs::write(&tmp, body).with_context(|| format!("write {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {:?} -> {:?}", tmp, self.path))?;
        Ok(())
    }
}
