//! Per-actor dismissal persistence.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Offer ids one actor has acknowledged. Grows only, until an explicit clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DismissalRecord {
    pub actor_id: String,
    pub seen: BTreeSet<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DismissalRecord {
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            seen: BTreeSet::new(),
            updated_at: None,
        }
    }
}

/// Keyed persistent map actor → record. Records are never shared across actors.
pub trait DismissalStore: Send + Sync {
    fn load(&self, actor_id: &str) -> Result<Option<DismissalRecord>>;
    fn save(&self, record: &DismissalRecord) -> Result<()>;
    fn remove(&self, actor_id: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryDismissalStore {
    records: Mutex<HashMap<String, DismissalRecord>>,
}

impl MemoryDismissalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DismissalStore for MemoryDismissalStore {
    fn load(&self, actor_id: &str) -> Result<Option<DismissalRecord>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(actor_id).cloned())
    }

    fn save(&self, record: &DismissalRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.actor_id.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, actor_id: &str) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.remove(actor_id);
        Ok(())
    }
}

/// One JSON file per actor under `dir`. The file name is the hex-encoded
/// actor id, so arbitrary identities map to safe file names.
pub struct FileDismissalStore {
    dir: PathBuf,
}

impl FileDismissalStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("create_dir_all {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, actor_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(actor_id.as_bytes())))
    }
}

impl DismissalStore for FileDismissalStore {
    fn load(&self, actor_id: &str) -> Result<Option<DismissalRecord>> {
        let path = self.path_for(actor_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read dismissals {:?}", path))?;
        let record: DismissalRecord = serde_json::from_str(&raw)
            .with_context(|| format!("parse dismissals {:?}", path))?;
        Ok(Some(record))
    }

    fn save(&self, record: &DismissalRecord) -> Result<()> {
        let path = self.path_for(&record.actor_id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(record).context("serialize dismissals failed")?;
        fs::write(&tmp, body).with_context(|| format!("write {:?}", tmp))?;
        fs::rename(&tmp, &path).with_context(|| format!("rename {:?} -> {:?}", tmp, path))?;
        Ok(())
    }

    fn remove(&self, actor_id: &str) -> Result<()> {
        let path = self.path_for(actor_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove dismissals {:?}", path)),
        }
    }
}
