//! JSON Lines sink with an optional SHA-256 hash chain.
//!
//! One entry == one canonical JSON line (keys sorted recursively). With the
//! chain enabled each line carries `hash_prev` (previous line's `hash_self`)
//! and `hash_self` (hash of the line's canonical JSON without `hash_self`).

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::ActivityEntry;

pub struct JsonlSink {
    path: PathBuf,
    hash_chain: bool,
}

impl JsonlSink {
    /// Creates the sink and ensures parent dirs exist.
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }
        Ok(Self { path, hash_chain })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn hash_chain(&self) -> bool {
        self.hash_chain
    }

    /// Read back every entry already on disk (missing file == empty log).
    pub fn load(&self) -> Result<Vec<ActivityEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("read activity log {:?}", self.path))?;
        parse_lines(&content).map(|r| r.map(|(_, e)| e)).collect()
    }

    /// Seal `entry` into the chain (when enabled) and append it.
    pub fn append(&self, entry: &mut ActivityEntry, prev_hash: Option<String>) -> Result<()> {
        if self.hash_chain {
            entry.hash_prev = prev_hash;
            entry.hash_self = None;
            entry.hash_self = Some(compute_entry_hash(entry)?);
        }
        let line = canonical_json_line(entry)?;
        append_line(&self.path, &line)
    }

    /// Truncate the file. Used by administrative reset only.
    pub fn truncate(&self) -> Result<()> {
        fs::write(&self.path, b"").with_context(|| format!("truncate activity log {:?}", self.path))
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open activity log {:?}", path))?;
    writeln!(f, "{line}").with_context(|| format!("append to activity log {:?}", path))
}

/// Serialize with object keys ordered recursively.
pub(crate) fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize activity entry")?;
    Ok(ordered(&raw).to_string())
}

fn ordered(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.clone(), ordered(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(ordered).collect()),
        other => other.clone(),
    }
}

/// Hash of the canonical JSON of `entry` WITHOUT `hash_self`.
pub fn compute_entry_hash(entry: &ActivityEntry) -> Result<String> {
    let unsealed = ActivityEntry {
        hash_self: None,
        ..entry.clone()
    };
    let canonical = canonical_json_line(&unsealed)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Result of hash chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// The entire chain is valid.
    Valid { lines: usize },
    /// The chain is broken at the given (1-based) line.
    Broken { line: usize, reason: String },
}

/// Verify the hash chain of an activity log file.
pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read activity log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Same as [`verify_hash_chain`] on in-memory JSONL content.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut lines = 0usize;

    for parsed in parse_lines(content) {
        let (line, entry) = parsed?;
        lines += 1;

        if entry.hash_prev != prev_hash {
            let reason = format!(
                "hash_prev mismatch: expected {:?}, got {:?}",
                prev_hash, entry.hash_prev
            );
            return Ok(VerifyResult::Broken { line, reason });
        }
        if let Some(claimed) = &entry.hash_self {
            let recomputed = compute_entry_hash(&entry)?;
            if *claimed != recomputed {
                let reason = format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}");
                return Ok(VerifyResult::Broken { line, reason });
            }
        }
        prev_hash = entry.hash_self;
    }

    Ok(VerifyResult::Valid { lines })
}

/// Non-blank lines as `(1-based line number, entry)`.
fn parse_lines(content: &str) -> impl Iterator<Item = Result<(usize, ActivityEntry)>> + '_ {
    content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            serde_json::from_str::<ActivityEntry>(l.trim())
                .map(|e| (i + 1, e))
                .with_context(|| format!("parse activity entry at line {}", i + 1))
        })
}
