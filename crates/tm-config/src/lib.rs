//! tm-config
//!
//! Layered YAML → merged JSON → canonical JSON + SHA-256 `config_hash`.
//!
//! Guards applied at load time:
//! - secret-looking literal values abort with `CONFIG_SECRET_DETECTED`
//!   (YAML holds env var NAMES only; see [`resolve_store_credentials`]).
//!
//! Guards applied by the caller:
//! - [`report_unused_keys`] flags leaves nothing reads (`Warn` or `Fail`).

mod guard;
mod market;
mod secrets;

pub use guard::{report_unused_keys, UnusedKeyPolicy, UnusedKeyReport, CONSUMED_POINTERS};
pub use market::{DaemonConfig, MarketConfig, StorageConfig, StoreConfig, SyncConfig};
pub use secrets::{resolve_store_credentials, StoreCredentials};

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Merged config plus its canonical form and hash.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// SHA-256 hex of `canonical_json`.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect::<Result<Vec<String>>>()?;
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

/// Earlier docs are base, later docs override. Objects merge key by key;
/// any other value replaces what was there.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(serde_json::Map::new());
    for (i, raw) in yaml_docs.iter().enumerate() {
        let layer: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {i}"))?;
        let layer = serde_json::to_value(layer).context("yaml->json conversion failed")?;
        // An empty document parses as null: no overrides.
        if !layer.is_null() {
            merge_into(&mut merged, layer);
        }
    }

    guard::enforce_no_secret_literals(&merged)?;

    let canonical_json =
        serde_json::to_string(&sorted(&merged)).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Same value with every object's keys in sorted order.
fn sorted(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(keys.into_iter().map(|k| (k.clone(), sorted(&map[k]))).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn merge_into(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (k, v) in layer_map {
                merge_into(base_map.entry(k).or_insert(Value::Null), v);
            }
        }
        (slot, other) => *slot = other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_layers_are_ignored() {
        let a = load_layered_yaml_from_strings(&["sync:\n  enabled: true\n", ""]).unwrap();
        assert_eq!(a.config_json["sync"]["enabled"], true);
    }

    #[test]
    fn scalar_layer_replaces_object() {
        let a = load_layered_yaml_from_strings(&["sync:\n  enabled: true\n", "sync: off\n"]).unwrap();
        assert_eq!(a.config_json["sync"], "off");
    }
}
