//! Command handler modules for the `tm` CLI.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod audit;
pub mod sync;

use anyhow::{bail, Context, Result};
use tm_sync::PgRemoteStore;

/// Read the remote store URL from the env var NAMED `url_env`.
///
/// The error names the variable, never a value.
pub fn database_url(url_env: &str) -> Result<String> {
    match std::env::var(url_env) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("SECRETS_MISSING: env var '{}' (remote store url) is not set or empty", url_env),
    }
}

pub async fn connect_store(url_env: &str, max_connections: u32) -> Result<PgRemoteStore> {
    let url = database_url(url_env)?;
    PgRemoteStore::connect(&url, max_connections)
        .await
        .with_context(|| format!("connect remote store ({url_env})"))
}
