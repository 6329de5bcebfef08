//! Store credential resolution.
//!
//! # Contract
//! - Config YAML stores only the env var NAME (`store.url_env`).
//! - Callers resolve once at startup via [`resolve_store_credentials`] and
//!   pass the result into constructors.
//! - `Debug` redacts the value. Error messages name the variable, never the
//!   value.

use anyhow::{bail, Result};

use crate::MarketConfig;

#[derive(Clone)]
pub struct StoreCredentials {
    pub url_env: String,
    /// `None` if the named env var was absent or blank.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("url_env", &self.url_env)
            .field("database_url", &self.database_url.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl StoreCredentials {
    pub fn is_present(&self) -> bool {
        self.database_url.is_some()
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// With sync enabled a missing credential is an error; with sync disabled
/// the credential is optional.
pub fn resolve_store_credentials(config: &MarketConfig) -> Result<StoreCredentials> {
    let url_env = config.store.url_env.trim().to_string();
    let database_url = resolve_env(&url_env);

    if config.sync.enabled && database_url.is_none() {
        bail!(
            "SECRETS_MISSING sync.enabled=true: required env var '{}' \
             (remote store url) is not set or empty",
            url_env,
        );
    }

    Ok(StoreCredentials {
        url_env,
        database_url,
    })
}
