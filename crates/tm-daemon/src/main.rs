//! tm-daemon entry point.
//!
//! Thin on purpose: loads config, resolves store credentials, boots the
//! engine, wires middleware, and starts the HTTP server. Route handlers live
//! in `routes.rs`; shared state types live in `state.rs`.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tm_config::{
    load_layered_yaml, report_unused_keys, resolve_store_credentials, MarketConfig,
    UnusedKeyPolicy,
};
use tm_daemon::{routes, state};
use tm_engine::{EngineOptions, MarketEngine};
use tm_sync::{PgRemoteStore, RemoteStore};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs)?;
    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "unused config keys");
    }
    let cfg = MarketConfig::from_json(&loaded.config_json)?;
    info!(config_hash = %loaded.config_hash, sync_enabled = cfg.sync.enabled, "config loaded");

    let creds = resolve_store_credentials(&cfg)?;
    let store: Option<Arc<dyn RemoteStore>> = match (&creds.database_url, cfg.sync.enabled) {
        (Some(url), true) => {
            let pg = PgRemoteStore::connect(url, cfg.store.max_connections)
                .await
                .with_context(|| format!("connect remote store ({})", creds.url_env))?;
            pg.migrate().await?;
            Some(Arc::new(pg))
        }
        _ => None,
    };

    let engine = Arc::new(MarketEngine::bootstrap(EngineOptions::from_config(&cfg, store)).await?);
    let shared = Arc::new(state::AppState::new(Arc::clone(&engine)));

    shared.spawn_heartbeat(Duration::from_secs(1));
    if engine.sync_enabled() {
        shared.spawn_refresh_tick(cfg.sync.interval());
    }

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = cfg.daemon.socket_addr()?;
    info!("tm-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    engine.wait_for_pushes().await;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `TM_CONFIG` is a comma-separated list of YAML layers, base first.
fn config_paths_from_env() -> Vec<String> {
    std::env::var("TM_CONFIG")
        .unwrap_or_else(|_| "config/base.yaml".to_string())
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler failed");
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
