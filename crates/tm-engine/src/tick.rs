use std::sync::Arc;
use std::time::Duration;

use tm_sync::RemoteSyncError;
use tokio::task::JoinHandle;

use crate::{MarketEngine, RefreshOutcome};

/// Periodic refresh loop.
///
/// The first tick is skipped because bootstrap has just pulled. Each result
/// is handed to `on_result`; a failure is already logged and recorded in the
/// engine's sync status, and the loop keeps going.
pub fn spawn_refresh_tick<F>(engine: Arc<MarketEngine>, interval: Duration, on_result: F) -> JoinHandle<()>
where
    F: Fn(&MarketEngine, &Result<RefreshOutcome, RemoteSyncError>) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let result = engine.refresh().await;
            on_result(&engine, &result);
        }
    })
}
