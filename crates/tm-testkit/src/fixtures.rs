use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tm_engine::{EngineOptions, SyncOptions};
use tm_negotiation::NewOffer;
use tm_sync::{PushConfig, RemoteStore};
use uuid::Uuid;

/// Push settings for tests: two quick attempts, short deadlines.
pub const FAST_PUSH: PushConfig = PushConfig {
    capacity: 64,
    max_attempts: 2,
    backoff: Duration::from_millis(1),
    timeout: Duration::from_millis(500),
};

/// `from_club` sells, `to_club` buys.
pub fn new_offer(player_id: &str, seller: &str, buyer: &str, amount: i64) -> NewOffer {
    NewOffer {
        player_id: player_id.to_string(),
        player_name: format!("Player {player_id}"),
        from_club: seller.to_string(),
        to_club: buyer.to_string(),
        amount,
    }
}

/// Fresh UUID-shaped actor id, so it survives the remote round-trip.
pub fn actor() -> String {
    Uuid::new_v4().to_string()
}

pub fn synced_options(store: Arc<dyn RemoteStore>) -> EngineOptions {
    EngineOptions {
        sync: Some(SyncOptions {
            store,
            push: FAST_PUSH,
            timeout: Duration::from_secs(2),
        }),
        ..EngineOptions::default()
    }
}

/// Every local concern file-backed under `dir`.
pub fn file_options(dir: &Path) -> EngineOptions {
    EngineOptions {
        cache_path: Some(dir.join("market.json")),
        activity_log_path: Some(dir.join("activity.jsonl")),
        dismissals_dir: Some(dir.join("dismissals")),
        hash_chain: true,
        sync: None,
    }
}
