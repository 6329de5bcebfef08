//! tm-engine
//!
//! Composes the negotiation book, market gate, activity log, notification
//! tracker, local cache and remote sync into one [`MarketEngine`].

mod cache;
mod engine;
mod status;
mod tick;

pub use cache::LocalCache;
pub use engine::{EngineOptions, MarketEngine, SyncOptions, REFRESH_ATTEMPTS};
pub use status::{RefreshOutcome, SyncStatus};
pub use tick::spawn_refresh_tick;
