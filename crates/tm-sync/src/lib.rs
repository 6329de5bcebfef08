//! tm-sync: Reconciliation Sync plumbing.
//!
//! - [`RemoteStore`]: the authoritative store seam (Postgres or in-memory).
//! - [`PushQueue`]: bounded, non-blocking push-on-mutation with retries.
//! - [`pull_snapshot`]: timed, all-or-nothing pull for refresh.
//!
//! Nothing here touches local state. Deciding what a pulled snapshot means
//! for the local cache belongs to the engine.

mod error;
mod pg;
mod pull;
mod push;
mod rows;
mod store;

pub use error::RemoteSyncError;
pub use pg::PgRemoteStore;
pub use pull::pull_snapshot;
pub use push::{PushConfig, PushOp, PushQueue, PushStats};
pub use rows::{normalize_actor_id, MarketStatusRow, OfferRow, TransferRow, MARKET_STATUS_ROW_ID};
pub use store::{MemoryRemoteStore, RemoteStore};
