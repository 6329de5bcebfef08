//! Test fixtures and a failure-injecting remote store for scenario tests.

mod fixtures;
mod flaky;

pub use fixtures::{actor, file_options, new_offer, synced_options, FAST_PUSH};
pub use flaky::FlakyRemoteStore;
