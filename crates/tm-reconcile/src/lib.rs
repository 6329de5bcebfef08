//! tm-reconcile
//!
//! Local-vs-remote snapshot drift report, computed on every refresh before
//! the local cache is replaced.
//!
//! Deterministic, pure logic. No IO. No remote calls.

mod diff;
mod types;

pub use diff::diff;
pub use types::*;
