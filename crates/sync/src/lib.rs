//! Synchronization for the quorum ledger node.
//!
//! - [`BftSync`]: fetches missing vertices so the vertex store can reach a
//!   HighQC learned from a peer, and serves vertex requests
//! - [`LedgerSync`]: brings the committed ledger up to a quorum-proven
//!   header, and serves committed commands
//!
//! Both are synchronous and buffer their output as [`quorum_core::Action`]s.

mod bft_sync;
mod config;
mod counters;
mod error;
mod ledger_sync;
mod rate_limiter;

pub use bft_sync::{BftSync, SyncResult, SyncStage};
pub use config::SyncConfig;
pub use counters::{LedgerSyncCounters, SyncCounters};
pub use error::SyncError;
pub use ledger_sync::LedgerSync;
pub use rate_limiter::RequestRateLimiter;
