use quorum_bft::VertexStoreError;
use quorum_ledger::LedgerError;
use quorum_sync::SyncError;
use thiserror::Error;

/// Conditions after which the node's internal state can no longer be
/// trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("vertex store: {0}")]
    VertexStore(#[from] VertexStoreError),

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("sync: {0}")]
    Sync(#[from] SyncError),
}
