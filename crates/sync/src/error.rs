use quorum_bft::VertexStoreError;
use quorum_types::Hash;
use thiserror::Error;

/// Errors that abort vertex synchronization.
///
/// Expected outcomes (stale targets, unknown vertices, slow peers) are not
/// errors; see [`SyncResult`](crate::SyncResult).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("sync to {0:?} required but no author was provided")]
    MissingAuthor(Hash),

    #[error("no peer other than self to retry sync to {0:?}")]
    NoPeers(Hash),

    #[error(transparent)]
    Store(#[from] VertexStoreError),
}
