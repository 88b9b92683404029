use quorum_types::{Hash, VertexStoreStateError};
use thiserror::Error;

/// Errors raised by the vertex store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VertexStoreError {
    /// The caller must fetch the parent before inserting.
    #[error("parent {parent:?} of vertex {vertex:?} is not in the store")]
    MissingParent { vertex: Hash, parent: Hash },

    /// A QC committed a vertex this store never prepared.
    #[error("committed vertex {0:?} is not in the store")]
    MissingCommittedVertex(Hash),

    /// The store no longer forms a valid snapshot.
    #[error("store state is inconsistent: {0}")]
    InvalidState(#[from] VertexStoreStateError),
}
