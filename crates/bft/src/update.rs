use quorum_types::{Hash, LedgerProof, PreparedVertex, VerifiedVertexStoreState};

/// Change to the vertex store, with the snapshot taken right after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VertexStoreUpdate {
    /// A vertex was prepared and attached to its parent.
    Inserted {
        vertex: PreparedVertex,
        /// Number of children of the parent, this vertex included.
        siblings: usize,
        state: VerifiedVertexStoreState,
    },

    /// A higher QC was recorded without committing anything.
    HighQcUpdated { state: VerifiedVertexStoreState },

    /// Vertices became committed and the DAG was pruned to the new root.
    Committed {
        /// Newly committed vertices, oldest first. The last is the new root.
        committed: Vec<PreparedVertex>,
        /// Ids of the vertices removed on abandoned forks.
        pruned: Vec<Hash>,
        /// Ledger proof of the new root.
        proof: LedgerProof,
        state: VerifiedVertexStoreState,
    },

    /// The DAG was replaced wholesale.
    Rebuilt { state: VerifiedVertexStoreState },
}

impl VertexStoreUpdate {
    /// Snapshot of the store after this update.
    pub fn state(&self) -> &VerifiedVertexStoreState {
        match self {
            VertexStoreUpdate::Inserted { state, .. }
            | VertexStoreUpdate::HighQcUpdated { state }
            | VertexStoreUpdate::Committed { state, .. }
            | VertexStoreUpdate::Rebuilt { state } => state,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            VertexStoreUpdate::Inserted { .. } => "Inserted",
            VertexStoreUpdate::HighQcUpdated { .. } => "HighQcUpdated",
            VertexStoreUpdate::Committed { .. } => "Committed",
            VertexStoreUpdate::Rebuilt { .. } => "Rebuilt",
        }
    }
}
