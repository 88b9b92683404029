use quorum_types::{
    LedgerHeader, LedgerProof, QuorumCertificate, Vertex, VerifiedVertexStoreState,
    VertexStoreStateError,
};

/// Durable state a node restarts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredState {
    /// Last persisted vertex store snapshot.
    pub vertex_store: VerifiedVertexStoreState,
    /// Proof of the last committed ledger header.
    pub ledger_proof: LedgerProof,
}

impl RecoveredState {
    /// State of a node that has never run: genesis as the committed root.
    pub fn genesis(ledger_header: LedgerHeader) -> Result<Self, VertexStoreStateError> {
        let vertex = Vertex::genesis(ledger_header.clone());
        let qc = QuorumCertificate::of_genesis(&vertex, ledger_header.clone());
        Ok(Self {
            vertex_store: VerifiedVertexStoreState::genesis(vertex, qc)?,
            ledger_proof: LedgerProof::genesis(ledger_header),
        })
    }
}
