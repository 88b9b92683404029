//! Durable recovery snapshot of a vertex store.

use crate::{BftHeader, Hash, HighQc, LedgerProof, QuorumCertificate, TimeoutCertificate, Vertex};
use sbor::prelude::*;
use std::collections::HashSet;

/// Reasons a snapshot is rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VertexStoreStateError {
    #[error("highest committed QC does not commit any vertex")]
    NoCommittedHeader,

    #[error("root {root:?} does not match committed header {committed:?}")]
    RootMismatch { root: Hash, committed: Hash },

    #[error("vertex {vertex:?} is missing its parent {parent:?}")]
    MissingParent { vertex: Hash, parent: Hash },

    #[error("HighQC references unknown vertex {0:?}")]
    MissingHighQcVertex(Hash),
}

/// Root vertex, the pending chain above it, and the certificates that justify
/// them.
///
/// Construction validates every structural invariant, so a recovered store
/// can resume from a snapshot without a further validation pass.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct VerifiedVertexStoreState {
    high_qc: HighQc,
    root: Vertex,
    vertices: Vec<Vertex>,
    highest_tc: Option<TimeoutCertificate>,
}

impl VerifiedVertexStoreState {
    pub fn new(
        high_qc: HighQc,
        root: Vertex,
        vertices: Vec<Vertex>,
        highest_tc: Option<TimeoutCertificate>,
    ) -> Result<Self, VertexStoreStateError> {
        let committed = high_qc
            .highest_committed_qc()
            .committed()
            .ok_or(VertexStoreStateError::NoCommittedHeader)?;

        let root_id = root.id();
        if committed.vertex_id != root_id {
            return Err(VertexStoreStateError::RootMismatch {
                root: root_id,
                committed: committed.vertex_id,
            });
        }

        let mut seen: HashSet<Hash> = HashSet::from([root_id]);
        for vertex in &vertices {
            let id = vertex.id();
            if !seen.contains(&vertex.parent_id()) {
                return Err(VertexStoreStateError::MissingParent {
                    vertex: id,
                    parent: vertex.parent_id(),
                });
            }
            seen.insert(id);
        }

        let committed_qc = high_qc.highest_committed_qc();
        for referenced in [
            committed_qc.parent().vertex_id,
            committed_qc.proposed().vertex_id,
            high_qc.highest_qc().proposed().vertex_id,
        ] {
            if !seen.contains(&referenced) {
                return Err(VertexStoreStateError::MissingHighQcVertex(referenced));
            }
        }

        Ok(Self {
            high_qc,
            root,
            vertices,
            highest_tc,
        })
    }

    /// A fresh store state: genesis as root, certified by its own QC.
    pub fn genesis(
        genesis: Vertex,
        genesis_qc: QuorumCertificate,
    ) -> Result<Self, VertexStoreStateError> {
        Self::new(HighQc::from_committed(genesis_qc), genesis, Vec::new(), None)
    }

    pub fn high_qc(&self) -> &HighQc {
        &self.high_qc
    }

    pub fn root(&self) -> &Vertex {
        &self.root
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn highest_tc(&self) -> Option<&TimeoutCertificate> {
        self.highest_tc.as_ref()
    }

    /// Header of the committed root.
    pub fn root_header(&self) -> Option<BftHeader> {
        self.high_qc.highest_committed_qc().committed().cloned()
    }

    /// Ledger proof of the committed root.
    pub fn root_proof(&self) -> Option<LedgerProof> {
        self.high_qc
            .highest_committed_qc()
            .committed_and_ledger_proof()
            .map(|(_, proof)| proof)
    }
}
