//! Per-node durable state in simulation.

use quorum_node::RecoveredState;
use quorum_types::{LedgerProof, VerifiedVertexStoreState};

/// What a simulated node has persisted.
///
/// Survives [`SimulationRunner::restart_node`]; everything else about the
/// node is lost on restart.
///
/// [`SimulationRunner::restart_node`]: crate::SimulationRunner::restart_node
#[derive(Debug, Clone)]
pub struct SimStorage {
    vertex_store: VerifiedVertexStoreState,
    ledger_proof: LedgerProof,
    snapshots_written: u64,
    commands_committed: u64,
}

impl SimStorage {
    pub fn new(initial: RecoveredState) -> Self {
        Self {
            vertex_store: initial.vertex_store,
            ledger_proof: initial.ledger_proof,
            snapshots_written: 0,
            commands_committed: 0,
        }
    }

    /// Replace the vertex store snapshot.
    pub fn persist_vertex_store(&mut self, state: VerifiedVertexStoreState) {
        self.vertex_store = state;
        self.snapshots_written += 1;
    }

    /// Record that the ledger committed up to `proof`.
    pub fn record_commit(&mut self, proof: LedgerProof, commands: usize) {
        if proof.state_version() >= self.ledger_proof.state_version() {
            self.ledger_proof = proof;
        }
        self.commands_committed += commands as u64;
    }

    pub fn vertex_store(&self) -> &VerifiedVertexStoreState {
        &self.vertex_store
    }

    pub fn ledger_proof(&self) -> &LedgerProof {
        &self.ledger_proof
    }

    pub fn snapshots_written(&self) -> u64 {
        self.snapshots_written
    }

    pub fn commands_committed(&self) -> u64 {
        self.commands_committed
    }

    /// State a restarted node recovers from.
    pub fn recovered_state(&self) -> RecoveredState {
        RecoveredState {
            vertex_store: self.vertex_store.clone(),
            ledger_proof: self.ledger_proof.clone(),
        }
    }
}
