//! Ledger implementation bridging consensus and the state computer.

use crate::accumulator::{accumulate_all, verify_and_get_extension};
use crate::{CommittedReader, LedgerError, Mempool, StateComputer};
use quorum_core::Ledger;
use quorum_types::{
    Command, CommandsAndProof, Hash, LedgerHeader, LedgerProof, LedgerUpdate, PreparedVertex, Vertex,
    VerifiedVertexStoreState,
};
use tracing::{debug, error, trace};

/// Commands committed through each path, and the resulting ledger version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounters {
    pub bft_commands_processed: u64,
    pub sync_commands_processed: u64,
    pub state_version: u64,
}

/// Ledger holding the committed proof and delegating execution to a
/// [`StateComputer`].
///
/// Prepare runs on behalf of the vertex store; commit runs either on
/// consensus commits or on verified batches from ledger sync. Both paths
/// go through the same accumulator check.
pub struct StateComputerLedger {
    current: LedgerProof,
    state_computer: Box<dyn StateComputer>,
    mempool: Box<dyn Mempool>,
    counters: LedgerCounters,
}

impl std::fmt::Debug for StateComputerLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateComputerLedger")
            .field("current", &self.current.ledger_header)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl StateComputerLedger {
    pub fn new(
        current: LedgerProof,
        state_computer: Box<dyn StateComputer>,
        mempool: Box<dyn Mempool>,
    ) -> Self {
        let counters = LedgerCounters {
            state_version: current.state_version(),
            ..LedgerCounters::default()
        };
        Self {
            current,
            state_computer,
            mempool,
            counters,
        }
    }

    /// Proof of the last committed ledger header.
    pub fn current_proof(&self) -> &LedgerProof {
        &self.current
    }

    pub fn current_header(&self) -> &LedgerHeader {
        &self.current.ledger_header
    }

    pub fn committed_reader(&self) -> &dyn CommittedReader {
        self.state_computer.committed_reader()
    }

    pub fn counters(&self) -> LedgerCounters {
        self.counters
    }

    pub fn mempool_mut(&mut self) -> &mut dyn Mempool {
        self.mempool.as_mut()
    }

    /// Pending commands for a new proposal on top of `prepared`.
    ///
    /// Commands already carried by a prepared ancestor are skipped.
    pub fn generate_next_commands(&self, prepared: &[PreparedVertex], count: usize) -> Vec<Command> {
        let in_flight: Vec<Command> = prepared
            .iter()
            .flat_map(|v| v.successful_commands().iter().cloned())
            .collect();
        self.mempool.get_commands(count, &in_flight)
    }

    /// Commit the vertices consensus has just committed.
    ///
    /// `proof` is the ledger proof of the last committed vertex and
    /// `vertex_store_state` the store snapshot rooted at it.
    pub fn commit_vertices(
        &mut self,
        committed: &[PreparedVertex],
        proof: LedgerProof,
        vertex_store_state: &VerifiedVertexStoreState,
    ) -> Result<Option<LedgerUpdate>, LedgerError> {
        let commands: Vec<Command> = committed
            .iter()
            .flat_map(|v| v.successful_commands().iter().cloned())
            .collect();
        self.commit(
            CommandsAndProof::new(commands, proof),
            Some(vertex_store_state),
        )
    }

    /// Commit a verified batch received through ledger sync.
    pub fn commit_synced(
        &mut self,
        commands_and_proof: CommandsAndProof,
    ) -> Result<Option<LedgerUpdate>, LedgerError> {
        self.commit(commands_and_proof, None)
    }

    fn commit(
        &mut self,
        commands_and_proof: CommandsAndProof,
        vertex_store_state: Option<&VerifiedVertexStoreState>,
    ) -> Result<Option<LedgerUpdate>, LedgerError> {
        let next = &commands_and_proof.proof;
        if (next.epoch(), next.state_version())
            <= (self.current.epoch(), self.current.state_version())
        {
            trace!(
                current = self.current.state_version(),
                proof = next.state_version(),
                "Ignoring stale commit"
            );
            return Ok(None);
        }

        let extension = verify_and_get_extension(
            self.current.accumulator_state(),
            &commands_and_proof.commands,
            Command::id,
            next.accumulator_state(),
        )
        .ok_or_else(|| {
            error!(
                current = ?self.current.ledger_header,
                proof = ?next.ledger_header,
                "Accumulator failure: committed commands do not extend the ledger"
            );
            LedgerError::InvalidExtension {
                current_version: self.current.state_version(),
                proof_version: next.state_version(),
            }
        })?;

        let verified = CommandsAndProof::new(extension.to_vec(), next.clone());
        let processed = verified.commands.len() as u64;
        if vertex_store_state.is_some() {
            self.counters.bft_commands_processed += processed;
        } else {
            self.counters.sync_commands_processed += processed;
        }

        self.state_computer.commit(&verified, vertex_store_state);
        self.mempool.remove_committed(&verified.commands);

        self.current = verified.proof.clone();
        self.counters.state_version = self.current.state_version();

        debug!(
            state_version = self.current.state_version(),
            view = %self.current.view(),
            commands = processed,
            "Ledger committed"
        );

        Ok(Some(LedgerUpdate {
            commands_and_proof: verified,
        }))
    }
}

impl Ledger for StateComputerLedger {
    fn prepare(&mut self, previous: &[PreparedVertex], vertex: &Vertex) -> Option<PreparedVertex> {
        let parent = vertex.parent_header();
        let parent_header = &parent.ledger_header;
        let parent_state = &parent_header.accumulator_state;

        // A genesis parent carries an unsigned QC.
        let timestamp_ms = if parent.view.is_genesis() {
            parent_header.timestamp_ms
        } else {
            vertex.qc.quorum_timestamp()
        };

        if self.current.state_version() > parent_state.state_version {
            trace!(
                vertex = ?vertex.id(),
                current = self.current.state_version(),
                parent = parent_state.state_version,
                "Parent is behind the committed ledger"
            );
            return None;
        }

        if parent_header.is_end_of_epoch() {
            let header = parent_header.with_view_and_timestamp(vertex.view, timestamp_ms);
            return Some(PreparedVertex::new(
                vertex.clone(),
                header,
                Vec::new(),
                Vec::new(),
            ));
        }

        let previous_commands: Vec<Command> = previous
            .iter()
            .flat_map(|v| v.successful_commands().iter().cloned())
            .collect();

        let Some(uncommitted) = verify_and_get_extension(
            self.current.accumulator_state(),
            &previous_commands,
            Command::id,
            parent_state,
        ) else {
            debug!(
                vertex = ?vertex.id(),
                "Prepared ancestors do not extend the committed ledger"
            );
            return None;
        };

        let result = self
            .state_computer
            .prepare(uncommitted, vertex, timestamp_ms);

        let successful_ids: Vec<Hash> = result.successful.iter().map(Command::id).collect();
        let accumulator_state = accumulate_all(parent_state, &successful_ids);

        let header = LedgerHeader {
            epoch: parent_header.epoch,
            view: vertex.view,
            accumulator_state,
            timestamp_ms,
            end_of_epoch: result.end_of_epoch,
        };

        Some(PreparedVertex::new(
            vertex.clone(),
            header,
            result.successful,
            result.failed,
        ))
    }
}
