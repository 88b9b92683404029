//! Collaborator seams used by the state computer ledger.

use quorum_types::{
    Command, CommandsAndProof, Epoch, LedgerProof, Vertex, VerifiedVertexStoreState,
};

/// Outcome of speculatively executing a vertex's commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateComputerResult {
    /// Commands that executed and advance the ledger, in order.
    pub successful: Vec<Command>,
    /// Commands that were rejected, with the reason.
    pub failed: Vec<(Command, String)>,
    /// Executing this vertex closes the epoch.
    pub end_of_epoch: bool,
}

/// Executes commands against application state.
pub trait StateComputer: Send {
    /// Execute `vertex` on top of `previous`, the commands already prepared
    /// but not yet committed below it.
    fn prepare(
        &mut self,
        previous: &[Command],
        vertex: &Vertex,
        timestamp_ms: u64,
    ) -> StateComputerResult;

    /// Durably apply a committed, verified extension.
    ///
    /// `vertex_store_state` is the snapshot consensus held when the extension
    /// was committed, if the commit came from consensus rather than ledger
    /// sync.
    fn commit(
        &mut self,
        commands_and_proof: &CommandsAndProof,
        vertex_store_state: Option<&VerifiedVertexStoreState>,
    );

    /// Read access to the committed log, used to serve ledger sync.
    fn committed_reader(&self) -> &dyn CommittedReader;
}

/// Read access to committed commands.
pub trait CommittedReader {
    /// Committed commands starting right after `start_state_version`,
    /// together with the proof of their tail.
    ///
    /// Returns `None` when nothing after `start_state_version` is known or the
    /// log no longer reaches back that far.
    fn get_next_committed_commands(
        &self,
        start_state_version: u64,
        batch_size: usize,
    ) -> Option<CommandsAndProof>;

    /// Proof of the last header committed in `epoch`, if known.
    fn get_epoch_proof(&self, epoch: Epoch) -> Option<LedgerProof>;

    /// Proof of the last committed header.
    fn last_proof(&self) -> Option<LedgerProof>;
}

/// Pending command pool, notified of commands leaving it through commit.
pub trait Mempool: Send {
    fn add(&mut self, command: Command);

    /// Drop `committed` commands from the pool.
    fn remove_committed(&mut self, committed: &[Command]);

    /// Up to `count` pending commands, oldest first, skipping any in
    /// `exclude`.
    fn get_commands(&self, count: usize, exclude: &[Command]) -> Vec<Command>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
