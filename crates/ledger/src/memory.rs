//! In-memory state computer and mempool.
//!
//! Used by the simulation and by tests. Commands are "executed" by recording
//! them; a command fails to prepare when its payload starts with the
//! configured rejection prefix.

use crate::{CommittedReader, Mempool, StateComputer, StateComputerResult};
use quorum_types::{
    Command, CommandsAndProof, Epoch, Hash, LedgerProof, Vertex, VerifiedVertexStoreState,
};
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;

/// Committed command log backed by a `Vec`, indexed by state version.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateComputer {
    /// State version before the first entry of `log`.
    base_version: u64,
    log: Vec<Command>,
    /// Committed proofs keyed by state version.
    proofs: BTreeMap<u64, LedgerProof>,
    epoch_proofs: BTreeMap<Epoch, LedgerProof>,
    last_vertex_store_state: Option<VerifiedVertexStoreState>,
    reject_prefix: Option<Vec<u8>>,
}

impl InMemoryStateComputer {
    /// Start with an empty log on top of `initial`.
    pub fn new(initial: &LedgerProof) -> Self {
        let mut proofs = BTreeMap::new();
        proofs.insert(initial.state_version(), initial.clone());
        Self {
            base_version: initial.state_version(),
            proofs,
            ..Self::default()
        }
    }

    /// Fail every command whose payload starts with `prefix`.
    pub fn with_rejected_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.reject_prefix = Some(prefix.into());
        self
    }

    /// Every committed command, in ledger order.
    pub fn committed_commands(&self) -> &[Command] {
        &self.log
    }

    /// Snapshot handed over with the last consensus commit.
    pub fn last_vertex_store_state(&self) -> Option<&VerifiedVertexStoreState> {
        self.last_vertex_store_state.as_ref()
    }

    fn rejects(&self, command: &Command) -> bool {
        self.reject_prefix
            .as_deref()
            .is_some_and(|prefix| command.payload().starts_with(prefix))
    }

    fn tail_version(&self) -> u64 {
        self.base_version + self.log.len() as u64
    }
}

impl StateComputer for InMemoryStateComputer {
    fn prepare(
        &mut self,
        previous: &[Command],
        vertex: &Vertex,
        _timestamp_ms: u64,
    ) -> StateComputerResult {
        let mut seen: HashSet<Hash> = previous.iter().map(Command::id).collect();
        let mut result = StateComputerResult::default();

        for command in &vertex.commands {
            if self.rejects(command) {
                result.failed.push((command.clone(), "rejected".to_string()));
            } else if !seen.insert(command.id()) {
                result.failed.push((command.clone(), "duplicate".to_string()));
            } else {
                result.successful.push(command.clone());
            }
        }
        result
    }

    fn commit(
        &mut self,
        commands_and_proof: &CommandsAndProof,
        vertex_store_state: Option<&VerifiedVertexStoreState>,
    ) {
        let proof = &commands_and_proof.proof;
        // Ledger sync may resume from a proof ahead of an empty log.
        if self.log.is_empty() && commands_and_proof.first_version() > self.base_version + 1 {
            self.base_version = commands_and_proof.first_version() - 1;
        }
        self.log.extend(commands_and_proof.commands.iter().cloned());
        debug_assert_eq!(self.tail_version(), proof.state_version());

        self.proofs.insert(proof.state_version(), proof.clone());
        self.epoch_proofs.insert(proof.epoch(), proof.clone());
        if let Some(state) = vertex_store_state {
            self.last_vertex_store_state = Some(state.clone());
        }
    }

    fn committed_reader(&self) -> &dyn CommittedReader {
        self
    }
}

impl CommittedReader for InMemoryStateComputer {
    fn get_next_committed_commands(
        &self,
        start_state_version: u64,
        batch_size: usize,
    ) -> Option<CommandsAndProof> {
        if start_state_version < self.base_version || batch_size == 0 {
            return None;
        }

        let after_start = (Bound::Excluded(start_state_version), Bound::Unbounded);
        let limit = start_state_version.saturating_add(batch_size as u64);

        // Largest proof within the batch, or the first one beyond it.
        let proof = self
            .proofs
            .range((Bound::Excluded(start_state_version), Bound::Included(limit)))
            .next_back()
            .or_else(|| self.proofs.range(after_start).next())
            .map(|(_, proof)| proof)?;

        let from = usize::try_from(start_state_version - self.base_version).ok()?;
        let to = usize::try_from(proof.state_version() - self.base_version).ok()?;
        let commands = self.log.get(from..to)?.to_vec();
        Some(CommandsAndProof::new(commands, proof.clone()))
    }

    fn get_epoch_proof(&self, epoch: Epoch) -> Option<LedgerProof> {
        self.epoch_proofs.get(&epoch).cloned()
    }

    fn last_proof(&self) -> Option<LedgerProof> {
        self.proofs.values().next_back().cloned()
    }
}

/// FIFO mempool keyed by command id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMempool {
    order: Vec<Hash>,
    pending: BTreeMap<Hash, Command>,
}

impl InMemoryMempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &Hash) -> bool {
        self.pending.contains_key(id)
    }
}

impl Mempool for InMemoryMempool {
    fn add(&mut self, command: Command) {
        let id = command.id();
        if self.pending.insert(id, command).is_none() {
            self.order.push(id);
        }
    }

    fn remove_committed(&mut self, committed: &[Command]) {
        for command in committed {
            self.pending.remove(&command.id());
        }
        let pending = &self.pending;
        self.order.retain(|id| pending.contains_key(id));
    }

    fn get_commands(&self, count: usize, exclude: &[Command]) -> Vec<Command> {
        let excluded: HashSet<Hash> = exclude.iter().map(Command::id).collect();
        self.order
            .iter()
            .filter(|id| !excluded.contains(id))
            .filter_map(|id| self.pending.get(id))
            .take(count)
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::accumulate_all;
    use quorum_types::{AccumulatorState, LedgerHeader, View};

    fn proof_after(head: &AccumulatorState, commands: &[Command], view: u64) -> LedgerProof {
        let ids: Vec<Hash> = commands.iter().map(Command::id).collect();
        let mut header = LedgerHeader::genesis(accumulate_all(head, &ids), 0);
        header.view = View(view);
        LedgerProof::genesis(header)
    }

    fn command(n: u8) -> Command {
        Command::new(vec![n])
    }

    #[test]
    fn test_reader_serves_batches_ending_on_proofs() {
        let genesis = LedgerProof::genesis(LedgerHeader::genesis(AccumulatorState::genesis(), 0));
        let mut computer = InMemoryStateComputer::new(&genesis);

        let first = vec![command(1), command(2)];
        let first_proof = proof_after(genesis.accumulator_state(), &first, 1);
        computer.commit(&CommandsAndProof::new(first.clone(), first_proof.clone()), None);

        let second = vec![command(3)];
        let second_proof = proof_after(first_proof.accumulator_state(), &second, 2);
        computer.commit(&CommandsAndProof::new(second, second_proof.clone()), None);

        let batch = computer.get_next_committed_commands(0, 2).unwrap();
        assert_eq!(batch.commands, first);
        assert_eq!(batch.proof, first_proof);

        let all = computer.get_next_committed_commands(0, 10).unwrap();
        assert_eq!(all.commands.len(), 3);
        assert_eq!(all.proof, second_proof);

        // Batch smaller than the next proof still returns a whole proof.
        let overshoot = computer.get_next_committed_commands(0, 1).unwrap();
        assert_eq!(overshoot.proof, first_proof);

        assert!(computer.get_next_committed_commands(3, 10).is_none());
        assert_eq!(computer.last_proof(), Some(second_proof));
    }

    #[test]
    fn test_prepare_rejects_prefix_and_duplicates() {
        let genesis = LedgerProof::genesis(LedgerHeader::genesis(AccumulatorState::genesis(), 0));
        let mut computer = InMemoryStateComputer::new(&genesis).with_rejected_prefix(b"bad");
        let mut vertex = quorum_types::Vertex::genesis(genesis.ledger_header.clone());
        vertex.commands = vec![Command::new(b"bad-1".to_vec()), command(7), command(8)];

        let result = computer.prepare(&[command(8)], &vertex, 0);
        assert_eq!(result.successful, vec![command(7)]);
        assert_eq!(result.failed.len(), 2);
        assert!(!result.end_of_epoch);
    }

    #[test]
    fn test_mempool_fifo_and_removal() {
        let mut mempool = InMemoryMempool::new();
        for n in 1..=4 {
            mempool.add(command(n));
        }
        mempool.add(command(1));
        assert_eq!(mempool.len(), 4);

        assert_eq!(
            mempool.get_commands(2, &[command(1)]),
            vec![command(2), command(3)]
        );

        mempool.remove_committed(&[command(2), command(3)]);
        assert_eq!(mempool.get_commands(10, &[]), vec![command(1), command(4)]);
        assert!(!mempool.contains(&command(2).id()));
    }
}
