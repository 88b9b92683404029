//! Ledger headers, proofs and ledger-level sync payloads.

use crate::{Command, Epoch, Hash, TimestampedSignature, ValidatorId, View};
use sbor::prelude::*;

/// Position in the committed command log.
///
/// `state_version` counts every command ever committed; `accumulator_hash` is
/// the head of the linear hash chain over those commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BasicSbor)]
pub struct AccumulatorState {
    pub state_version: u64,
    pub accumulator_hash: Hash,
}

impl AccumulatorState {
    pub fn new(state_version: u64, accumulator_hash: Hash) -> Self {
        Self {
            state_version,
            accumulator_hash,
        }
    }

    /// The state before any command has been committed.
    pub fn genesis() -> Self {
        Self::new(0, Hash::ZERO)
    }
}

/// Ledger state a vertex is prepared or committed against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, BasicSbor)]
pub struct LedgerHeader {
    pub epoch: Epoch,
    pub view: View,
    pub accumulator_state: AccumulatorState,
    pub timestamp_ms: u64,
    /// Once set, commands can no longer advance this branch of the ledger.
    pub end_of_epoch: bool,
}

impl LedgerHeader {
    pub fn genesis(accumulator_state: AccumulatorState, timestamp_ms: u64) -> Self {
        Self {
            epoch: Epoch(0),
            view: View::genesis(),
            accumulator_state,
            timestamp_ms,
            end_of_epoch: false,
        }
    }

    pub fn state_version(&self) -> u64 {
        self.accumulator_state.state_version
    }

    pub fn is_end_of_epoch(&self) -> bool {
        self.end_of_epoch
    }

    /// Same ledger position, moved to a later view.
    pub fn with_view_and_timestamp(&self, view: View, timestamp_ms: u64) -> Self {
        Self {
            view,
            timestamp_ms,
            ..self.clone()
        }
    }

    /// Ordering key used to index pending ledger syncs.
    pub fn sync_target(&self) -> LedgerSyncTarget {
        LedgerSyncTarget {
            epoch: self.epoch,
            state_version: self.state_version(),
        }
    }
}

/// Ledger position ordered by epoch, then state version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LedgerSyncTarget {
    pub epoch: Epoch,
    pub state_version: u64,
}

/// Quorum proof that a ledger header has been committed.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct LedgerProof {
    /// Hash of the vote data whose signatures form this proof.
    pub opaque: Hash,
    pub ledger_header: LedgerHeader,
    pub signatures: Vec<TimestampedSignature>,
}

impl LedgerProof {
    /// Proof of the genesis header. Carries no signatures.
    pub fn genesis(ledger_header: LedgerHeader) -> Self {
        Self {
            opaque: Hash::ZERO,
            ledger_header,
            signatures: Vec::new(),
        }
    }

    pub fn state_version(&self) -> u64 {
        self.ledger_header.state_version()
    }

    pub fn accumulator_state(&self) -> &AccumulatorState {
        &self.ledger_header.accumulator_state
    }

    pub fn view(&self) -> View {
        self.ledger_header.view
    }

    pub fn epoch(&self) -> Epoch {
        self.ledger_header.epoch
    }

    pub fn signers(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.signatures.iter().map(|s| s.signer)
    }

    /// Hash the proof's signers signed.
    pub fn signing_hash(&self) -> Hash {
        crate::ledger_signing_hash(&self.opaque, &self.ledger_header)
    }

    /// Signers of this proof other than `validator`.
    pub fn signers_without(&self, validator: ValidatorId) -> Vec<ValidatorId> {
        self.signers().filter(|s| *s != validator).collect()
    }
}

/// A run of committed commands together with the proof of its tail.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct CommandsAndProof {
    pub commands: Vec<Command>,
    pub proof: LedgerProof,
}

impl CommandsAndProof {
    pub fn new(commands: Vec<Command>, proof: LedgerProof) -> Self {
        Self { commands, proof }
    }

    /// The first state version covered by `commands`.
    pub fn first_version(&self) -> u64 {
        (self.proof.state_version() + 1).saturating_sub(self.commands.len() as u64)
    }
}

/// Emitted after the ledger durably applies a committed extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub commands_and_proof: CommandsAndProof,
}

impl LedgerUpdate {
    /// Proof of the new ledger tail.
    pub fn tail(&self) -> &LedgerProof {
        &self.commands_and_proof.proof
    }
}

/// Local request to bring the committed ledger up to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSyncRequest {
    pub target: LedgerProof,
    /// Peers known to hold the target (its proof signers, excluding self).
    pub target_nodes: Vec<ValidatorId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(epoch: u64, version: u64) -> LedgerHeader {
        LedgerHeader {
            epoch: Epoch(epoch),
            view: View(version),
            accumulator_state: AccumulatorState::new(version, Hash::from_bytes(&[version as u8])),
            timestamp_ms: 0,
            end_of_epoch: false,
        }
    }

    #[test]
    fn test_sync_target_orders_by_epoch_then_version() {
        let a = header(0, 10).sync_target();
        let b = header(0, 11).sync_target();
        let c = header(1, 2).sync_target();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_with_view_keeps_ledger_position() {
        let original = header(0, 4);
        let moved = original.with_view_and_timestamp(View(9), 1234);
        assert_eq!(moved.accumulator_state, original.accumulator_state);
        assert_eq!(moved.view, View(9));
        assert_eq!(moved.timestamp_ms, 1234);
    }

    #[test]
    fn test_first_version_of_batch() {
        let proof = LedgerProof::genesis(header(0, 5));
        let batch = CommandsAndProof::new(
            vec![Command::new(b"a".to_vec()), Command::new(b"b".to_vec())],
            proof,
        );
        assert_eq!(batch.first_version(), 4);
    }
}
