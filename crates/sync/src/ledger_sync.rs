//! Committed ledger synchronization.
//!
//! Fetches committed commands from peers in proven batches until the local
//! ledger reaches the target of the latest [`LocalSyncRequest`]. One request
//! is outstanding at a time. A batch must carry a proof signed by a quorum
//! of the validator set, must not pass the sync target, and must extend the
//! ledger's accumulator before it reaches the ledger. A peer serving a bogus
//! batch is retried rather than allowed to fail the commit.

use crate::{LedgerSyncCounters, SyncConfig};
use quorum_core::{Action, OutboundMessage, TimerId};
use quorum_ledger::{accumulator, CommittedReader, LedgerError, StateComputerLedger};
use quorum_messages::{CommittedCommandsRequest, CommittedCommandsResponse};
use quorum_types::{
    Command, CommandsAndProof, LedgerProof, LedgerUpdate, LocalSyncRequest, ValidatorId,
    ValidatorSet,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Outstanding {
    peer: ValidatorId,
    start_state_version: u64,
}

/// Ledger catch-up for one replica.
#[derive(Debug)]
pub struct LedgerSync {
    local: ValidatorId,
    config: SyncConfig,
    validators: ValidatorSet,
    target: Option<LocalSyncRequest>,
    outstanding: Option<Outstanding>,
    /// Peer that most recently timed out or served an invalid batch.
    last_failed: Option<ValidatorId>,
    rng: ChaCha8Rng,
    counters: LedgerSyncCounters,
    outbox: Vec<Action>,
}

impl LedgerSync {
    pub fn new(
        local: ValidatorId,
        config: SyncConfig,
        validators: ValidatorSet,
        seed: u64,
    ) -> Self {
        Self {
            local,
            config,
            validators,
            target: None,
            outstanding: None,
            last_failed: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            counters: LedgerSyncCounters::default(),
            outbox: Vec::new(),
        }
    }

    pub fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.outbox)
    }

    pub fn counters(&self) -> LedgerSyncCounters {
        self.counters
    }

    /// Proof the ledger is being synced to, if any.
    pub fn target(&self) -> Option<&LedgerProof> {
        self.target.as_ref().map(|t| &t.target)
    }

    pub fn is_syncing(&self) -> bool {
        self.target.is_some()
    }

    /// Start or extend a catch-up.
    ///
    /// A request at or below `current` is ignored. The higher of the pending
    /// and the new target wins.
    pub fn on_local_sync_request(&mut self, current: &LedgerProof, request: LocalSyncRequest) {
        if covers(current, &request.target) {
            trace!(
                target_version = request.target.state_version(),
                current_version = current.state_version(),
                "Ledger already at sync target"
            );
            return;
        }

        let higher = self.target.as_ref().map_or(true, |pending| {
            request.target.ledger_header.sync_target()
                > pending.target.ledger_header.sync_target()
        });
        if higher {
            info!(
                target_version = request.target.state_version(),
                current_version = current.state_version(),
                peers = request.target_nodes.len(),
                "Ledger sync target"
            );
            self.target = Some(request);
        }

        if self.outstanding.is_none() {
            self.request_next(current);
        }
    }

    /// Apply a batch from `from` to `ledger`.
    ///
    /// Responses from anyone but the peer currently asked are ignored.
    pub fn on_response(
        &mut self,
        ledger: &mut StateComputerLedger,
        from: ValidatorId,
        response: CommittedCommandsResponse,
    ) -> Result<Option<LedgerUpdate>, LedgerError> {
        let Some(outstanding) = self.outstanding else {
            trace!(from = %from, "Unsolicited committed commands");
            return Ok(None);
        };
        if outstanding.peer != from {
            trace!(
                from = %from,
                expected = %outstanding.peer,
                "Committed commands from unexpected peer"
            );
            return Ok(None);
        }
        self.outstanding = None;
        self.outbox.push(Action::CancelTimer {
            id: TimerId::LedgerSync,
        });

        let batch = response.commands_and_proof;
        let current = ledger.current_proof().clone();
        if let Some(fault) = self.batch_fault(&current, &batch) {
            warn!(
                from = %from,
                fault,
                current_version = current.state_version(),
                proof_version = batch.proof.state_version(),
                commands = batch.commands.len(),
                "Invalid committed commands batch"
            );
            self.counters.invalid_batches += 1;
            self.last_failed = Some(from);
            self.request_next(&current);
            return Ok(None);
        }

        let update = ledger.commit_synced(batch)?;
        if let Some(update) = &update {
            self.counters.batches_applied += 1;
            self.counters.commands_applied += update.commands_and_proof.commands.len() as u64;
            debug!(
                from = %from,
                state_version = update.tail().state_version(),
                "Applied committed commands"
            );
        }
        self.last_failed = None;
        self.request_next(ledger.current_proof());
        Ok(update)
    }

    /// Why `batch` cannot be committed on top of `current`, if it cannot.
    fn batch_fault(
        &self,
        current: &LedgerProof,
        batch: &CommandsAndProof,
    ) -> Option<&'static str> {
        let proof = &batch.proof;
        if proof.ledger_header.sync_target() <= current.ledger_header.sync_target() {
            return Some("does not advance the ledger");
        }
        if let Some(target) = self.target() {
            if proof.ledger_header.sync_target() > target.ledger_header.sync_target() {
                return Some("passes the sync target");
            }
            if proof.state_version() == target.state_version()
                && proof.accumulator_state() != target.accumulator_state()
            {
                return Some("diverges from the sync target");
            }
        }
        if let Err(e) = self.validators.verify_ledger_proof(proof) {
            debug!(error = %e, "Committed commands proof rejected");
            return Some("proof is not signed by a quorum");
        }
        let extends = accumulator::verify_and_get_extension(
            current.accumulator_state(),
            &batch.commands,
            Command::id,
            proof.accumulator_state(),
        )
        .is_some();
        (!extends).then_some("does not extend the ledger")
    }

    /// The outstanding request ran out of patience.
    pub fn on_timeout(&mut self, current: &LedgerProof) {
        let Some(outstanding) = self.outstanding.take() else {
            return;
        };
        warn!(
            peer = %outstanding.peer,
            start_state_version = outstanding.start_state_version,
            "Ledger sync request timed out"
        );
        self.counters.timeouts += 1;
        self.last_failed = Some(outstanding.peer);
        self.request_next(current);
    }

    /// Forget a target the ledger reached by other means.
    pub fn on_ledger_update(&mut self, update: &LedgerUpdate) {
        let reached = self
            .target
            .as_ref()
            .is_some_and(|t| covers(update.tail(), &t.target));
        if reached && self.outstanding.is_none() {
            debug!(state_version = update.tail().state_version(), "Ledger sync target reached");
            self.target = None;
        }
    }

    fn request_next(&mut self, current: &LedgerProof) {
        let Some(target) = &self.target else {
            return;
        };
        if covers(current, &target.target) {
            info!(state_version = current.state_version(), "Ledger sync complete");
            self.target = None;
            return;
        }

        let peers: Vec<ValidatorId> = target
            .target_nodes
            .iter()
            .copied()
            .filter(|p| *p != self.local)
            .collect();
        let preferred: Vec<ValidatorId> = peers
            .iter()
            .copied()
            .filter(|p| Some(*p) != self.last_failed)
            .collect();
        let pool = if preferred.is_empty() { peers } else { preferred };

        if pool.is_empty() {
            warn!(
                target_version = target.target.state_version(),
                "No peer to sync the ledger from"
            );
            self.target = None;
            return;
        }

        let peer = pool[self.rng.gen_range(0..pool.len())];
        let remaining = target
            .target
            .state_version()
            .saturating_sub(current.state_version());
        let batch_size = remaining.clamp(1, u64::from(self.config.ledger_sync_batch_size)) as u32;
        let request = CommittedCommandsRequest {
            start_state_version: current.state_version(),
            batch_size,
        };

        trace!(
            peer = %peer,
            start = request.start_state_version,
            batch_size,
            "Requesting committed commands"
        );
        self.outstanding = Some(Outstanding {
            peer,
            start_state_version: request.start_state_version,
        });
        self.counters.requests_sent += 1;
        self.outbox.push(Action::SendMessage {
            to: peer,
            message: OutboundMessage::CommittedCommandsRequest(request),
        });
        self.outbox.push(Action::SetTimer {
            id: TimerId::LedgerSync,
            duration: self.config.ledger_sync_patience,
        });
    }

    /// Serve a peer's committed-commands request from `reader`.
    ///
    /// Nothing is sent when there is nothing past the requested version.
    pub fn handle_request(
        &mut self,
        reader: &dyn CommittedReader,
        from: ValidatorId,
        request: CommittedCommandsRequest,
    ) {
        let batch_size = request.batch_size.min(self.config.max_ledger_sync_batch_size) as usize;
        let Some(commands_and_proof) =
            reader.get_next_committed_commands(request.start_state_version, batch_size)
        else {
            trace!(
                from = %from,
                start = request.start_state_version,
                "No committed commands to serve"
            );
            return;
        };

        trace!(
            from = %from,
            start = request.start_state_version,
            commands = commands_and_proof.commands.len(),
            "Serving committed commands"
        );
        self.outbox.push(Action::SendMessage {
            to: from,
            message: OutboundMessage::CommittedCommandsResponse(Box::new(
                CommittedCommandsResponse { commands_and_proof },
            )),
        });
    }
}

fn covers(current: &LedgerProof, target: &LedgerProof) -> bool {
    target.ledger_header.sync_target() <= current.ledger_header.sync_target()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_ledger::accumulator::accumulate_all;
    use quorum_ledger::{InMemoryMempool, InMemoryStateComputer};
    use quorum_test_helpers::TestCommittee;
    use quorum_types::{AccumulatorState, Epoch, Hash, LedgerHeader, View};
    use tracing_test::traced_test;

    const LOCAL: ValidatorId = ValidatorId(0);

    fn committee() -> TestCommittee {
        TestCommittee::new(4, 1)
    }

    fn new_sync(local: ValidatorId, config: SyncConfig, seed: u64) -> LedgerSync {
        LedgerSync::new(local, config, committee().validator_set(), seed)
    }

    fn genesis_proof() -> LedgerProof {
        LedgerProof::genesis(LedgerHeader::genesis(AccumulatorState::genesis(), 0))
    }

    fn ledger_at(proof: &LedgerProof) -> StateComputerLedger {
        StateComputerLedger::new(
            proof.clone(),
            Box::new(InMemoryStateComputer::new(proof)),
            Box::new(InMemoryMempool::new()),
        )
    }

    /// Batch of `payloads` on top of `previous`, proven by the committee.
    fn extend(previous: &LedgerProof, view: u64, payloads: &[&str]) -> CommandsAndProof {
        let commands: Vec<Command> = payloads.iter().map(|p| Command::new(p.as_bytes())).collect();
        let ids: Vec<Hash> = commands.iter().map(Command::id).collect();
        let header = LedgerHeader {
            epoch: Epoch(0),
            view: View(view),
            accumulator_state: accumulate_all(previous.accumulator_state(), &ids),
            timestamp_ms: view * 1_000,
            end_of_epoch: false,
        };
        CommandsAndProof::new(commands, committee().sign_ledger_proof(header, view * 1_000))
    }

    /// A ledger with proofs at versions 2 and 4.
    fn source() -> (StateComputerLedger, LedgerProof) {
        let genesis = genesis_proof();
        let mut ledger = ledger_at(&genesis);
        let first = extend(&genesis, 1, &["a", "b"]);
        let second = extend(&first.proof, 2, &["c", "d"]);
        let tail = second.proof.clone();
        ledger.commit_synced(first).unwrap();
        ledger.commit_synced(second).unwrap();
        (ledger, tail)
    }

    fn sent(actions: &[Action]) -> Vec<(ValidatorId, CommittedCommandsRequest)> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::SendMessage {
                    to,
                    message: OutboundMessage::CommittedCommandsRequest(request),
                } => Some((*to, *request)),
                _ => None,
            })
            .collect()
    }

    fn serve(
        source: &StateComputerLedger,
        from: ValidatorId,
        request: CommittedCommandsRequest,
    ) -> CommittedCommandsResponse {
        let mut responder = new_sync(from, SyncConfig::default(), 0);
        responder.handle_request(source.committed_reader(), LOCAL, request);
        match responder.take_actions().pop() {
            Some(Action::SendMessage {
                message: OutboundMessage::CommittedCommandsResponse(response),
                ..
            }) => *response,
            other => panic!("expected committed commands response, got {other:?}"),
        }
    }

    #[traced_test]
    #[test]
    fn test_catches_up_in_batches() {
        let (source, target) = source();
        let mut local = ledger_at(&genesis_proof());
        let config = SyncConfig::default().with_ledger_sync_batch_size(2);
        let mut sync = new_sync(LOCAL, config, 1);

        sync.on_local_sync_request(
            local.current_proof(),
            LocalSyncRequest {
                target: target.clone(),
                target_nodes: vec![ValidatorId(1)],
            },
        );

        let mut batches = 0;
        while let Some((peer, request)) = sent(&sync.take_actions()).pop() {
            assert_eq!(peer, ValidatorId(1));
            assert_eq!(request.start_state_version, local.current_proof().state_version());
            assert_eq!(request.batch_size, 2);
            let response = serve(&source, peer, request);
            let update = sync.on_response(&mut local, peer, response).unwrap();
            assert!(update.is_some());
            batches += 1;
        }

        assert_eq!(batches, 2);
        assert_eq!(local.current_proof(), &target);
        assert!(!sync.is_syncing());
        assert_eq!(sync.counters().commands_applied, 4);
    }

    #[test]
    fn test_invalid_batch_retries_other_peer() {
        let (source, target) = source();
        let mut local = ledger_at(&genesis_proof());
        let mut sync = new_sync(LOCAL, SyncConfig::default(), 2);

        sync.on_local_sync_request(
            local.current_proof(),
            LocalSyncRequest {
                target,
                target_nodes: vec![ValidatorId(1), ValidatorId(2)],
            },
        );
        let (first_peer, request) = sent(&sync.take_actions())[0];

        let mut response = serve(&source, first_peer, request);
        response.commands_and_proof.commands.reverse();
        let update = sync.on_response(&mut local, first_peer, response).unwrap();

        assert!(update.is_none());
        assert_eq!(local.current_proof().state_version(), 0);
        assert_eq!(sync.counters().invalid_batches, 1);

        let retries = sent(&sync.take_actions());
        assert_eq!(retries.len(), 1);
        assert_ne!(retries[0].0, first_peer);
    }

    fn respond(
        sync: &mut LedgerSync,
        local: &mut StateComputerLedger,
        batch: CommandsAndProof,
    ) -> Option<LedgerUpdate> {
        let (peer, _) = sent(&sync.take_actions())[0];
        let response = CommittedCommandsResponse {
            commands_and_proof: batch,
        };
        sync.on_response(local, peer, response).unwrap()
    }

    #[traced_test]
    #[test]
    fn test_batch_without_quorum_proof_is_rejected() {
        let (_, target) = source();
        let genesis = genesis_proof();
        let mut local = ledger_at(&genesis);
        let mut sync = new_sync(LOCAL, SyncConfig::default(), 7);
        sync.on_local_sync_request(
            local.current_proof(),
            LocalSyncRequest {
                target,
                target_nodes: vec![ValidatorId(1)],
            },
        );

        let forged = extend(&genesis, 1, &["evil"]);
        let unsigned = CommandsAndProof::new(
            forged.commands.clone(),
            LedgerProof::genesis(forged.proof.ledger_header.clone()),
        );
        assert!(respond(&mut sync, &mut local, unsigned).is_none());

        let outsider = TestCommittee::new(4, 2);
        let foreign = CommandsAndProof::new(
            forged.commands,
            outsider.sign_ledger_proof(forged.proof.ledger_header, 1_000),
        );
        assert!(respond(&mut sync, &mut local, foreign).is_none());

        assert_eq!(local.current_proof().state_version(), 0);
        assert_eq!(sync.counters().invalid_batches, 2);
        assert_eq!(sync.counters().batches_applied, 0);
        assert!(sync.is_syncing());
        assert!(logs_contain("proof is not signed by a quorum"));
    }

    #[test]
    fn test_batch_must_stay_on_sync_target() {
        let (source, _) = source();
        let genesis = genesis_proof();
        let target = extend(&genesis, 1, &["a", "b"]).proof;
        let mut local = ledger_at(&genesis);
        let mut sync = new_sync(LOCAL, SyncConfig::default(), 8);
        sync.on_local_sync_request(
            local.current_proof(),
            LocalSyncRequest {
                target: target.clone(),
                target_nodes: vec![ValidatorId(1)],
            },
        );

        // Signed, but past the target.
        let beyond = source
            .committed_reader()
            .get_next_committed_commands(0, 4)
            .unwrap();
        assert_eq!(beyond.proof.state_version(), 4);
        assert!(respond(&mut sync, &mut local, beyond).is_none());

        // Signed, at the target version, on another history.
        let sideways = extend(&genesis, 1, &["x", "y"]);
        assert!(respond(&mut sync, &mut local, sideways).is_none());
        assert_eq!(sync.counters().invalid_batches, 2);
        assert_eq!(local.current_proof().state_version(), 0);

        let honest = extend(&genesis, 1, &["a", "b"]);
        assert!(respond(&mut sync, &mut local, honest).is_some());
        assert_eq!(local.current_proof().accumulator_state(), target.accumulator_state());
        assert!(!sync.is_syncing());
    }

    #[test]
    fn test_timeout_retries_other_peer() {
        let (_, target) = source();
        let local = ledger_at(&genesis_proof());
        let mut sync = new_sync(LOCAL, SyncConfig::default(), 3);

        sync.on_local_sync_request(
            local.current_proof(),
            LocalSyncRequest {
                target,
                target_nodes: vec![LOCAL, ValidatorId(1), ValidatorId(2)],
            },
        );
        let (first_peer, _) = sent(&sync.take_actions())[0];
        assert_ne!(first_peer, LOCAL);

        sync.on_timeout(local.current_proof());

        let retries = sent(&sync.take_actions());
        assert_eq!(retries.len(), 1);
        assert_ne!(retries[0].0, first_peer);
        assert_ne!(retries[0].0, LOCAL);
        assert_eq!(sync.counters().timeouts, 1);
    }

    #[test]
    fn test_ignores_response_from_unexpected_peer() {
        let (source, target) = source();
        let mut local = ledger_at(&genesis_proof());
        let mut sync = new_sync(LOCAL, SyncConfig::default(), 4);

        sync.on_local_sync_request(
            local.current_proof(),
            LocalSyncRequest {
                target,
                target_nodes: vec![ValidatorId(1)],
            },
        );
        let (_, request) = sent(&sync.take_actions())[0];
        let response = serve(&source, ValidatorId(3), request);

        let update = sync.on_response(&mut local, ValidatorId(3), response).unwrap();
        assert!(update.is_none());
        assert_eq!(local.current_proof().state_version(), 0);
        assert!(sync.take_actions().is_empty());
    }

    #[test]
    fn test_request_at_current_is_ignored() {
        let genesis = genesis_proof();
        let mut sync = new_sync(LOCAL, SyncConfig::default(), 5);

        sync.on_local_sync_request(
            &genesis,
            LocalSyncRequest {
                target: genesis.clone(),
                target_nodes: vec![ValidatorId(1)],
            },
        );

        assert!(!sync.is_syncing());
        assert!(sync.take_actions().is_empty());
    }

    #[test]
    fn test_nothing_served_past_tail() {
        let (source, target) = source();
        let mut responder = new_sync(ValidatorId(1), SyncConfig::default(), 6);

        responder.handle_request(
            source.committed_reader(),
            LOCAL,
            CommittedCommandsRequest {
                start_state_version: target.state_version(),
                batch_size: 10,
            },
        );

        assert!(responder.take_actions().is_empty());
    }
}
