//! Node state machine.

use crate::{NodeError, RecoveredState};
use quorum_bft::{VertexStore, VertexStoreUpdate};
use quorum_core::{Action, Event, StateMachine};
use quorum_ledger::{Mempool, StateComputer, StateComputerLedger};
use quorum_sync::{BftSync, LedgerSync, SyncConfig, SyncResult};
use quorum_types::{
    CertificateError, HighQc, LedgerProof, LedgerUpdate, ValidatorId, ValidatorSet,
    VerifiedVertexStoreState, Vertex, View, VotingResult,
};
use std::time::Duration;
use tracing::{debug, error, info, instrument, trace, warn};

/// Combined node state machine.
///
/// Owns the vertex store (and through it the ledger), vertex sync and
/// ledger sync, and routes every event to them. Store updates are
/// persisted, and commits are applied to the ledger before the event
/// returns.
///
/// Certificates arriving from peers are verified against the validator set
/// before any state machine sees them; a message carrying a bad one is
/// dropped.
///
/// A [`NodeError`] is fatal: the node records it, emits
/// [`Action::Halt`] and from then on answers every event with the same halt.
pub struct NodeStateMachine {
    local: ValidatorId,
    validators: ValidatorSet,

    /// Vertex store; owns the state computer ledger.
    store: VertexStore<StateComputerLedger>,

    bft_sync: BftSync,
    ledger_sync: LedgerSync,

    /// Current time.
    now: Duration,

    /// Reason of the fatal error that stopped this node.
    halted: Option<String>,
}

impl std::fmt::Debug for NodeStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStateMachine")
            .field("local", &self.local)
            .field("validators", &self.validators.len())
            .field("store", &self.store)
            .field("bft_sync", &self.bft_sync)
            .field("now", &self.now)
            .field("halted", &self.halted)
            .finish()
    }
}

impl NodeStateMachine {
    /// Rebuild a node from durable state.
    ///
    /// The snapshot was validated when it was constructed, so the store and
    /// ledger are usable as soon as this returns. `seed` drives every random
    /// choice the node makes.
    pub fn recover(
        local: ValidatorId,
        validators: ValidatorSet,
        config: SyncConfig,
        recovered: RecoveredState,
        state_computer: Box<dyn StateComputer>,
        mempool: Box<dyn Mempool>,
        seed: u64,
    ) -> Self {
        let RecoveredState {
            vertex_store,
            ledger_proof,
        } = recovered;

        info!(
            validator = %local,
            root_view = vertex_store.root().view.0,
            state_version = ledger_proof.state_version(),
            "Recovering node"
        );

        let ledger = StateComputerLedger::new(ledger_proof.clone(), state_computer, mempool);
        let store = VertexStore::create(vertex_store, ledger);

        let ledger_sync = LedgerSync::new(
            local,
            config.clone(),
            validators.clone(),
            seed.rotate_left(32) ^ local.0,
        );
        Self {
            local,
            validators,
            store,
            bft_sync: BftSync::new(local, config, ledger_proof, seed),
            ledger_sync,
            now: Duration::ZERO,
            halted: None,
        }
    }

    pub fn local(&self) -> ValidatorId {
        self.local
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    pub fn store(&self) -> &VertexStore<StateComputerLedger> {
        &self.store
    }

    pub fn bft_sync(&self) -> &BftSync {
        &self.bft_sync
    }

    pub fn ledger_sync(&self) -> &LedgerSync {
        &self.ledger_sync
    }

    /// Proof of the committed ledger tail.
    pub fn committed_proof(&self) -> &LedgerProof {
        self.store.ledger().current_proof()
    }

    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// Snapshot of the vertex store as it stands.
    pub fn vertex_store_state(&self) -> Result<VerifiedVertexStoreState, NodeError> {
        Ok(self.store.state()?)
    }

    /// Process `event`, surfacing fatal errors.
    #[instrument(level = "debug", skip_all, fields(validator = %self.local, event = event.type_name()))]
    pub fn try_handle(&mut self, event: Event) -> Result<Vec<Action>, NodeError> {
        self.bft_sync.set_time(self.now);
        let tc_view = self.highest_tc_view();
        let mut actions = Vec::new();

        match event {
            // ═══════════════════════════════════════════════════════════════════════
            // Timers
            // ═══════════════════════════════════════════════════════════════════════
            Event::VertexRequestTimeout { request } => {
                self.bft_sync.on_request_timeout(&mut self.store, request)?;
            }

            Event::LedgerSyncTimeout => {
                self.ledger_sync.on_timeout(self.store.ledger().current_proof());
            }

            // ═══════════════════════════════════════════════════════════════════════
            // Consensus
            // ═══════════════════════════════════════════════════════════════════════
            Event::ViewQuorumReached {
                result,
                last_author,
            } => self.on_view_quorum(result, last_author)?,

            Event::ProposalReceived {
                vertex,
                high_qc,
                author,
            } => {
                let verified = self
                    .validators
                    .verify_qc(&vertex.qc)
                    .and_then(|()| self.validators.verify_high_qc(&high_qc));
                match verified {
                    Ok(()) => self.on_proposal(vertex, high_qc, author)?,
                    Err(e) => reject(author, "proposal", &e),
                }
            }

            // ═══════════════════════════════════════════════════════════════════════
            // Vertex sync
            // ═══════════════════════════════════════════════════════════════════════
            Event::GetVerticesRequestReceived { from, request } => {
                self.bft_sync
                    .handle_get_vertices_request(&self.store, from, request);
            }

            Event::GetVerticesResponseReceived { from, response } => {
                let verified = response
                    .vertices
                    .iter()
                    .try_for_each(|vertex| self.validators.verify_qc(&vertex.qc));
                match verified {
                    Ok(()) => self
                        .bft_sync
                        .on_get_vertices_response(&mut self.store, from, response)?,
                    Err(e) => reject(from, "vertices response", &e),
                }
            }

            Event::GetVerticesErrorResponseReceived { from, response } => {
                match self.validators.verify_high_qc(&response.high_qc) {
                    Ok(()) => self.bft_sync.on_get_vertices_error_response(
                        &mut self.store,
                        from,
                        response,
                    )?,
                    Err(e) => reject(from, "vertices error response", &e),
                }
            }

            // ═══════════════════════════════════════════════════════════════════════
            // Ledger sync
            // ═══════════════════════════════════════════════════════════════════════
            Event::CommittedCommandsRequestReceived { from, request } => {
                self.ledger_sync
                    .handle_request(self.store.ledger().committed_reader(), from, request);
            }

            Event::CommittedCommandsResponseReceived { from, response } => {
                let update = self
                    .ledger_sync
                    .on_response(self.store.ledger_mut(), from, response)?;
                if let Some(update) = update {
                    actions.push(Action::EnqueueInternal {
                        event: Event::LedgerUpdated { update },
                    });
                }
            }

            Event::LocalSyncRequested { request } => {
                self.ledger_sync
                    .on_local_sync_request(self.store.ledger().current_proof(), request);
            }

            Event::LedgerUpdated { update } => {
                actions.push(self.on_ledger_update(update)?);
            }
        }

        let mut output = self.bft_sync.take_actions();
        output.append(&mut actions);
        output.extend(self.ledger_sync.take_actions());

        let persisted = self.drain_store_updates(&mut output)?;
        if persisted == 0 && self.highest_tc_view() != tc_view {
            output.push(Action::PersistVertexStoreState {
                state: self.store.state()?,
            });
        }
        Ok(output)
    }

    fn on_view_quorum(
        &mut self,
        result: VotingResult,
        last_author: ValidatorId,
    ) -> Result<(), NodeError> {
        let current = self.store.high_qc();
        let high_qc = match result {
            VotingResult::FormedQc(qc) => HighQc::new(
                qc,
                current.highest_committed_qc().clone(),
                self.store.highest_timeout_certificate().cloned(),
            ),
            VotingResult::FormedTc(tc) => HighQc::new(
                current.highest_qc().clone(),
                current.highest_committed_qc().clone(),
                Some(tc),
            ),
        };

        let view = high_qc.highest_view();
        let result = self
            .bft_sync
            .sync_to_qc(&mut self.store, high_qc, Some(last_author), 0)?;
        trace!(view = view.0, ?result, "View quorum processed");
        Ok(())
    }

    /// Insert a proposed vertex once the proposer's HighQC is local.
    ///
    /// Proposals for a view that already has a QC or TC are ignored.
    fn on_proposal(
        &mut self,
        vertex: Vertex,
        high_qc: HighQc,
        author: ValidatorId,
    ) -> Result<(), NodeError> {
        let highest_view = self.store.high_qc().highest_view();
        if vertex.view <= highest_view {
            debug!(
                view = vertex.view.0,
                highest_view = highest_view.0,
                author = %author,
                "Ignoring proposal for a past view"
            );
            return Ok(());
        }

        let result = self
            .bft_sync
            .sync_to_qc(&mut self.store, high_qc, Some(author), 0)?;
        if result != SyncResult::Synced {
            debug!(view = vertex.view.0, ?result, "Proposal waits for sync");
            return Ok(());
        }

        if !self.store.contains_vertex(&vertex.parent_id()) {
            debug!(
                view = vertex.view.0,
                parent = ?vertex.parent_id(),
                "Proposal parent unknown"
            );
            return Ok(());
        }

        self.store.insert_vertex(&vertex)?;
        Ok(())
    }

    fn on_ledger_update(&mut self, update: LedgerUpdate) -> Result<Action, NodeError> {
        self.bft_sync
            .process_ledger_update(&mut self.store, &update)?;
        self.ledger_sync.on_ledger_update(&update);

        let proof = update.tail().clone();
        let commands = update.commands_and_proof.commands.len();
        debug!(
            state_version = proof.state_version(),
            view = proof.view().0,
            commands,
            "Ledger updated"
        );
        Ok(Action::EmitCommitted { proof, commands })
    }

    /// Persist every store update and apply commits to the ledger.
    ///
    /// Returns the number of updates drained.
    fn drain_store_updates(&mut self, actions: &mut Vec<Action>) -> Result<usize, NodeError> {
        let updates = self.store.take_updates();
        let drained = updates.len();

        for update in updates {
            trace!(update = update.type_name(), "Vertex store update");
            match &update {
                VertexStoreUpdate::Inserted { .. } => self.bft_sync.process_bft_update(&update),
                VertexStoreUpdate::Committed {
                    committed,
                    proof,
                    state,
                    ..
                } => {
                    let ledger_update =
                        self.store
                            .ledger_mut()
                            .commit_vertices(committed, proof.clone(), state)?;
                    if let Some(update) = ledger_update {
                        actions.push(Action::EnqueueInternal {
                            event: Event::LedgerUpdated { update },
                        });
                    }
                }
                VertexStoreUpdate::HighQcUpdated { .. } | VertexStoreUpdate::Rebuilt { .. } => {}
            }
            actions.push(Action::PersistVertexStoreState {
                state: update.state().clone(),
            });
        }
        Ok(drained)
    }

    fn highest_tc_view(&self) -> Option<View> {
        self.store.highest_timeout_certificate().map(|tc| tc.view)
    }
}

fn reject(from: ValidatorId, kind: &'static str, error: &CertificateError) {
    warn!(from = %from, kind, error = %error, "Dropping message with invalid certificate");
}

impl StateMachine for NodeStateMachine {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        if let Some(reason) = &self.halted {
            return vec![Action::Halt {
                reason: reason.clone(),
            }];
        }

        match self.try_handle(event) {
            Ok(actions) => actions,
            Err(e) => {
                error!(validator = %self.local, error = %e, "Fatal node error, halting");
                let reason = e.to_string();
                self.halted = Some(reason.clone());
                vec![Action::Halt { reason }]
            }
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
        self.bft_sync.set_time(now);
    }

    fn now(&self) -> Duration {
        self.now
    }
}
