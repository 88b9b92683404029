//! Deterministic simulation runner.
//!
//! Each node has its own storage and in-memory state computer. The runner
//! stands in for the pacemaker and the voting layer: it broadcasts proposals
//! and delivers quorum outcomes signed by a [`TestCommittee`], and carries
//! every sync message the nodes exchange through the simulated network.

use crate::event_queue::EventKey;
use crate::network::{Dropped, NetworkConfig, SimulatedNetwork};
use crate::storage::SimStorage;
use crate::NodeIndex;
use quorum_core::{Action, Event, EventPriority, StateMachine, TimerId};
use quorum_ledger::{InMemoryMempool, InMemoryStateComputer};
use quorum_node::{NodeStateMachine, RecoveredState};
use quorum_sync::SyncConfig;
use quorum_test_helpers::{genesis_header, TestCommittee, GENESIS_TIMESTAMP_MS};
use quorum_types::{
    Command, Hash, HighQc, QuorumCertificate, TimeoutCertificate, ValidatorId, ValidatorSet,
    Vertex, View, VotingResult,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Time [`SimulationRunner::run_view`] lets pass after the proposal and
/// after the QC.
pub const VIEW_PHASE: Duration = Duration::from_millis(300);

/// A proposal as it was broadcast, kept for replay.
#[derive(Debug, Clone)]
struct Proposal {
    vertex: Vertex,
    high_qc: HighQc,
    leader: NodeIndex,
}

impl Proposal {
    fn event(&self) -> Event {
        Event::ProposalReceived {
            vertex: self.vertex.clone(),
            high_qc: self.high_qc.clone(),
            author: ValidatorId(u64::from(self.leader)),
        }
    }
}

/// Deterministic simulation runner.
///
/// Processes events in deterministic order and executes actions.
/// Given the same seed, produces identical results every run.
pub struct SimulationRunner {
    /// All nodes in the simulation, indexed by NodeIndex.
    nodes: Vec<NodeStateMachine>,

    /// Keys of the validator set, used to sign QCs and TCs.
    committee: TestCommittee,

    sync_config: SyncConfig,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, Event>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    /// Network simulator.
    network: SimulatedNetwork,

    /// RNG for network conditions (seeded for determinism).
    rng: ChaCha8Rng,

    /// Timer registry for cancellation support.
    /// Maps (node, timer_id) -> event_key for removal.
    timers: HashMap<(NodeIndex, TimerId), EventKey>,

    /// Statistics.
    stats: SimulationStats,

    /// Per-node durable state. Index corresponds to node index.
    node_storage: Vec<SimStorage>,

    /// Halt reason per node. Halted nodes process no further events.
    halted: Vec<Option<String>>,

    /// Restart count per node.
    restarts: Vec<u64>,

    /// Every proposal broadcast so far, by view.
    proposals: BTreeMap<u64, Proposal>,

    seed: u64,
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Events processed by priority.
    pub events_by_priority: [u64; 3],
    /// Total actions generated.
    pub actions_generated: u64,
    /// Messages sent (successfully scheduled for delivery).
    pub messages_sent: u64,
    /// Messages dropped due to network partition.
    pub messages_dropped_partition: u64,
    /// Messages dropped due to packet loss.
    pub messages_dropped_loss: u64,
    /// Messages of a withheld kind.
    pub messages_withheld: u64,
    /// Timers set.
    pub timers_set: u64,
    /// Timers cancelled.
    pub timers_cancelled: u64,
    /// Vertex store snapshots persisted.
    pub snapshots_persisted: u64,
    /// Commands committed, summed over nodes.
    pub commands_committed: u64,
    /// Nodes that halted.
    pub halts: u64,
}

impl SimulationStats {
    /// Total messages dropped (partition + withheld + packet loss).
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped_partition + self.messages_withheld + self.messages_dropped_loss
    }

    /// Message delivery rate (sent / (sent + dropped)).
    pub fn delivery_rate(&self) -> f64 {
        let total = self.messages_sent + self.messages_dropped();
        if total == 0 {
            1.0
        } else {
            self.messages_sent as f64 / total as f64
        }
    }
}

impl SimulationRunner {
    /// Create a new simulation runner with the default sync configuration.
    pub fn new(network_config: NetworkConfig, seed: u64) -> Self {
        Self::with_sync_config(network_config, SyncConfig::default(), seed)
    }

    /// Create a new simulation runner, every node starting from genesis.
    pub fn with_sync_config(
        network_config: NetworkConfig,
        sync_config: SyncConfig,
        seed: u64,
    ) -> Self {
        let network = SimulatedNetwork::new(network_config.clone());
        let rng = ChaCha8Rng::seed_from_u64(seed);
        let num_nodes = network_config.num_validators as usize;
        let committee = TestCommittee::new(num_nodes, seed);

        let genesis = RecoveredState::genesis(genesis_header())
            .expect("genesis snapshot should always be valid");

        let node_storage: Vec<SimStorage> = (0..num_nodes)
            .map(|_| SimStorage::new(genesis.clone()))
            .collect();
        let nodes: Vec<NodeStateMachine> = (0..num_nodes)
            .map(|i| {
                build_node(
                    i as NodeIndex,
                    committee.validator_set(),
                    &sync_config,
                    genesis.clone(),
                    node_seed(seed, i, 0),
                )
            })
            .collect();

        info!(
            num_nodes,
            quorum = committee.quorum(),
            seed,
            "Created simulation runner"
        );

        Self {
            nodes,
            committee,
            sync_config,
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            network,
            rng,
            timers: HashMap::new(),
            stats: SimulationStats::default(),
            node_storage,
            halted: vec![None; num_nodes],
            restarts: vec![0; num_nodes],
            proposals: BTreeMap::new(),
            seed,
        }
    }

    /// Get simulation statistics.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Get current simulation time.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Get a reference to a node by index.
    pub fn node(&self, index: NodeIndex) -> Option<&NodeStateMachine> {
        self.nodes.get(index as usize)
    }

    /// Get a reference to a node's storage.
    pub fn node_storage(&self, index: NodeIndex) -> Option<&SimStorage> {
        self.node_storage.get(index as usize)
    }

    /// Id of a node's committed root vertex.
    pub fn root_id(&self, index: NodeIndex) -> Option<Hash> {
        self.node(index).map(|n| n.store().root_id())
    }

    pub fn halt_reason(&self, index: NodeIndex) -> Option<&str> {
        self.halted.get(index as usize)?.as_deref()
    }

    pub fn is_halted(&self, index: NodeIndex) -> bool {
        self.halt_reason(index).is_some()
    }

    pub fn committee(&self) -> &TestCommittee {
        &self.committee
    }

    /// Get a reference to the network.
    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }

    /// Get a mutable reference to the network for partition/loss configuration.
    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    /// Schedule an event for `node`, `delay` from now.
    pub fn schedule_initial_event(&mut self, node: NodeIndex, delay: Duration, event: Event) {
        let time = self.now + delay;
        self.schedule_event(node, time, event);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Pacemaker stand-in
    // ═══════════════════════════════════════════════════════════════════════

    /// Broadcast a proposal for `view` from `leader`, built on the leader's
    /// highest QC and carrying its HighQC.
    ///
    /// Returns `None` if the leader does not exist or has halted.
    pub fn propose(
        &mut self,
        leader: NodeIndex,
        view: u64,
        command_count: usize,
    ) -> Option<Vertex> {
        if self.is_halted(leader) {
            return None;
        }
        let high_qc = self.node(leader)?.store().high_qc();
        let qc = high_qc.highest_qc().clone();

        let commands = (0..command_count)
            .map(|i| Command::new(format!("view-{view}-cmd-{i}").into_bytes()))
            .collect();
        let vertex = Vertex {
            epoch: qc.epoch(),
            qc,
            view: View(view),
            commands,
            proposer: Some(ValidatorId(u64::from(leader))),
            timestamp_ms: self.timestamp_ms(),
        };

        debug!(
            leader,
            view,
            vertex_id = ?vertex.id(),
            parent_view = vertex.parent_header().view.0,
            "Broadcasting proposal"
        );

        let proposal = Proposal {
            vertex: vertex.clone(),
            high_qc,
            leader,
        };
        self.broadcast(leader, proposal.event());
        self.proposals.insert(view, proposal);
        Some(vertex)
    }

    /// Certify `vertex` with the committee's quorum and deliver the QC from
    /// `aggregator` to every node.
    ///
    /// The aggregator must hold the prepared vertex.
    pub fn form_qc(
        &mut self,
        aggregator: NodeIndex,
        vertex: &Vertex,
    ) -> Option<QuorumCertificate> {
        let header = self.node(aggregator)?.store().header_of(&vertex.id())?;
        let qc = self.committee.certify(vertex, header, self.timestamp_ms());

        debug!(
            aggregator,
            view = qc.view().0,
            commits = ?qc.committed().map(|h| h.view.0),
            "Quorum certificate formed"
        );

        self.broadcast(
            aggregator,
            Event::ViewQuorumReached {
                result: VotingResult::FormedQc(qc.clone()),
                last_author: ValidatorId(u64::from(aggregator)),
            },
        );
        Some(qc)
    }

    /// Time out `view` and deliver the TC from `aggregator` to every node.
    pub fn form_tc(&mut self, aggregator: NodeIndex, view: u64) -> Option<TimeoutCertificate> {
        let epoch = self.node(aggregator)?.store().high_qc().highest_qc().epoch();
        let tc = self.committee.sign_tc(epoch, View(view), self.timestamp_ms());

        debug!(aggregator, view, "Timeout certificate formed");

        self.broadcast(
            aggregator,
            Event::ViewQuorumReached {
                result: VotingResult::FormedTc(tc.clone()),
                last_author: ValidatorId(u64::from(aggregator)),
            },
        );
        Some(tc)
    }

    /// Propose, certify and let both settle for one view.
    pub fn run_view(
        &mut self,
        leader: NodeIndex,
        view: u64,
        command_count: usize,
    ) -> Option<QuorumCertificate> {
        let vertex = self.propose(leader, view, command_count)?;
        self.run_for(VIEW_PHASE);
        let qc = self.form_qc(leader, &vertex);
        self.run_for(VIEW_PHASE);
        qc
    }

    /// Deliver the proposal broadcast for `view` to `to` once more.
    ///
    /// Returns `false` if no proposal was made for `view`.
    pub fn replay_proposal(&mut self, view: u64, to: NodeIndex) -> bool {
        let Some(proposal) = self.proposals.get(&view).cloned() else {
            return false;
        };
        debug!(view, to, "Replaying proposal");
        if to == proposal.leader {
            self.schedule_event(to, self.now, proposal.event());
        } else {
            self.try_deliver_message(proposal.leader, to, proposal.event());
        }
        true
    }

    /// Crash `node` and bring it back from its storage.
    ///
    /// Everything in flight to the node and all of its timers are lost.
    pub fn restart_node(&mut self, node: NodeIndex) {
        let index = node as usize;
        let Some(storage) = self.node_storage.get(index) else {
            warn!(node, "Cannot restart unknown node");
            return;
        };
        let recovered = storage.recovered_state();

        self.event_queue.retain(|key, _| key.node_index != node);
        self.timers.retain(|(owner, _), _| *owner != node);
        self.restarts[index] += 1;

        info!(
            node,
            root_view = recovered.vertex_store.root().view.0,
            state_version = recovered.ledger_proof.state_version(),
            restarts = self.restarts[index],
            "Restarting node from storage"
        );

        let mut restarted = build_node(
            node,
            self.committee.validator_set(),
            &self.sync_config,
            recovered,
            node_seed(self.seed, index, self.restarts[index]),
        );
        restarted.set_time(self.now);
        self.nodes[index] = restarted;
        self.halted[index] = None;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Event loop
    // ═══════════════════════════════════════════════════════════════════════

    /// Run `duration` past the current time.
    pub fn run_for(&mut self, duration: Duration) {
        self.run_until(self.now + duration);
    }

    /// Run simulation until no more events or time limit reached.
    ///
    /// The clock ends at `end_time` even if the queue drained earlier.
    pub fn run_until(&mut self, end_time: Duration) {
        trace!(
            end_time_secs = end_time.as_secs_f64(),
            "Running simulation step"
        );

        while let Some((&key, _)) = self.event_queue.first_key_value() {
            if key.time > end_time {
                debug!(
                    remaining_events = self.event_queue.len(),
                    "Time limit reached"
                );
                break;
            }

            let Some((key, event)) = self.event_queue.pop_first() else {
                break;
            };
            self.now = key.time;
            let node_index = key.node_index;

            if event.priority() == EventPriority::Timer {
                self.timers.retain(|_, pending| *pending != key);
            }

            if self.is_halted(node_index) {
                trace!(
                    node = node_index,
                    event = event.type_name(),
                    "Dropping event for halted node"
                );
                continue;
            }

            trace!(
                time = ?self.now,
                node = node_index,
                event = event.type_name(),
                "Processing event"
            );

            self.stats.events_processed += 1;
            self.stats.events_by_priority[event.priority() as usize] += 1;

            let node = &mut self.nodes[node_index as usize];
            node.set_time(self.now);
            let actions = node.handle(event);

            self.stats.actions_generated += actions.len() as u64;

            for action in actions {
                self.process_action(node_index, action);
            }
        }

        if self.now < end_time {
            self.now = end_time;
        }

        trace!(
            events_processed = self.stats.events_processed,
            actions_generated = self.stats.actions_generated,
            final_time = ?self.now,
            "Simulation step complete"
        );
    }

    /// Process an action from a node.
    fn process_action(&mut self, from: NodeIndex, action: Action) {
        match action {
            Action::SendMessage { to, message } => {
                let to = match NodeIndex::try_from(to.0) {
                    Ok(to) if (to as usize) < self.nodes.len() => to,
                    _ => {
                        warn!(from, to = %to, "Message to unknown validator");
                        return;
                    }
                };
                trace!(from, to, message = message.type_name(), "Sending message");
                let event = message.into_received_event(ValidatorId(u64::from(from)));
                self.try_deliver_message(from, to, event);
            }

            Action::SetTimer { id, duration } => {
                if let Some(previous) = self.timers.remove(&(from, id)) {
                    self.event_queue.remove(&previous);
                }
                let fire_time = self.now + duration;
                let key = self.schedule_event(from, fire_time, timer_to_event(id));
                self.timers.insert((from, id), key);
                self.stats.timers_set += 1;
            }

            Action::CancelTimer { id } => {
                if let Some(key) = self.timers.remove(&(from, id)) {
                    self.event_queue.remove(&key);
                    self.stats.timers_cancelled += 1;
                }
            }

            Action::EnqueueInternal { event } => {
                self.schedule_event(from, self.now, event);
            }

            // Views are driven by the test, not by the nodes' HighQCs.
            Action::ProcessHighQc { high_qc } => {
                trace!(node = from, view = high_qc.highest_view().0, "HighQC processed");
            }

            Action::PersistVertexStoreState { state } => {
                self.node_storage[from as usize].persist_vertex_store(state);
                self.stats.snapshots_persisted += 1;
            }

            Action::EmitCommitted { proof, commands } => {
                debug!(
                    node = from,
                    state_version = proof.state_version(),
                    view = proof.view().0,
                    commands,
                    "Committed"
                );
                self.node_storage[from as usize].record_commit(proof, commands);
                self.stats.commands_committed += commands as u64;
            }

            Action::Halt { reason } => {
                if self.halted[from as usize].is_none() {
                    warn!(node = from, reason = %reason, "Node halted");
                    self.stats.halts += 1;
                    self.timers.retain(|(owner, _), _| *owner != from);
                    self.halted[from as usize] = Some(reason);
                }
            }
        }
    }

    /// Deliver `event` from `from` to every node, itself included.
    fn broadcast(&mut self, from: NodeIndex, event: Event) {
        for to in self.network.all_nodes() {
            if to == from {
                self.schedule_event(from, self.now, event.clone());
            } else {
                self.try_deliver_message(from, to, event.clone());
            }
        }
    }

    /// Schedule an event.
    fn schedule_event(&mut self, node: NodeIndex, time: Duration, event: Event) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(time, &event, node, self.sequence);
        self.event_queue.insert(key, event);
        key
    }

    /// Try to deliver a message, accounting for partitions, withheld kinds
    /// and packet loss.
    fn try_deliver_message(&mut self, from: NodeIndex, to: NodeIndex, event: Event) {
        match self
            .network
            .deliver(from, to, event.type_name(), &mut self.rng)
        {
            Ok(latency) => {
                let delivery_time = self.now + latency;
                self.schedule_event(to, delivery_time, event);
                self.stats.messages_sent += 1;
            }
            Err(Dropped::Partition) => {
                self.stats.messages_dropped_partition += 1;
                trace!(from, to, "Message dropped due to partition");
            }
            Err(Dropped::Withheld) => {
                self.stats.messages_withheld += 1;
                trace!(from, to, event = event.type_name(), "Message withheld");
            }
            Err(Dropped::Loss) => {
                self.stats.messages_dropped_loss += 1;
                trace!(from, to, "Message dropped due to packet loss");
            }
        }
    }

    fn timestamp_ms(&self) -> u64 {
        GENESIS_TIMESTAMP_MS + self.now.as_millis() as u64
    }
}

fn build_node(
    index: NodeIndex,
    validators: ValidatorSet,
    config: &SyncConfig,
    recovered: RecoveredState,
    seed: u64,
) -> NodeStateMachine {
    let state_computer = InMemoryStateComputer::new(&recovered.ledger_proof);
    NodeStateMachine::recover(
        ValidatorId(u64::from(index)),
        validators,
        config.clone(),
        recovered,
        Box::new(state_computer),
        Box::new(InMemoryMempool::new()),
        seed,
    )
}

fn node_seed(seed: u64, index: usize, restarts: u64) -> u64 {
    seed.wrapping_add(index as u64)
        .wrapping_mul(0x517cc1b727220a95)
        .wrapping_add(restarts)
}

/// Convert a timer ID to an event.
fn timer_to_event(id: TimerId) -> Event {
    match id {
        TimerId::VertexRequest(request) => Event::VertexRequestTimeout { request },
        TimerId::LedgerSync => Event::LedgerSyncTimeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_simulation_runner_creation() {
        let runner = SimulationRunner::new(NetworkConfig::default(), 42);

        assert_eq!(runner.num_nodes(), 4);
        assert!(runner.node(3).is_some());
        assert!(runner.node(4).is_none());
        assert_eq!(runner.root_id(0), runner.root_id(3));
    }

    #[traced_test]
    #[test]
    fn test_three_views_commit_on_every_node() {
        let mut runner = SimulationRunner::new(NetworkConfig::default(), 42);

        let mut first = None;
        for view in 1..=3 {
            let qc = runner.run_view((view % 4) as NodeIndex, view, 2);
            assert!(qc.is_some(), "view {view} should certify");
            if view == 1 {
                first = qc.map(|qc| qc.proposed().vertex_id);
            }
        }

        for node in 0..4 {
            assert_eq!(runner.root_id(node), first, "node {node} root");
            let storage = runner.node_storage(node).unwrap();
            assert_eq!(storage.ledger_proof().state_version(), 2);
            assert!(storage.snapshots_written() > 0);
        }
        assert_eq!(runner.stats().halts, 0);
        assert_eq!(runner.stats().commands_committed, 8);
    }

    #[test]
    fn test_cancelled_timer_does_not_fire() {
        let mut runner = SimulationRunner::new(NetworkConfig::default(), 1);

        runner.process_action(
            0,
            Action::SetTimer {
                id: TimerId::LedgerSync,
                duration: Duration::from_millis(100),
            },
        );
        runner.process_action(0, Action::CancelTimer { id: TimerId::LedgerSync });
        runner.run_for(Duration::from_secs(1));

        assert_eq!(runner.stats().timers_set, 1);
        assert_eq!(runner.stats().timers_cancelled, 1);
        assert_eq!(runner.stats().events_processed, 0);
    }

    #[test]
    fn test_halted_node_processes_nothing() {
        let mut runner = SimulationRunner::new(NetworkConfig::default(), 1);

        runner.process_action(
            2,
            Action::Halt {
                reason: "test".to_string(),
            },
        );
        runner.schedule_initial_event(2, Duration::from_millis(1), Event::LedgerSyncTimeout);
        runner.run_for(Duration::from_millis(10));

        assert!(runner.is_halted(2));
        assert_eq!(runner.stats().events_processed, 0);

        runner.restart_node(2);
        assert!(!runner.is_halted(2));
    }
}
