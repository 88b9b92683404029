//! Production runner: drives a [`NodeStateMachine`] with real I/O.
//!
//! A single task owns the state machine and pulls events from three
//! channels: timer fires, consensus inputs fed by the caller (proposals and
//! view quorums), and frames from the transport. Internal events the node
//! enqueues are processed before the next external event is taken.

use crate::network::{decode_event, encode_message, InboundFrame, Transport};
use crate::storage::{SnapshotStore, StorageError};
use crate::timers::TimerManager;
use quorum_core::{Action, Event, StateMachine};
use quorum_node::NodeStateMachine;
use quorum_types::{HighQc, LedgerProof};
use std::collections::VecDeque;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, span, trace, warn, Level};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Node halted: {0}")]
    Halted(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("All event channels closed")]
    ChannelsClosed,
}

/// Receives the node's HighQC and commit notifications.
pub trait Pacemaker: Send {
    /// A new HighQC the view logic should advance on.
    fn process_high_qc(&mut self, high_qc: HighQc);

    /// The committed ledger advanced to `proof`.
    fn committed(&mut self, _proof: &LedgerProof, _commands: usize) {}
}

/// Pacemaker that only logs.
#[derive(Debug, Default)]
pub struct LoggingPacemaker;

impl Pacemaker for LoggingPacemaker {
    fn process_high_qc(&mut self, high_qc: HighQc) {
        debug!(
            view = high_qc.highest_view().0,
            committed_view = high_qc.highest_committed_qc().view().0,
            "HighQC"
        );
    }

    fn committed(&mut self, proof: &LedgerProof, commands: usize) {
        info!(
            state_version = proof.state_version(),
            view = proof.view().0,
            commands,
            "Committed"
        );
    }
}

/// Handle for shutting down a running ProductionRunner.
///
/// When dropped, signals the runner to exit gracefully.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl ShutdownHandle {
    /// Trigger shutdown (consumes the handle).
    pub fn shutdown(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

pub struct ProductionRunner<T: Transport, P: Pacemaker> {
    node: NodeStateMachine,
    transport: T,
    pacemaker: P,
    storage: SnapshotStore,
    timer_manager: TimerManager,
    timer_rx: mpsc::Receiver<Event>,
    consensus_tx: mpsc::Sender<Event>,
    consensus_rx: mpsc::Receiver<Event>,
    inbound_rx: mpsc::Receiver<InboundFrame>,
    internal: VecDeque<Event>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_rx: oneshot::Receiver<()>,
    start_time: Instant,
}

impl<T: Transport, P: Pacemaker> ProductionRunner<T, P> {
    /// Must be called inside a tokio runtime.
    pub fn new(
        node: NodeStateMachine,
        transport: T,
        pacemaker: P,
        storage: SnapshotStore,
        inbound_rx: mpsc::Receiver<InboundFrame>,
        channel_capacity: usize,
    ) -> Self {
        let (timer_tx, timer_rx) = mpsc::channel(channel_capacity);
        let (consensus_tx, consensus_rx) = mpsc::channel(channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        Self {
            node,
            transport,
            pacemaker,
            storage,
            timer_manager: TimerManager::new(timer_tx),
            timer_rx,
            consensus_tx,
            consensus_rx,
            inbound_rx,
            internal: VecDeque::new(),
            shutdown_tx: Some(shutdown_tx),
            shutdown_rx,
            start_time: Instant::now(),
        }
    }

    /// Sender for consensus inputs: proposals and view quorums.
    pub fn event_sender(&self) -> mpsc::Sender<Event> {
        self.consensus_tx.clone()
    }

    /// Take the shutdown handle. Returns `None` after the first call.
    pub fn shutdown_handle(&mut self) -> Option<ShutdownHandle> {
        self.shutdown_tx
            .take()
            .map(|tx| ShutdownHandle { tx: Some(tx) })
    }

    pub fn node(&self) -> &NodeStateMachine {
        &self.node
    }

    /// Run until shutdown or until the node halts.
    pub async fn run(mut self) -> Result<(), RunnerError> {
        info!(
            validator = %self.node.local(),
            root_view = self.node.store().root().view.0,
            state_version = self.node.committed_proof().state_version(),
            "Starting production runner"
        );

        loop {
            // Priority: shutdown, timers, consensus inputs, network.
            tokio::select! {
                biased;

                _ = &mut self.shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                Some(event) = self.timer_rx.recv() => {
                    self.dispatch(event)?;
                }

                Some(event) = self.consensus_rx.recv() => {
                    self.dispatch(event)?;
                }

                Some(frame) = self.inbound_rx.recv() => {
                    match decode_event(frame.from, &frame.bytes) {
                        Ok(event) => self.dispatch(event)?,
                        Err(e) => warn!(from = %frame.from, error = %e, "Undecodable frame"),
                    }
                }

                else => return Err(RunnerError::ChannelsClosed),
            }
        }

        self.timer_manager.cancel_all();
        Ok(())
    }

    /// Handle `event` and every internal event it causes.
    fn dispatch(&mut self, event: Event) -> Result<(), RunnerError> {
        self.internal.push_back(event);
        while let Some(event) = self.internal.pop_front() {
            let event_span = span!(
                Level::DEBUG,
                "handle_event",
                event.type = event.type_name(),
                validator = %self.node.local(),
            );
            let _guard = event_span.enter();

            self.node.set_time(self.start_time.elapsed());
            for action in self.node.handle(event) {
                self.process_action(action)?;
            }
        }
        Ok(())
    }

    fn process_action(&mut self, action: Action) -> Result<(), RunnerError> {
        match action {
            Action::SendMessage { to, message } => {
                let msg_type = message.type_name();
                match encode_message(&message) {
                    Ok(frame) => {
                        if let Err(e) = self.transport.send(to, frame) {
                            warn!(to = %to, msg_type, error = %e, "Send failed");
                        } else {
                            trace!(to = %to, msg_type, "Sent");
                        }
                    }
                    Err(e) => warn!(to = %to, msg_type, error = %e, "Encode failed"),
                }
            }

            Action::SetTimer { id, duration } => {
                self.timer_manager.set_timer(id, duration);
            }

            Action::CancelTimer { id } => {
                self.timer_manager.cancel_timer(id);
            }

            Action::EnqueueInternal { event } => {
                self.internal.push_back(event);
            }

            Action::ProcessHighQc { high_qc } => {
                self.pacemaker.process_high_qc(high_qc);
            }

            Action::PersistVertexStoreState { state } => {
                self.storage.persist_vertex_store(&state)?;
            }

            Action::EmitCommitted { proof, commands } => {
                self.storage.persist_ledger_proof(&proof)?;
                self.pacemaker.committed(&proof, commands);
            }

            Action::Halt { reason } => {
                warn!(reason = %reason, "Node halted, stopping runner");
                self.timer_manager.cancel_all();
                return Err(RunnerError::Halted(reason));
            }
        }
        Ok(())
    }
}
