//! Action types for the deterministic state machine.

use crate::{message::OutboundMessage, Event, TimerId};
use quorum_types::{HighQc, LedgerProof, ValidatorId, VerifiedVertexStoreState};
use std::time::Duration;

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes actions and may convert results back into events.
#[derive(Debug, Clone)]
pub enum Action {
    // ═══════════════════════════════════════════════════════════════════════
    // Network
    // ═══════════════════════════════════════════════════════════════════════
    /// Send a message to one peer. Fire-and-forget.
    SendMessage {
        to: ValidatorId,
        message: OutboundMessage,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Timers
    // ═══════════════════════════════════════════════════════════════════════
    /// Set a timer to fire after a duration, replacing any pending timer
    /// with the same id.
    SetTimer { id: TimerId, duration: Duration },

    /// Cancel a previously set timer.
    CancelTimer { id: TimerId },

    // ═══════════════════════════════════════════════════════════════════════
    // Internal (fed back as events with Internal priority)
    // ═══════════════════════════════════════════════════════════════════════
    /// Enqueue an internal event for immediate processing.
    EnqueueInternal { event: Event },

    // ═══════════════════════════════════════════════════════════════════════
    // Collaborators
    // ═══════════════════════════════════════════════════════════════════════
    /// Hand a new HighQC to the pacemaker.
    ProcessHighQc { high_qc: HighQc },

    /// Durably store the vertex store snapshot used for recovery.
    PersistVertexStoreState { state: VerifiedVertexStoreState },

    /// Notification that the committed ledger advanced to `proof`.
    EmitCommitted { proof: LedgerProof, commands: usize },

    /// Internal state can no longer be trusted; the runner must stop the
    /// node and restart it from durable state.
    Halt { reason: String },
}

impl Action {
    /// Get a human-readable name for this action type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::SendMessage { .. } => "SendMessage",
            Action::SetTimer { .. } => "SetTimer",
            Action::CancelTimer { .. } => "CancelTimer",
            Action::EnqueueInternal { .. } => "EnqueueInternal",
            Action::ProcessHighQc { .. } => "ProcessHighQc",
            Action::PersistVertexStoreState { .. } => "PersistVertexStoreState",
            Action::EmitCommitted { .. } => "EmitCommitted",
            Action::Halt { .. } => "Halt",
        }
    }
}
