//! Event types for the deterministic state machine.

use quorum_messages::{
    CommittedCommandsRequest, CommittedCommandsResponse, GetVerticesErrorResponse,
    GetVerticesRequest, GetVerticesResponse,
};
use quorum_types::{HighQc, LedgerUpdate, LocalSyncRequest, ValidatorId, Vertex, VotingResult};

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same simulation time are processed in priority order.
/// Lower values = higher priority (processed first).
///
/// This ensures causality is preserved: internal events (consequences of
/// processing an event) are handled before new external inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Internal events: consequences of prior event processing.
    Internal = 0,

    /// Timer events: scheduled by the node itself.
    Timer = 1,

    /// Network events: external inputs from other nodes.
    Network = 2,
}

/// All possible events a node can receive.
///
/// Events are **passive data** - they describe something that happened.
/// The state machine processes events and returns actions.
#[derive(Debug, Clone)]
pub enum Event {
    // ═══════════════════════════════════════════════════════════════════════
    // Timers (priority: Timer)
    // ═══════════════════════════════════════════════════════════════════════
    /// An outstanding vertex request ran out of patience.
    VertexRequestTimeout { request: GetVerticesRequest },

    /// The outstanding committed-commands request ran out of patience.
    LedgerSyncTimeout,

    // ═══════════════════════════════════════════════════════════════════════
    // Consensus inputs (priority: Internal)
    // ═══════════════════════════════════════════════════════════════════════
    /// Vote collection for a view finished with a QC or a TC.
    ///
    /// `last_author` is the validator whose vote completed the quorum; it is
    /// the first peer asked if the certified vertex has to be fetched.
    ViewQuorumReached {
        result: VotingResult,
        last_author: ValidatorId,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Network Messages - Consensus (priority: Network)
    // ═══════════════════════════════════════════════════════════════════════
    /// A proposed vertex together with the proposer's HighQC.
    ProposalReceived {
        vertex: Vertex,
        high_qc: HighQc,
        author: ValidatorId,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Network Messages - Vertex Sync (priority: Network)
    // ═══════════════════════════════════════════════════════════════════════
    GetVerticesRequestReceived {
        from: ValidatorId,
        request: GetVerticesRequest,
    },

    GetVerticesResponseReceived {
        from: ValidatorId,
        response: GetVerticesResponse,
    },

    GetVerticesErrorResponseReceived {
        from: ValidatorId,
        response: GetVerticesErrorResponse,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Network Messages - Ledger Sync (priority: Network)
    // ═══════════════════════════════════════════════════════════════════════
    CommittedCommandsRequestReceived {
        from: ValidatorId,
        request: CommittedCommandsRequest,
    },

    CommittedCommandsResponseReceived {
        from: ValidatorId,
        response: CommittedCommandsResponse,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Internal (priority: Internal)
    // ═══════════════════════════════════════════════════════════════════════
    /// The committed ledger has to catch up to a quorum-proven header.
    LocalSyncRequested { request: LocalSyncRequest },

    /// The committed ledger advanced.
    LedgerUpdated { update: LedgerUpdate },
}

impl Event {
    /// Get the priority of this event for ordering.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::ViewQuorumReached { .. }
            | Event::LocalSyncRequested { .. }
            | Event::LedgerUpdated { .. } => EventPriority::Internal,

            Event::VertexRequestTimeout { .. } | Event::LedgerSyncTimeout => EventPriority::Timer,

            Event::ProposalReceived { .. }
            | Event::GetVerticesRequestReceived { .. }
            | Event::GetVerticesResponseReceived { .. }
            | Event::GetVerticesErrorResponseReceived { .. }
            | Event::CommittedCommandsRequestReceived { .. }
            | Event::CommittedCommandsResponseReceived { .. } => EventPriority::Network,
        }
    }

    /// Get a human-readable name for this event type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::VertexRequestTimeout { .. } => "VertexRequestTimeout",
            Event::LedgerSyncTimeout => "LedgerSyncTimeout",
            Event::ViewQuorumReached { .. } => "ViewQuorumReached",
            Event::ProposalReceived { .. } => "ProposalReceived",
            Event::GetVerticesRequestReceived { .. } => "GetVerticesRequestReceived",
            Event::GetVerticesResponseReceived { .. } => "GetVerticesResponseReceived",
            Event::GetVerticesErrorResponseReceived { .. } => "GetVerticesErrorResponseReceived",
            Event::CommittedCommandsRequestReceived { .. } => "CommittedCommandsRequestReceived",
            Event::CommittedCommandsResponseReceived { .. } => "CommittedCommandsResponseReceived",
            Event::LocalSyncRequested { .. } => "LocalSyncRequested",
            Event::LedgerUpdated { .. } => "LedgerUpdated",
        }
    }

    /// Check if this is a network event.
    pub fn is_network(&self) -> bool {
        self.priority() == EventPriority::Network
    }
}
