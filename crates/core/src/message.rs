//! Outbound message types for network communication.

use crate::Event;
use quorum_messages::{
    CommittedCommandsRequest, CommittedCommandsResponse, GetVerticesErrorResponse,
    GetVerticesRequest, GetVerticesResponse,
};
use quorum_types::ValidatorId;

/// Outbound network messages.
///
/// These are the messages that a node can send to a peer.
/// The runner handles the actual network I/O.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    // ═══════════════════════════════════════════════════════════════════════
    // Vertex Sync
    // ═══════════════════════════════════════════════════════════════════════
    GetVerticesRequest(GetVerticesRequest),
    GetVerticesResponse(GetVerticesResponse),
    GetVerticesErrorResponse(Box<GetVerticesErrorResponse>),

    // ═══════════════════════════════════════════════════════════════════════
    // Ledger Sync
    // ═══════════════════════════════════════════════════════════════════════
    CommittedCommandsRequest(CommittedCommandsRequest),
    CommittedCommandsResponse(Box<CommittedCommandsResponse>),
}

impl OutboundMessage {
    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::GetVerticesRequest(_) => "GetVerticesRequest",
            OutboundMessage::GetVerticesResponse(_) => "GetVerticesResponse",
            OutboundMessage::GetVerticesErrorResponse(_) => "GetVerticesErrorResponse",
            OutboundMessage::CommittedCommandsRequest(_) => "CommittedCommandsRequest",
            OutboundMessage::CommittedCommandsResponse(_) => "CommittedCommandsResponse",
        }
    }

    /// Check if this message belongs to the vertex sync protocol.
    pub fn is_vertex_sync(&self) -> bool {
        matches!(
            self,
            OutboundMessage::GetVerticesRequest(_)
                | OutboundMessage::GetVerticesResponse(_)
                | OutboundMessage::GetVerticesErrorResponse(_)
        )
    }

    /// The event a peer receives when `from` sends it this message.
    pub fn into_received_event(self, from: ValidatorId) -> Event {
        match self {
            OutboundMessage::GetVerticesRequest(request) => {
                Event::GetVerticesRequestReceived { from, request }
            }
            OutboundMessage::GetVerticesResponse(response) => {
                Event::GetVerticesResponseReceived { from, response }
            }
            OutboundMessage::GetVerticesErrorResponse(response) => {
                Event::GetVerticesErrorResponseReceived {
                    from,
                    response: *response,
                }
            }
            OutboundMessage::CommittedCommandsRequest(request) => {
                Event::CommittedCommandsRequestReceived { from, request }
            }
            OutboundMessage::CommittedCommandsResponse(response) => {
                Event::CommittedCommandsResponseReceived {
                    from,
                    response: *response,
                }
            }
        }
    }
}
