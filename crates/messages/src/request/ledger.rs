//! Committed command fetch request.

use crate::response::CommittedCommandsResponse;
use quorum_types::{NetworkMessage, Request};
use sbor::prelude::BasicSbor;

/// Request for committed commands following `start_state_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BasicSbor)]
pub struct CommittedCommandsRequest {
    /// Last state version the requester already holds.
    pub start_state_version: u64,

    /// Upper bound on the number of commands returned; the responder rounds
    /// up to the next proven batch boundary.
    pub batch_size: u32,
}

impl NetworkMessage for CommittedCommandsRequest {
    fn message_type_id() -> &'static str {
        "ledger.commands.request"
    }
}

impl Request for CommittedCommandsRequest {
    type Response = CommittedCommandsResponse;
}
