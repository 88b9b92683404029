//! Committed command fetch response.

use quorum_types::{CommandsAndProof, NetworkMessage};
use sbor::prelude::BasicSbor;

/// Committed commands ending at a quorum-signed proof.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct CommittedCommandsResponse {
    pub commands_and_proof: CommandsAndProof,
}

impl NetworkMessage for CommittedCommandsResponse {
    fn message_type_id() -> &'static str {
        "ledger.commands.response"
    }
}
