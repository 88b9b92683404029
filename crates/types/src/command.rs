//! Opaque ledger commands.

use crate::Hash;
use sbor::prelude::*;

/// A command ordered by consensus and applied by the state computer.
///
/// The payload is opaque at this layer; its business semantics belong to the
/// state computer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, BasicSbor)]
pub struct Command {
    payload: Vec<u8>,
}

impl Command {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Content hash, used both as mempool key and as the accumulator input.
    pub fn id(&self) -> Hash {
        Hash::from_bytes(&self.payload)
    }
}
