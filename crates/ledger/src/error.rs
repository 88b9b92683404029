//! Ledger error types.

use thiserror::Error;

/// Errors surfaced while committing to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The quorum certified a ledger state this replica cannot reach from its
    /// own committed history. Not recoverable.
    #[error(
        "commands do not extend ledger at version {current_version} to proof at version {proof_version}"
    )]
    InvalidExtension {
        current_version: u64,
        proof_version: u64,
    },
}
