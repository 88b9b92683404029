//! Request messages.

mod ledger;
mod vertices;

pub use ledger::CommittedCommandsRequest;
pub use vertices::GetVerticesRequest;
