//! Response messages.

mod ledger;
mod vertices;

pub use ledger::CommittedCommandsResponse;
pub use vertices::{GetVerticesErrorResponse, GetVerticesResponse};
