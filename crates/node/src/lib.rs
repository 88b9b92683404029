//! Combined node state machine.
//!
//! This crate composes the vertex store, the state computer ledger and the
//! vertex and ledger sync state machines into a complete node core.

mod error;
mod recovery;
mod state;

pub use error::NodeError;
pub use recovery::RecoveredState;
pub use state::NodeStateMachine;
