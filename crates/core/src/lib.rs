//! Core types for the quorum ledger node.
//!
//! This crate provides the foundational types for the node architecture:
//!
//! - [`Event`]: All possible inputs to the state machine
//! - [`Action`]: All possible outputs from the state machine
//! - [`EventPriority`]: Ordering priority for events at the same timestamp
//! - [`StateMachine`]: The trait that all state machines implement
//! - [`Ledger`]: The seam through which the vertex store prepares vertices
//!
//! # Architecture
//!
//! ```text
//! Events → StateMachine::handle() → Actions
//! ```
//!
//! The state machine is:
//! - **Synchronous**: No async, no .await
//! - **Deterministic**: Same state + event = same actions
//! - **Pure-ish**: Mutates self, but performs no I/O
//!
//! All I/O is handled by the runner (simulation or production) which:
//! 1. Delivers events to the state machine
//! 2. Executes the returned actions
//! 3. Converts action results back into events

mod action;
mod event;
mod message;
mod traits;

pub use action::Action;
pub use event::{Event, EventPriority};
pub use message::OutboundMessage;
pub use traits::{Ledger, StateMachine};

use quorum_messages::GetVerticesRequest;

/// Timer identification.
///
/// Setting a timer with an id that is already pending replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Patience timer of one outstanding vertex request.
    VertexRequest(GetVerticesRequest),
    /// Patience timer of the outstanding committed-commands request.
    LedgerSync,
}
