//! Core traits for state machines and their collaborators.

use crate::{Action, Event};
use quorum_types::{PreparedVertex, Vertex};
use std::time::Duration;

/// A state machine that processes events.
///
/// All node logic is implemented as state machines that are:
///
/// - **Synchronous**: No async, no `.await`
/// - **Deterministic**: Same state + event = same actions
/// - **Pure-ish**: Mutates self, but performs no I/O
pub trait StateMachine {
    /// Process an event, returning actions to perform.
    ///
    /// Actions may include sending network messages, setting timers,
    /// enqueueing internal events and persisting state.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Set the current time.
    ///
    /// Called by the runner before each `handle()` call to provide the
    /// current simulation or wall-clock time.
    fn set_time(&mut self, now: Duration);

    /// Get the current time.
    fn now(&self) -> Duration;
}

/// Speculative execution of vertices on top of the committed ledger.
pub trait Ledger {
    /// Prepare `vertex`.
    ///
    /// `previous` holds the already prepared, not yet committed ancestors of
    /// `vertex`, oldest first, starting just above the committed root.
    /// Returns `None` when the vertex cannot be prepared against the current
    /// ledger, for example because its parent is behind the committed state.
    fn prepare(&mut self, previous: &[PreparedVertex], vertex: &Vertex) -> Option<PreparedVertex>;
}
