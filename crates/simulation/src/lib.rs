//! Deterministic simulation runner.
//!
//! This crate provides a fully deterministic simulation environment for
//! testing the node core. Given the same seed, it produces identical results
//! every run.
//!
//! The runner plays the part of the pacemaker: tests drive views explicitly
//! with [`SimulationRunner::propose`], [`SimulationRunner::form_qc`] and
//! [`SimulationRunner::form_tc`], and the nodes' sync machinery does the rest.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Event Queue (BTreeMap<EventKey, Event>)        │ │
//! │  │     Ordered by: time, priority, node, sequence     │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     nodes: Vec<NodeStateMachine>                   │ │
//! │  │     Each processes events sequentially             │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Actions → schedule new events                  │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod event_queue;
mod network;
mod runner;
mod storage;

pub use event_queue::EventKey;
pub use network::{Dropped, NetworkConfig, SimulatedNetwork};
pub use runner::{SimulationRunner, SimulationStats, VIEW_PHASE};
pub use storage::SimStorage;

/// Type alias for deterministic node indexing in simulation.
///
/// Node `i` runs as `ValidatorId(i)`.
pub type NodeIndex = u32;
