//! Production runner with async I/O.
//!
//! This crate wraps the deterministic [`NodeStateMachine`] with real I/O:
//!
//! - Network frames over TCP (or in-process channels)
//! - Timers as tokio sleep tasks
//! - Durable snapshots in the data directory
//!
//! # Architecture
//!
//! Uses the event aggregator pattern: a single task owns the state machine
//! and receives events via mpsc channels. This avoids mutex contention.
//!
//! ```text
//!  timers ──┐
//!  consensus┼──▶ ProductionRunner ──▶ Transport (GetVertices, ledger sync)
//!  network ─┘     └─ loop { event = recv(); actions = node.handle(event); }
//!                        │
//!                        ├──▶ Pacemaker (HighQC, commits)
//!                        └──▶ SnapshotStore
//! ```
//!
//! [`NodeStateMachine`]: quorum_node::NodeStateMachine

pub mod config;
pub mod network;
mod runner;
mod storage;
pub mod telemetry;
mod timers;

pub use config::{ConfigError, NodeConfig};
pub use runner::{LoggingPacemaker, Pacemaker, ProductionRunner, RunnerError, ShutdownHandle};
pub use storage::{SnapshotStore, StorageError};
pub use telemetry::{init_telemetry, TelemetryError};
pub use timers::TimerManager;
