//! Committed ledger for the quorum ledger node.
//!
//! - [`accumulator`]: the hash chain over committed commands and its
//!   extension check
//! - [`StateComputerLedger`]: prepares vertices for the vertex store and
//!   commits verified extensions, from consensus or from ledger sync
//! - [`StateComputer`], [`Mempool`], [`CommittedReader`]: the execution-side
//!   seams
//! - [`InMemoryStateComputer`], [`InMemoryMempool`]: implementations used by
//!   the simulation

pub mod accumulator;
mod error;
mod memory;
mod state_computer;
mod state_computer_ledger;

pub use error::LedgerError;
pub use memory::{InMemoryMempool, InMemoryStateComputer};
pub use state_computer::{CommittedReader, Mempool, StateComputer, StateComputerResult};
pub use state_computer_ledger::{LedgerCounters, StateComputerLedger};
