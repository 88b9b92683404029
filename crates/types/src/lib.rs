//! Core types for the quorum ledger node.
//!
//! This crate provides the foundational types used throughout the node:
//!
//! - **Primitives**: Hash, cryptographic keys and signatures
//! - **Identifiers**: ValidatorId, View, Epoch
//! - **Consensus types**: Vertex, QuorumCertificate, TimeoutCertificate, HighQc
//! - **Ledger types**: AccumulatorState, LedgerHeader, LedgerProof
//! - **Validators**: ValidatorSet and certificate verification
//! - **Network traits**: Message markers for serialization
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod crypto;
mod hash;
mod identifiers;
mod network;
mod signing;

// Consensus and ledger types
mod certificate;
mod command;
mod ledger;
mod validator_set;
mod vertex;
mod vertex_store_state;

pub use crypto::{KeyPair, PublicKey, Signature};
pub use hash::{Hash, HexError};
pub use identifiers::{Epoch, ValidatorId, View};
pub use network::{NetworkMessage, Request};
pub use signing::{
    ledger_signing_hash, vertex_vote_message, view_timeout_message, DOMAIN_VERTEX_VOTE,
    DOMAIN_VIEW_TIMEOUT,
};

pub use certificate::{
    BftHeader, HighQc, QuorumCertificate, TimeoutCertificate, TimestampedSignature, VoteData,
    VotingResult,
};
pub use command::Command;
pub use ledger::{
    AccumulatorState, CommandsAndProof, LedgerHeader, LedgerProof, LedgerSyncTarget,
    LedgerUpdate, LocalSyncRequest,
};
pub use validator_set::{CertificateError, ValidatorSet};
pub use vertex::{PreparedVertex, Vertex};
pub use vertex_store_state::{VerifiedVertexStoreState, VertexStoreStateError};
