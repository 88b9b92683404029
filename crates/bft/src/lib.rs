//! Vertex store for the quorum ledger node.
//!
//! The store owns every uncommitted vertex of a replica, rooted at the last
//! committed vertex, together with the highest certificates it has seen.
//!
//! # Operations
//!
//! - [`VertexStore::add_qc`] → record a QC, committing by the 3-chain rule
//! - [`VertexStore::insert_vertex`] → prepare a vertex through the [`Ledger`]
//!   and attach it to its parent
//! - [`VertexStore::try_rebuild`] → replace the whole DAG from a snapshot
//!
//! Every mutation queues a [`VertexStoreUpdate`] carrying a fresh
//! [`VerifiedVertexStoreState`]. The owner drains them with
//! [`VertexStore::take_updates`] to persist the snapshot and to commit to the
//! ledger.
//!
//! [`Ledger`]: quorum_core::Ledger
//! [`VerifiedVertexStoreState`]: quorum_types::VerifiedVertexStoreState

mod error;
mod update;
mod vertex_store;

pub use error::VertexStoreError;
pub use update::VertexStoreUpdate;
pub use vertex_store::{AddQcResult, VertexStore};
