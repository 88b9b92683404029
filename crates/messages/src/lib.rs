//! Network messages for the sync protocols.
//!
//! Sender identity is not part of any message: the transport attaches the
//! authenticated peer to every delivered message.

pub mod request;
pub mod response;

pub use request::{CommittedCommandsRequest, GetVerticesRequest};
pub use response::{CommittedCommandsResponse, GetVerticesErrorResponse, GetVerticesResponse};
