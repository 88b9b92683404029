//! Vertex fetch request.

use crate::response::GetVerticesResponse;
use quorum_types::{Hash, NetworkMessage, Request};
use sbor::prelude::BasicSbor;
use std::fmt;

/// Request for `count` vertices ending at (and including) `vertex_id`,
/// walking parent links backward.
///
/// Also the correlation key for outstanding requests: a response is matched
/// by the id of its last vertex and its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BasicSbor)]
pub struct GetVerticesRequest {
    pub vertex_id: Hash,
    pub count: u32,
}

impl GetVerticesRequest {
    pub fn new(vertex_id: Hash, count: u32) -> Self {
        Self { vertex_id, count }
    }
}

impl fmt::Display for GetVerticesRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GetVertices({:?} x{})", self.vertex_id, self.count)
    }
}

impl NetworkMessage for GetVerticesRequest {
    fn message_type_id() -> &'static str {
        "vertices.request"
    }
}

/// GetVerticesRequest expects GetVerticesResponse (or an error response).
impl Request for GetVerticesRequest {
    type Response = GetVerticesResponse;
}
