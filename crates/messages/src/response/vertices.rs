//! Vertex fetch responses.

use crate::request::GetVerticesRequest;
use quorum_types::{HighQc, NetworkMessage, Vertex};
use sbor::prelude::BasicSbor;

/// Vertices answering a [`GetVerticesRequest`], ancestor first.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct GetVerticesResponse {
    pub vertices: Vec<Vertex>,
}

impl GetVerticesResponse {
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices }
    }

    /// The request this response answers, or `None` if it is empty.
    pub fn correlation_key(&self) -> Option<GetVerticesRequest> {
        let last = self.vertices.last()?;
        Some(GetVerticesRequest::new(last.id(), self.vertices.len() as u32))
    }
}

impl NetworkMessage for GetVerticesResponse {
    fn message_type_id() -> &'static str {
        "vertices.response"
    }
}

/// The responder does not hold the requested window.
///
/// Carries the responder's own HighQC so the requester can tell whether it
/// is the one that is behind.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct GetVerticesErrorResponse {
    pub high_qc: HighQc,
    pub request: GetVerticesRequest,
}

impl NetworkMessage for GetVerticesErrorResponse {
    fn message_type_id() -> &'static str {
        "vertices.error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::{AccumulatorState, LedgerHeader};

    #[test]
    fn test_correlation_key_uses_last_vertex() {
        let genesis = Vertex::genesis(LedgerHeader::genesis(AccumulatorState::genesis(), 0));
        let response = GetVerticesResponse::new(vec![genesis.clone()]);

        assert_eq!(
            response.correlation_key(),
            Some(GetVerticesRequest::new(genesis.id(), 1))
        );
        assert_eq!(GetVerticesResponse::new(vec![]).correlation_key(), None);
    }
}
