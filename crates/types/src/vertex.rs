//! Vertices: proposed blocks in the consensus DAG.

use crate::{BftHeader, Command, Epoch, Hash, LedgerHeader, QuorumCertificate, ValidatorId, View};
use sbor::prelude::*;

/// A proposed block of commands, justified by a QC on its parent.
///
/// Vertices are immutable. Identity is the hash of the encoded vertex, so any
/// change to its content yields a different vertex.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Vertex {
    pub epoch: Epoch,
    /// Certificate on the parent vertex.
    pub qc: QuorumCertificate,
    pub view: View,
    pub commands: Vec<Command>,
    /// `None` only for genesis.
    pub proposer: Option<ValidatorId>,
    pub timestamp_ms: u64,
}

impl Vertex {
    /// Create the genesis vertex for a ledger header.
    ///
    /// Its QC points at a zero-id ancestor; use
    /// [`QuorumCertificate::of_genesis`] to certify the vertex itself.
    pub fn genesis(ledger_header: LedgerHeader) -> Self {
        let epoch = ledger_header.epoch;
        let timestamp_ms = ledger_header.timestamp_ms;
        Self {
            epoch,
            qc: QuorumCertificate::genesis_ancestor(ledger_header),
            view: View::genesis(),
            commands: Vec::new(),
            proposer: None,
            timestamp_ms,
        }
    }

    /// Compute the id of this vertex.
    pub fn id(&self) -> Hash {
        let bytes = basic_encode(self).expect("Vertex serialization should never fail");
        Hash::from_bytes(&bytes)
    }

    pub fn is_genesis(&self) -> bool {
        self.view.is_genesis()
    }

    pub fn parent_id(&self) -> Hash {
        self.qc.proposed().vertex_id
    }

    pub fn parent_header(&self) -> &BftHeader {
        self.qc.proposed()
    }

    pub fn grandparent_header(&self) -> &BftHeader {
        self.qc.parent()
    }

    /// The parent sits at the immediately preceding view.
    pub fn has_direct_parent(&self) -> bool {
        self.parent_header().view.next() == self.view
    }

    pub fn parent_has_direct_parent(&self) -> bool {
        self.grandparent_header().view.next() == self.parent_header().view
    }

    /// Whether this vertex or either of its two ancestors is at genesis.
    pub fn touches_genesis(&self) -> bool {
        self.view.is_genesis()
            || self.parent_header().view.is_genesis()
            || self.grandparent_header().view.is_genesis()
    }

    /// Check that `vertices` is parent-linked, oldest first.
    pub fn is_linked_chain(vertices: &[Vertex]) -> bool {
        vertices
            .windows(2)
            .all(|pair| pair[1].parent_id() == pair[0].id())
    }
}

/// A vertex after the state computer has speculatively executed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedVertex {
    id: Hash,
    vertex: Vertex,
    ledger_header: LedgerHeader,
    successful_commands: Vec<Command>,
    failed_commands: Vec<(Command, String)>,
}

impl PreparedVertex {
    pub fn new(
        vertex: Vertex,
        ledger_header: LedgerHeader,
        successful_commands: Vec<Command>,
        failed_commands: Vec<(Command, String)>,
    ) -> Self {
        Self {
            id: vertex.id(),
            vertex,
            ledger_header,
            successful_commands,
            failed_commands,
        }
    }

    pub fn id(&self) -> Hash {
        self.id
    }

    pub fn vertex(&self) -> &Vertex {
        &self.vertex
    }

    pub fn view(&self) -> View {
        self.vertex.view
    }

    pub fn parent_id(&self) -> Hash {
        self.vertex.parent_id()
    }

    /// Ledger header after applying this vertex's successful commands.
    pub fn ledger_header(&self) -> &LedgerHeader {
        &self.ledger_header
    }

    pub fn successful_commands(&self) -> &[Command] {
        &self.successful_commands
    }

    pub fn failed_commands(&self) -> &[(Command, String)] {
        &self.failed_commands
    }

    /// The header a vote on this vertex refers to.
    pub fn header(&self) -> BftHeader {
        BftHeader::new(self.view(), self.id, self.ledger_header.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccumulatorState;

    fn genesis() -> Vertex {
        Vertex::genesis(LedgerHeader::genesis(AccumulatorState::genesis(), 0))
    }

    #[test]
    fn test_genesis_touches_genesis() {
        let vertex = genesis();
        assert!(vertex.is_genesis());
        assert!(vertex.touches_genesis());
        assert_eq!(vertex.parent_id(), Hash::ZERO);
    }

    #[test]
    fn test_id_changes_with_content() {
        let a = genesis();
        let mut b = genesis();
        b.commands.push(Command::new(b"cmd".to_vec()));
        assert_eq!(a.id(), genesis().id());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_linked_chain() {
        let root = genesis();
        let root_qc = QuorumCertificate::of_genesis(&root, root.qc.proposed().ledger_header.clone());
        let child = Vertex {
            epoch: Epoch(0),
            qc: root_qc,
            view: View(1),
            commands: vec![],
            proposer: Some(ValidatorId(0)),
            timestamp_ms: 1,
        };

        assert!(child.has_direct_parent());
        assert!(Vertex::is_linked_chain(&[root.clone(), child.clone()]));
        assert!(!Vertex::is_linked_chain(&[child, root]));
    }
}
