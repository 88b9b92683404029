//! Quorum and timeout certificates.

use crate::{
    ledger_signing_hash, Epoch, Hash, LedgerHeader, LedgerProof, Signature, ValidatorId, Vertex,
    View,
};
use sbor::prelude::*;

/// Consensus-level reference to a vertex and the ledger state it produces.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BftHeader {
    pub view: View,
    pub vertex_id: Hash,
    pub ledger_header: LedgerHeader,
}

impl BftHeader {
    pub fn new(view: View, vertex_id: Hash, ledger_header: LedgerHeader) -> Self {
        Self {
            view,
            vertex_id,
            ledger_header,
        }
    }

    /// Header of the (virtual) ancestor of the genesis vertex.
    pub fn genesis_ancestor(ledger_header: LedgerHeader) -> Self {
        Self::new(View::genesis(), Hash::ZERO, ledger_header)
    }
}

/// What a vote commits to: the proposed vertex, its parent, and the vertex
/// that becomes committed if this vote gathers a quorum.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct VoteData {
    pub proposed: BftHeader,
    pub parent: BftHeader,
    pub committed: Option<BftHeader>,
}

impl VoteData {
    /// Build the vote data for `vertex`, prepared to `proposed`.
    ///
    /// The grandparent is committed when the three vertices form a chain of
    /// consecutive views none of which is genesis.
    pub fn for_vertex(vertex: &Vertex, proposed: BftHeader) -> Self {
        let parent = vertex.parent_header().clone();
        let committed = if !vertex.touches_genesis()
            && vertex.has_direct_parent()
            && vertex.parent_has_direct_parent()
        {
            Some(vertex.grandparent_header().clone())
        } else {
            None
        };

        Self {
            proposed,
            parent,
            committed,
        }
    }

    pub fn hash(&self) -> Hash {
        let bytes = basic_encode(self).expect("VoteData serialization should never fail");
        Hash::from_bytes(&bytes)
    }

    /// Hash a vote on this data signs.
    ///
    /// Binds the vote data to the ledger header it commits, or to the
    /// proposed one when it commits nothing.
    pub fn signing_hash(&self) -> Hash {
        let header = self.committed.as_ref().unwrap_or(&self.proposed);
        ledger_signing_hash(&self.hash(), &header.ledger_header)
    }
}

/// A signature together with the signer's local time at signing.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct TimestampedSignature {
    pub signer: ValidatorId,
    pub timestamp_ms: u64,
    pub signature: Signature,
}

/// Proof that a quorum voted for `vote_data.proposed`.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct QuorumCertificate {
    pub vote_data: VoteData,
    pub signatures: Vec<TimestampedSignature>,
}

impl QuorumCertificate {
    pub fn new(vote_data: VoteData, signatures: Vec<TimestampedSignature>) -> Self {
        Self {
            vote_data,
            signatures,
        }
    }

    /// The QC embedded in the genesis vertex, pointing at a zero-id ancestor.
    pub fn genesis_ancestor(ledger_header: LedgerHeader) -> Self {
        let header = BftHeader::genesis_ancestor(ledger_header);
        Self::new(
            VoteData {
                proposed: header.clone(),
                parent: header.clone(),
                committed: Some(header),
            },
            Vec::new(),
        )
    }

    /// Self-certifying QC for the genesis vertex.
    ///
    /// Genesis is its own proposed, parent and committed vertex, so replicas
    /// start from a committed root without any signatures.
    pub fn of_genesis(genesis: &Vertex, ledger_header: LedgerHeader) -> Self {
        let header = BftHeader::new(genesis.view, genesis.id(), ledger_header);
        Self::new(
            VoteData {
                proposed: header.clone(),
                parent: header.clone(),
                committed: Some(header),
            },
            Vec::new(),
        )
    }

    /// View of the certified vertex.
    pub fn view(&self) -> View {
        self.vote_data.proposed.view
    }

    pub fn epoch(&self) -> Epoch {
        self.vote_data.proposed.ledger_header.epoch
    }

    pub fn proposed(&self) -> &BftHeader {
        &self.vote_data.proposed
    }

    pub fn parent(&self) -> &BftHeader {
        &self.vote_data.parent
    }

    pub fn committed(&self) -> Option<&BftHeader> {
        self.vote_data.committed.as_ref()
    }

    pub fn signers(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.signatures.iter().map(|s| s.signer)
    }

    /// Median of the signers' timestamps, or `None` if unsigned.
    pub fn weighted_timestamp(&self) -> Option<u64> {
        if self.signatures.is_empty() {
            return None;
        }
        let mut timestamps: Vec<u64> = self.signatures.iter().map(|s| s.timestamp_ms).collect();
        timestamps.sort_unstable();
        Some(timestamps[(timestamps.len() - 1) / 2])
    }

    /// Timestamp a child of the certified vertex is prepared with.
    pub fn quorum_timestamp(&self) -> u64 {
        self.weighted_timestamp()
            .unwrap_or(self.vote_data.proposed.ledger_header.timestamp_ms)
    }

    /// The committed header and a ledger proof built from this QC's signatures.
    pub fn committed_and_ledger_proof(&self) -> Option<(BftHeader, LedgerProof)> {
        let committed = self.committed()?;
        let proof = LedgerProof {
            opaque: self.vote_data.hash(),
            ledger_header: committed.ledger_header.clone(),
            signatures: self.signatures.clone(),
        };
        Some((committed.clone(), proof))
    }
}

/// Proof that a quorum gave up on `view` without forming a QC.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct TimeoutCertificate {
    pub epoch: Epoch,
    pub view: View,
    pub signatures: Vec<TimestampedSignature>,
}

impl TimeoutCertificate {
    pub fn signers(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.signatures.iter().map(|s| s.signer)
    }
}

/// The best certificates a replica knows of.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct HighQc {
    highest_qc: QuorumCertificate,
    highest_committed_qc: QuorumCertificate,
    highest_tc: Option<TimeoutCertificate>,
}

impl HighQc {
    /// Combine certificates, normalising them so that
    /// `committed.view <= highest.view < tc.view`.
    pub fn new(
        highest_qc: QuorumCertificate,
        highest_committed_qc: QuorumCertificate,
        highest_tc: Option<TimeoutCertificate>,
    ) -> Self {
        let highest_qc = if highest_qc.view() < highest_committed_qc.view() {
            highest_committed_qc.clone()
        } else {
            highest_qc
        };
        let highest_tc = highest_tc.filter(|tc| tc.view > highest_qc.view());
        Self {
            highest_qc,
            highest_committed_qc,
            highest_tc,
        }
    }

    /// A HighQC whose highest and committed QC are the same certificate.
    pub fn from_committed(qc: QuorumCertificate) -> Self {
        Self::new(qc.clone(), qc, None)
    }

    pub fn highest_qc(&self) -> &QuorumCertificate {
        &self.highest_qc
    }

    pub fn highest_committed_qc(&self) -> &QuorumCertificate {
        &self.highest_committed_qc
    }

    pub fn highest_tc(&self) -> Option<&TimeoutCertificate> {
        self.highest_tc.as_ref()
    }

    /// Highest view this HighQC proves the quorum has moved past.
    pub fn highest_view(&self) -> View {
        self.highest_tc
            .as_ref()
            .map(|tc| tc.view)
            .unwrap_or_else(|| self.highest_qc.view())
    }
}

/// Outcome of a view's vote collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VotingResult {
    FormedQc(QuorumCertificate),
    FormedTc(TimeoutCertificate),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccumulatorState, Command};

    fn ledger() -> LedgerHeader {
        LedgerHeader::genesis(AccumulatorState::genesis(), 0)
    }

    fn header(view: u64) -> BftHeader {
        BftHeader::new(View(view), Hash::from_bytes(&view.to_le_bytes()), ledger())
    }

    fn qc(proposed: u64, parent: u64, timestamps: &[u64]) -> QuorumCertificate {
        QuorumCertificate::new(
            VoteData {
                proposed: header(proposed),
                parent: header(parent),
                committed: None,
            },
            timestamps
                .iter()
                .enumerate()
                .map(|(i, t)| TimestampedSignature {
                    signer: ValidatorId(i as u64),
                    timestamp_ms: *t,
                    signature: Signature::zero(),
                })
                .collect(),
        )
    }

    fn vertex_on(qc: QuorumCertificate, view: u64) -> Vertex {
        Vertex {
            epoch: Epoch(0),
            qc,
            view: View(view),
            commands: vec![Command::new(b"x".to_vec())],
            proposer: Some(ValidatorId(1)),
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_three_chain_commits_grandparent() {
        let vertex = vertex_on(qc(4, 3, &[1]), 5);
        let vote = VoteData::for_vertex(&vertex, header(5));
        assert_eq!(vote.committed, Some(header(3)));
    }

    #[test]
    fn test_gap_in_views_does_not_commit() {
        let skipped_parent = vertex_on(qc(4, 3, &[1]), 6);
        assert_eq!(
            VoteData::for_vertex(&skipped_parent, header(6)).committed,
            None
        );

        let skipped_grandparent = vertex_on(qc(4, 2, &[1]), 5);
        assert_eq!(
            VoteData::for_vertex(&skipped_grandparent, header(5)).committed,
            None
        );
    }

    #[test]
    fn test_genesis_chain_does_not_commit() {
        let vertex = vertex_on(qc(1, 0, &[1]), 2);
        assert_eq!(VoteData::for_vertex(&vertex, header(2)).committed, None);
    }

    #[test]
    fn test_weighted_timestamp_is_median() {
        assert_eq!(qc(1, 0, &[30, 10, 20]).weighted_timestamp(), Some(20));
        assert_eq!(qc(1, 0, &[]).weighted_timestamp(), None);
        assert_eq!(qc(1, 0, &[]).quorum_timestamp(), 0);
    }

    #[test]
    fn test_high_qc_normalises_certificates() {
        let tc_below = TimeoutCertificate {
            epoch: Epoch(0),
            view: View(3),
            signatures: vec![],
        };
        let high = HighQc::new(qc(3, 2, &[1]), qc(5, 4, &[1]), Some(tc_below));
        assert_eq!(high.highest_qc().view(), View(5));
        assert!(high.highest_tc().is_none());

        let tc_above = TimeoutCertificate {
            epoch: Epoch(0),
            view: View(9),
            signatures: vec![],
        };
        let high = HighQc::new(qc(8, 7, &[1]), qc(5, 4, &[1]), Some(tc_above));
        assert_eq!(high.highest_view(), View(9));
    }

    #[test]
    fn test_committed_and_ledger_proof() {
        assert!(qc(2, 1, &[1]).committed_and_ledger_proof().is_none());

        let mut committing = qc(5, 4, &[1, 2]);
        committing.vote_data.committed = Some(header(3));
        let (committed, proof) = committing.committed_and_ledger_proof().unwrap();
        assert_eq!(committed, header(3));
        assert_eq!(proof.opaque, committing.vote_data.hash());
        assert_eq!(proof.signing_hash(), committing.vote_data.signing_hash());
        assert_eq!(proof.signers().count(), 2);
    }
}
