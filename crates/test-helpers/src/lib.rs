//! Test fixtures for the quorum ledger node.
//!
//! Provides a committee of deterministic keys that signs real quorum and
//! timeout certificates, plus builders for genesis and child vertices.

use quorum_types::{
    ledger_signing_hash, vertex_vote_message, view_timeout_message, AccumulatorState, BftHeader,
    Command, Epoch, Hash, KeyPair, LedgerHeader, LedgerProof, PublicKey, QuorumCertificate,
    TimeoutCertificate, TimestampedSignature, ValidatorId, ValidatorSet, Vertex, View, VoteData,
};

/// Timestamp of the genesis ledger header used by every fixture.
pub const GENESIS_TIMESTAMP_MS: u64 = 1_000;

/// A committee of `3f + 1` validators with deterministic keys.
#[derive(Debug, Clone)]
pub struct TestCommittee {
    keys: Vec<KeyPair>,
}

impl TestCommittee {
    /// Create `size` validators, with ids `0..size`, keyed from `seed`.
    pub fn new(size: usize, seed: u64) -> Self {
        let keys = (0..size as u64)
            .map(|i| {
                let mut key_seed = [0u8; 32];
                key_seed[..8].copy_from_slice(&seed.to_le_bytes());
                key_seed[8..16].copy_from_slice(&i.to_le_bytes());
                KeyPair::from_seed(&key_seed)
            })
            .collect();
        Self { keys }
    }

    pub fn size(&self) -> usize {
        self.keys.len()
    }

    pub fn validators(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        (0..self.keys.len() as u64).map(ValidatorId)
    }

    /// Smallest number of signers forming a quorum (`2f + 1`).
    pub fn quorum(&self) -> usize {
        let faulty = self.keys.len().saturating_sub(1) / 3;
        self.keys.len() - faulty
    }

    pub fn public_key(&self, validator: ValidatorId) -> Option<PublicKey> {
        self.keys.get(validator.0 as usize).map(KeyPair::public_key)
    }

    /// The committee as replicas verify it.
    pub fn validator_set(&self) -> ValidatorSet {
        ValidatorSet::new(
            self.validators()
                .zip(self.keys.iter())
                .map(|(id, key)| (id, key.public_key())),
        )
    }

    /// Sign `vote_data` with the first quorum of validators.
    pub fn sign_qc(&self, vote_data: VoteData, timestamp_ms: u64) -> QuorumCertificate {
        let signers: Vec<ValidatorId> = self.validators().take(self.quorum()).collect();
        self.sign_qc_by(vote_data, timestamp_ms, &signers)
    }

    /// Sign `vote_data` with exactly `signers`.
    pub fn sign_qc_by(
        &self,
        vote_data: VoteData,
        timestamp_ms: u64,
        signers: &[ValidatorId],
    ) -> QuorumCertificate {
        let message = vertex_vote_message(&vote_data.signing_hash(), timestamp_ms);
        let signatures = signers
            .iter()
            .filter_map(|signer| {
                let key = self.keys.get(signer.0 as usize)?;
                Some(TimestampedSignature {
                    signer: *signer,
                    timestamp_ms,
                    signature: key.sign(&message),
                })
            })
            .collect();
        QuorumCertificate::new(vote_data, signatures)
    }

    /// Certify `vertex`, whose prepared header is `header`.
    pub fn certify(
        &self,
        vertex: &Vertex,
        header: BftHeader,
        timestamp_ms: u64,
    ) -> QuorumCertificate {
        self.sign_qc(VoteData::for_vertex(vertex, header), timestamp_ms)
    }

    /// Ledger proof of `ledger_header`, signed by the first quorum.
    pub fn sign_ledger_proof(&self, ledger_header: LedgerHeader, timestamp_ms: u64) -> LedgerProof {
        let opaque = Hash::from_parts(&[
            b"ledger_proof".as_slice(),
            &ledger_header.state_version().to_le_bytes(),
        ]);
        let message =
            vertex_vote_message(&ledger_signing_hash(&opaque, &ledger_header), timestamp_ms);
        let signatures = self
            .keys
            .iter()
            .zip(self.validators())
            .take(self.quorum())
            .map(|(key, signer)| TimestampedSignature {
                signer,
                timestamp_ms,
                signature: key.sign(&message),
            })
            .collect();
        LedgerProof {
            opaque,
            ledger_header,
            signatures,
        }
    }

    /// Timeout certificate for `view`, signed by the first quorum.
    pub fn sign_tc(&self, epoch: Epoch, view: View, timestamp_ms: u64) -> TimeoutCertificate {
        let message = view_timeout_message(epoch, view);
        let signatures = self
            .keys
            .iter()
            .zip(self.validators())
            .take(self.quorum())
            .map(|(key, signer)| TimestampedSignature {
                signer,
                timestamp_ms,
                signature: key.sign(&message),
            })
            .collect();
        TimeoutCertificate {
            epoch,
            view,
            signatures,
        }
    }
}

/// Ledger header every fixture starts from.
pub fn genesis_header() -> LedgerHeader {
    LedgerHeader::genesis(AccumulatorState::genesis(), GENESIS_TIMESTAMP_MS)
}

/// Proof of the genesis header.
pub fn genesis_proof() -> LedgerProof {
    LedgerProof::genesis(genesis_header())
}

/// Genesis vertex and its self-certifying QC.
pub fn genesis() -> (Vertex, QuorumCertificate) {
    let header = genesis_header();
    let vertex = Vertex::genesis(header.clone());
    let qc = QuorumCertificate::of_genesis(&vertex, header);
    (vertex, qc)
}

/// A vertex at `view` justified by `qc`.
pub fn child(
    qc: &QuorumCertificate,
    view: u64,
    proposer: ValidatorId,
    commands: Vec<Command>,
) -> Vertex {
    Vertex {
        epoch: qc.epoch(),
        qc: qc.clone(),
        view: View(view),
        commands,
        proposer: Some(proposer),
        timestamp_ms: GENESIS_TIMESTAMP_MS + view * 1_000,
    }
}

/// `count` distinct commands tagged with `tag`.
pub fn commands(tag: &str, count: usize) -> Vec<Command> {
    (0..count)
        .map(|i| Command::new(format!("{tag}-{i}").into_bytes()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_size() {
        assert_eq!(TestCommittee::new(4, 0).quorum(), 3);
        assert_eq!(TestCommittee::new(7, 0).quorum(), 5);
        assert_eq!(TestCommittee::new(1, 0).quorum(), 1);
    }

    #[test]
    fn test_qc_signatures_verify() {
        let committee = TestCommittee::new(4, 9);
        let (genesis, genesis_qc) = genesis();
        let vertex = child(&genesis_qc, 1, ValidatorId(1), commands("a", 2));
        let ledger_header = genesis.qc.proposed().ledger_header.clone();
        let header = BftHeader::new(vertex.view, vertex.id(), ledger_header);

        let qc = committee.certify(&vertex, header, 5_000);

        assert_eq!(qc.signatures.len(), 3);
        let message = vertex_vote_message(&qc.vote_data.signing_hash(), 5_000);
        for signature in &qc.signatures {
            let key = committee.public_key(signature.signer).unwrap();
            assert!(key.verify(&message, &signature.signature));
        }
        assert_eq!(committee.validator_set().verify_qc(&qc), Ok(()));
    }

    #[test]
    fn test_signed_ledger_proof_verifies() {
        let committee = TestCommittee::new(4, 3);
        let proof = committee.sign_ledger_proof(genesis_header(), 2_000);

        assert_eq!(committee.validator_set().verify_ledger_proof(&proof), Ok(()));
        assert!(TestCommittee::new(4, 4)
            .validator_set()
            .verify_ledger_proof(&proof)
            .is_err());
    }

    #[test]
    fn test_keys_are_deterministic() {
        let a = TestCommittee::new(4, 1);
        let b = TestCommittee::new(4, 1);
        let c = TestCommittee::new(4, 2);
        assert_eq!(a.public_key(ValidatorId(3)), b.public_key(ValidatorId(3)));
        assert_ne!(a.public_key(ValidatorId(3)), c.public_key(ValidatorId(3)));
    }
}
