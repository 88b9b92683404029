//! The validators of an epoch and certificate verification against them.

use crate::{
    vertex_vote_message, view_timeout_message, HighQc, LedgerProof, PublicKey, QuorumCertificate,
    TimeoutCertificate, TimestampedSignature, ValidatorId,
};
use std::collections::{BTreeMap, BTreeSet};

/// Why a certificate failed verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CertificateError {
    #[error("{0} is not a validator")]
    UnknownSigner(ValidatorId),

    #[error("{0} signed more than once")]
    DuplicateSigner(ValidatorId),

    #[error("signature of {0} does not verify")]
    InvalidSignature(ValidatorId),

    #[error("{signers} signers do not reach a quorum of {quorum}")]
    NoQuorum { signers: usize, quorum: usize },
}

/// Public keys of the validators allowed to sign certificates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidatorSet {
    validators: BTreeMap<ValidatorId, PublicKey>,
}

impl ValidatorSet {
    pub fn new(validators: impl IntoIterator<Item = (ValidatorId, PublicKey)>) -> Self {
        Self {
            validators: validators.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn contains(&self, validator: ValidatorId) -> bool {
        self.validators.contains_key(&validator)
    }

    pub fn public_key(&self, validator: ValidatorId) -> Option<&PublicKey> {
        self.validators.get(&validator)
    }

    pub fn validators(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.validators.keys().copied()
    }

    /// Smallest number of signers forming a quorum (`n - f` with
    /// `f = (n - 1) / 3`). Never below one.
    pub fn quorum(&self) -> usize {
        let n = self.validators.len();
        (n - n.saturating_sub(1) / 3).max(1)
    }

    /// Verify a quorum certificate.
    ///
    /// The unsigned self-certifying QC of a genesis vertex is accepted.
    pub fn verify_qc(&self, qc: &QuorumCertificate) -> Result<(), CertificateError> {
        if qc.view().is_genesis() && qc.signatures.is_empty() {
            return Ok(());
        }
        let signing_hash = qc.vote_data.signing_hash();
        self.verify_quorum(&qc.signatures, |s| {
            vertex_vote_message(&signing_hash, s.timestamp_ms)
        })
    }

    pub fn verify_tc(&self, tc: &TimeoutCertificate) -> Result<(), CertificateError> {
        let message = view_timeout_message(tc.epoch, tc.view);
        self.verify_quorum(&tc.signatures, |_| message.clone())
    }

    /// Verify the signatures of a committed ledger proof.
    pub fn verify_ledger_proof(&self, proof: &LedgerProof) -> Result<(), CertificateError> {
        let signing_hash = proof.signing_hash();
        self.verify_quorum(&proof.signatures, |s| {
            vertex_vote_message(&signing_hash, s.timestamp_ms)
        })
    }

    /// Verify every certificate a HighQC carries.
    pub fn verify_high_qc(&self, high_qc: &HighQc) -> Result<(), CertificateError> {
        self.verify_qc(high_qc.highest_qc())?;
        self.verify_qc(high_qc.highest_committed_qc())?;
        if let Some(tc) = high_qc.highest_tc() {
            self.verify_tc(tc)?;
        }
        Ok(())
    }

    fn verify_quorum(
        &self,
        signatures: &[TimestampedSignature],
        message: impl Fn(&TimestampedSignature) -> Vec<u8>,
    ) -> Result<(), CertificateError> {
        let quorum = self.quorum();
        if signatures.len() < quorum {
            return Err(CertificateError::NoQuorum {
                signers: signatures.len(),
                quorum,
            });
        }

        let mut seen = BTreeSet::new();
        for signature in signatures {
            let key = self
                .validators
                .get(&signature.signer)
                .ok_or(CertificateError::UnknownSigner(signature.signer))?;
            if !seen.insert(signature.signer) {
                return Err(CertificateError::DuplicateSigner(signature.signer));
            }
            if !key.verify(&message(signature), &signature.signature) {
                return Err(CertificateError::InvalidSignature(signature.signer));
            }
        }
        Ok(())
    }
}
