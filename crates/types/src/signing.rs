//! Domain-separated signing messages.
//!
//! Every signed payload is prefixed with a tag identifying its purpose, so a
//! signature produced in one context can never be replayed in another.
//!
//! | Tag | Purpose |
//! |-----|---------|
//! | `vertex_vote:` | Votes aggregated into a quorum certificate |
//! | `view_timeout:` | Timeout votes aggregated into a timeout certificate |

use crate::{Epoch, Hash, LedgerHeader, View};
use sbor::prelude::*;

/// Domain tag for vertex votes.
///
/// Format: `vertex_vote:` || vote_data_hash || timestamp_ms
pub const DOMAIN_VERTEX_VOTE: &[u8] = b"vertex_vote:";

/// Domain tag for view timeouts.
///
/// Format: `view_timeout:` || epoch || view
pub const DOMAIN_VIEW_TIMEOUT: &[u8] = b"view_timeout:";

/// Build the signing message for a vote on the given vote data.
///
/// The timestamp is part of the signed content so that the quorum's weighted
/// timestamp cannot be forged after the fact.
pub fn vertex_vote_message(vote_data_hash: &Hash, timestamp_ms: u64) -> Vec<u8> {
    let mut message = Vec::with_capacity(DOMAIN_VERTEX_VOTE.len() + 40);
    message.extend_from_slice(DOMAIN_VERTEX_VOTE);
    message.extend_from_slice(vote_data_hash.as_bytes());
    message.extend_from_slice(&timestamp_ms.to_le_bytes());
    message
}

/// Hash a quorum signs for the vote data hashed to `opaque`, bound to the
/// ledger header it proves.
///
/// A [`LedgerProof`](crate::LedgerProof) carries only `opaque` and the header,
/// so its signatures can be checked without the vote data.
pub fn ledger_signing_hash(opaque: &Hash, ledger_header: &LedgerHeader) -> Hash {
    let header =
        basic_encode(ledger_header).expect("LedgerHeader serialization should never fail");
    Hash::from_parts(&[opaque.as_bytes().as_slice(), header.as_slice()])
}

/// Build the signing message for a timeout of `view` in `epoch`.
pub fn view_timeout_message(epoch: Epoch, view: View) -> Vec<u8> {
    let mut message = Vec::with_capacity(DOMAIN_VIEW_TIMEOUT.len() + 16);
    message.extend_from_slice(DOMAIN_VIEW_TIMEOUT);
    message.extend_from_slice(&epoch.0.to_le_bytes());
    message.extend_from_slice(&view.0.to_le_bytes());
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_message_binds_timestamp() {
        let hash = Hash::from_bytes(b"vote_data");

        let msg1 = vertex_vote_message(&hash, 10);
        let msg2 = vertex_vote_message(&hash, 10);
        let msg3 = vertex_vote_message(&hash, 11);

        assert_eq!(msg1, msg2);
        assert_ne!(msg1, msg3);
        assert!(msg1.starts_with(DOMAIN_VERTEX_VOTE));
    }

    #[test]
    fn test_ledger_signing_hash_binds_header() {
        let header = LedgerHeader::genesis(crate::AccumulatorState::genesis(), 0);
        let later = header.with_view_and_timestamp(View(1), 0);
        let opaque = Hash::from_bytes(b"vote_data");

        assert_eq!(
            ledger_signing_hash(&opaque, &header),
            ledger_signing_hash(&opaque, &header)
        );
        assert_ne!(
            ledger_signing_hash(&opaque, &header),
            ledger_signing_hash(&opaque, &later)
        );
    }

    #[test]
    fn test_different_domains_produce_different_messages() {
        let vote = vertex_vote_message(&Hash::ZERO, 0);
        let timeout = view_timeout_message(Epoch(0), View(0));
        assert_ne!(vote, timeout);
        assert!(timeout.starts_with(DOMAIN_VIEW_TIMEOUT));
    }
}
