//! Commit and reveal-to-ballot workflow
//!
//! A voter first commits to a vote with a random nonce. At reveal the
//! commitment is checked, the vote is encrypted under the election key, and
//! only then is the commitment marked revealed, so a failed encryption leaves
//! the voter free to try again.

use crate::config::MIN_NONCE_BYTES;
use crate::crypto::hybrid::HybridCipher;
use crate::crypto::keys::ElectionPublicKey;
use crate::crypto::random::SecureRandom;
use crate::crypto::short_id;
use crate::types::{Ballot, CandidateRegistry, Commitment, VoteData};
use crate::{Error, Result};

/// Builds commitments and ballots for the storage layer
pub struct BallotCaster;

impl BallotCaster {
    /// Commit to a vote under a freshly generated nonce
    ///
    /// Returns the commitment to store and the nonce the voter must keep
    /// until reveal. `nonce_bytes` below [`MIN_NONCE_BYTES`] is rejected.
    pub fn commit(
        owner_id: impl Into<String>,
        vote: &VoteData,
        nonce_bytes: usize,
    ) -> Result<(Commitment, String)> {
        if nonce_bytes < MIN_NONCE_BYTES {
            return Err(Error::InvalidNonce {
                reason: format!(
                    "nonce needs at least {MIN_NONCE_BYTES} random bytes, got {nonce_bytes}"
                ),
            });
        }

        let nonce = SecureRandom::nonce(nonce_bytes);
        let commitment = Commitment::open(owner_id, vote, &nonce)?;
        Ok((commitment, nonce))
    }

    /// Reveal a commitment and produce the encrypted ballot
    ///
    /// The candidate must be registered for the election at cast time.
    pub fn cast(
        commitment: &mut Commitment,
        vote: &VoteData,
        nonce: &str,
        registry: &CandidateRegistry,
        election_key: &ElectionPublicKey,
    ) -> Result<Ballot> {
        commitment.check_reveal(vote, nonce)?;

        if registry.election_id != vote.election_id || registry.name_of(&vote.candidate_id).is_none()
        {
            return Err(Error::UnknownCandidate {
                candidate_id: vote.candidate_id.clone(),
            });
        }

        let envelope = HybridCipher::encrypt(vote, election_key)?;
        commitment.mark_revealed();

        tracing::info!(
            "🗳️  Ballot cast: owner={}, election={}",
            short_id(&commitment.owner_id),
            commitment.election_id
        );

        Ok(Ballot {
            owner_id: commitment.owner_id.clone(),
            election_id: commitment.election_id,
            envelope,
            voter_signature: None,
        })
    }
}
