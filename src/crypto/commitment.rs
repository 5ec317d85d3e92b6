//! Hash commitments to votes
//!
//! A commitment is `base64(SHA3-256(canonical({"nonce": nonce, "vote": vote})))`.
//! Storing only the hash hides the vote until reveal; recomputing it at reveal
//! binds the voter to what they committed to.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde::Serialize;
use sha3::{Digest, Sha3_256};

use crate::canonical::to_canonical_bytes;
use crate::crypto::{constant_time_eq, short_id};
use crate::types::{Commitment, CommitmentHash, CommitmentStatus, VoteData};
use crate::{Error, Result};

/// Longest nonce accepted, in bytes
pub const MAX_NONCE_LEN: usize = 256;

#[derive(Serialize)]
struct CommitmentPayload<'a> {
    vote: &'a VoteData,
    nonce: &'a str,
}

/// Commit/verify over SHA3-256
pub struct CommitmentScheme;

impl CommitmentScheme {
    /// Commit to a vote under a nonce
    pub fn commit(vote: &VoteData, nonce: &str) -> Result<CommitmentHash> {
        Self::check_nonce(nonce)?;
        let digest = Self::digest(vote, nonce)?;
        Ok(STANDARD.encode(digest))
    }

    /// Check a commitment against a claimed vote and nonce
    ///
    /// Any decoding problem is reported as a mismatch.
    pub fn verify(commitment_hash: &str, vote: &VoteData, nonce: &str) -> bool {
        let Ok(expected) = STANDARD.decode(commitment_hash) else {
            return false;
        };
        match Self::digest(vote, nonce) {
            Ok(actual) => constant_time_eq(&expected, &actual),
            Err(_) => false,
        }
    }

    fn digest(vote: &VoteData, nonce: &str) -> Result<[u8; 32]> {
        let bytes = to_canonical_bytes(&CommitmentPayload { vote, nonce })?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha3_256::digest(&bytes));
        Ok(out)
    }

    fn check_nonce(nonce: &str) -> Result<()> {
        if nonce.is_empty() {
            return Err(Error::InvalidNonce {
                reason: "nonce must not be empty".to_string(),
            });
        }
        if nonce.len() > MAX_NONCE_LEN {
            return Err(Error::InvalidNonce {
                reason: format!("nonce longer than {MAX_NONCE_LEN} bytes"),
            });
        }
        Ok(())
    }
}

impl Commitment {
    /// Open a new commitment for a voter
    pub fn open(owner_id: impl Into<String>, vote: &VoteData, nonce: &str) -> Result<Self> {
        let owner_id = owner_id.into();
        let commitment_hash = CommitmentScheme::commit(vote, nonce)?;

        tracing::info!(
            "🔏 Commitment opened: owner={}, election={}",
            short_id(&owner_id),
            vote.election_id
        );

        Ok(Self {
            owner_id,
            election_id: vote.election_id,
            commitment_hash,
            status: CommitmentStatus::Open,
            created_at: Utc::now(),
            revealed_at: None,
        })
    }

    /// Reveal the committed vote
    ///
    /// On success the commitment becomes `Revealed` and every later reveal
    /// attempt fails, matching or not.
    pub fn reveal(&mut self, vote: &VoteData, nonce: &str) -> Result<()> {
        self.check_reveal(vote, nonce)?;
        self.mark_revealed();
        Ok(())
    }

    /// Check a reveal without changing state
    pub fn check_reveal(&self, vote: &VoteData, nonce: &str) -> Result<()> {
        if self.is_revealed() {
            tracing::warn!(
                "Reveal rejected, commitment already revealed: owner={}",
                short_id(&self.owner_id)
            );
            return Err(Error::CommitmentAlreadyRevealed);
        }

        let election_matches = vote.election_id == self.election_id;
        let hash_matches = CommitmentScheme::verify(&self.commitment_hash, vote, nonce);
        if !(election_matches && hash_matches) {
            tracing::warn!(
                "Reveal rejected, commitment mismatch: owner={}",
                short_id(&self.owner_id)
            );
            return Err(Error::CommitmentMismatch);
        }

        Ok(())
    }

    pub(crate) fn mark_revealed(&mut self) {
        self.status = CommitmentStatus::Revealed;
        self.revealed_at = Some(Utc::now());
    }
}
