//! # Core Types for the Vote Engine
//!
//! The engine never persists anything. These are the values it hands to the
//! surrounding storage layer and accepts back from it: commitment hashes,
//! ballot envelopes and signed tallies, all as opaque strings.
//!
//! ## Type Categories
//!
//! ### Protocol values
//! - [`VoteData`]: the logical vote `{candidate_id, election_id}`
//! - [`Commitment`]: a voter's hidden, binding commitment to a vote
//! - [`HybridEnvelope`]: an RSA-OAEP wrapped, AES-256-GCM encrypted payload
//! - [`Ballot`]: a revealed vote in encrypted form
//!
//! ### Tally values
//! - [`CandidateRegistry`]: candidate ids accepted by an election
//! - [`TallyResult`]: signed per-candidate counts and failure report
//!
//! ## Usage Examples
//!
//! ```rust
//! use vote_engine::types::{CandidateRegistry, VoteData};
//! use uuid::Uuid;
//!
//! let election_id = Uuid::new_v4();
//! let registry = CandidateRegistry::new(election_id)
//!     .with_candidate("c-1", "Alice")
//!     .with_candidate("c-2", "Bob");
//!
//! let vote = VoteData::new("c-1", election_id);
//! assert_eq!(registry.name_of(&vote.candidate_id), Some("Alice"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::{Error, Result};

/// Base64 string of a SHA3-256 digest
pub type CommitmentHash = String;

/// Base64 string of an Ed25519 signature
pub type EncodedSignature = String;

/// The logical content of a vote
///
/// Binding the election id into the committed and encrypted value stops a
/// commitment or ballot from one election being replayed into another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteData {
    /// Candidate chosen by the voter
    pub candidate_id: String,

    /// Election the vote belongs to
    pub election_id: Uuid,
}

impl VoteData {
    /// Create vote data for a candidate in an election
    pub fn new(candidate_id: impl Into<String>, election_id: Uuid) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            election_id,
        }
    }
}

/// Lifecycle of a commitment. `Revealed` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommitmentStatus {
    /// Commitment stored, vote still hidden
    Open,
    /// Vote revealed and matched; never reopened
    Revealed,
}

/// A voter's commitment to a vote in one election
///
/// Only the hash is ever stored. The vote and nonce stay with the voter
/// until reveal time. Exactly one commitment per (owner, election) is the
/// storage layer's job; the engine only guards the `Open -> Revealed`
/// transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Commitment {
    /// Opaque identifier of the committing voter
    pub owner_id: String,

    /// Election the commitment was made in
    pub election_id: Uuid,

    /// Base64 SHA3-256 digest of the canonical `{nonce, vote}` value
    pub commitment_hash: CommitmentHash,

    /// Current lifecycle state
    pub status: CommitmentStatus,

    /// When the commitment was created
    pub created_at: DateTime<Utc>,

    /// When the commitment was revealed, if it has been
    pub revealed_at: Option<DateTime<Utc>>,
}

impl Commitment {
    /// Whether the commitment has been revealed
    pub fn is_revealed(&self) -> bool {
        self.status == CommitmentStatus::Revealed
    }
}

/// Hybrid ciphertext envelope
///
/// All four fields are standard base64. The JSON field names are the storage
/// format and must not change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HybridEnvelope {
    /// AES key wrapped with RSA-OAEP (SHA-256, MGF1-SHA-256)
    pub encrypted_key: String,

    /// 128-bit GCM initialization vector
    pub iv: String,

    /// AES-256-GCM ciphertext without the tag
    pub ciphertext: String,

    /// 128-bit GCM authentication tag
    pub tag: String,
}

impl HybridEnvelope {
    /// Serialize the envelope for storage
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored envelope. Missing or non-string fields are malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::malformed(e.to_string()))
    }
}

/// An encrypted, revealed vote
///
/// Created once per (owner, election) at a successful reveal and never
/// updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ballot {
    /// Opaque identifier of the voter who cast the ballot
    pub owner_id: String,

    /// Election the ballot was cast in
    pub election_id: Uuid,

    /// Encrypted vote
    pub envelope: HybridEnvelope,

    /// Optional voter signature over the canonical `{election_id, envelope, owner_id}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_signature: Option<EncodedSignature>,
}

/// The part of a ballot a voter signs
#[derive(Serialize)]
pub(crate) struct BallotSigningPayload<'a> {
    pub owner_id: &'a str,
    pub election_id: &'a Uuid,
    pub envelope: &'a HybridEnvelope,
}

impl Ballot {
    pub(crate) fn signing_payload(&self) -> BallotSigningPayload<'_> {
        BallotSigningPayload {
            owner_id: &self.owner_id,
            election_id: &self.election_id,
            envelope: &self.envelope,
        }
    }
}

/// Candidates an election accepts at tally time, keyed by candidate id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateRegistry {
    /// Election the registry belongs to
    pub election_id: Uuid,

    /// candidate id -> display name
    pub candidates: HashMap<String, String>,
}

impl CandidateRegistry {
    /// Create an empty registry for an election
    pub fn new(election_id: Uuid) -> Self {
        Self {
            election_id,
            candidates: HashMap::new(),
        }
    }

    /// Builder-style insert
    pub fn with_candidate(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.insert(id, name);
        self
    }

    /// Register a candidate
    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.candidates.insert(id.into(), name.into());
    }

    /// Display name for a candidate id
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.candidates.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Why a single ballot was left out of a tally
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureReason {
    /// Envelope could not be decrypted (tampered, malformed or unwrappable)
    Decryption(String),
    /// Decrypted payload has no usable `candidate_id`
    MissingCandidate,
    /// `candidate_id` is not in the registry for this election
    UnknownCandidate(String),
    /// Ballot or payload belongs to a different election
    ElectionMismatch,
}

/// A ballot excluded from the count
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BallotFailure {
    /// Position of the ballot in the tallied snapshot
    pub index: usize,

    /// Owner of the failed ballot
    pub owner_id: String,

    pub reason: FailureReason,
}

/// Signed election result
///
/// `signature` is the system authority's Ed25519 signature over the canonical
/// encoding of `counts_by_candidate` alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TallyResult {
    /// candidate name -> vote count, ordered by name
    pub counts_by_candidate: BTreeMap<String, u64>,

    /// Base64 Ed25519 signature over the canonical counts
    pub signature: EncodedSignature,

    /// Number of ballots excluded from the count
    pub failure_count: usize,

    /// Per-ballot details for operators
    pub failures: Vec<BallotFailure>,
}

impl TallyResult {
    /// Canonical bytes of the counts, exactly as signed
    pub fn canonical_counts(&self) -> Result<Vec<u8>> {
        crate::canonical::to_canonical_bytes(&self.counts_by_candidate)
    }

    /// Total number of counted ballots
    pub fn total_votes(&self) -> u64 {
        self.counts_by_candidate.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let election_id = Uuid::new_v4();
        let registry = CandidateRegistry::new(election_id)
            .with_candidate("1", "Alice")
            .with_candidate("2", "Bob");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.name_of("2"), Some("Bob"));
        assert_eq!(registry.name_of("3"), None);
    }

    #[test]
    fn test_envelope_json_field_names() {
        let envelope = HybridEnvelope {
            encrypted_key: "a".to_string(),
            iv: "b".to_string(),
            ciphertext: "c".to_string(),
            tag: "d".to_string(),
        };
        let json = envelope.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for field in ["encrypted_key", "iv", "ciphertext", "tag"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(HybridEnvelope::from_json(&json).unwrap(), envelope);
    }

    #[test]
    fn test_envelope_missing_field_is_malformed() {
        let err = HybridEnvelope::from_json(r#"{"encrypted_key":"a","iv":"b","ciphertext":"c"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedEnvelope { .. }));

        let err = HybridEnvelope::from_json("not json").unwrap_err();
        assert!(matches!(err, Error::MalformedEnvelope { .. }));
    }

    #[test]
    fn test_tally_result_totals() {
        let mut counts = BTreeMap::new();
        counts.insert("Bob".to_string(), 1);
        counts.insert("Alice".to_string(), 2);
        let result = TallyResult {
            counts_by_candidate: counts,
            signature: String::new(),
            failure_count: 0,
            failures: Vec::new(),
        };
        assert_eq!(result.total_votes(), 3);
        assert_eq!(result.canonical_counts().unwrap(), br#"{"Alice":2,"Bob":1}"#.to_vec());
    }

    #[test]
    fn test_ballot_without_signature_omits_field() {
        let ballot = Ballot {
            owner_id: "voter-1".to_string(),
            election_id: Uuid::new_v4(),
            envelope: HybridEnvelope {
                encrypted_key: "k".to_string(),
                iv: "i".to_string(),
                ciphertext: "c".to_string(),
                tag: "t".to_string(),
            },
            voter_signature: None,
        };
        let json = serde_json::to_string(&ballot).unwrap();
        assert!(!json.contains("voter_signature"));
        let back: Ballot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ballot);
    }
}
