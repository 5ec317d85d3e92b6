//! Decrypt, count and sign an election's ballots
//!
//! One bad ballot never blocks a tally: decryption and lookup failures are
//! recorded per ballot and reported next to the counts. The counts are signed
//! with the system authority key, not the election key, so anyone holding the
//! published authority public key can check any election's result.

use chrono::{DateTime, Utc};
use ed25519_dalek::VerifyingKey;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::crypto::hybrid::HybridCipher;
use crate::crypto::keys::{ElectionPrivateKey, ElectionPublicKey};
use crate::crypto::short_id;
use crate::crypto::signature::{SignatureService, SystemAuthority};
use crate::types::{Ballot, BallotFailure, CandidateRegistry, FailureReason, TallyResult};
use crate::{Error, Result};

/// Stateless tally computation
pub struct TallyEngine;

enum Rejection {
    Decrypt(Error),
    Invalid(FailureReason),
}

impl TallyEngine {
    /// Tally a snapshot of ballots
    ///
    /// The election key is consumed and dropped (zeroized) before the result
    /// is signed. Identical inputs give identical counts and signature.
    ///
    /// Fails with `IncompatibleKey` before touching any ballot when the
    /// private key is not the pair of the election's published key. Ballots
    /// whose wrapped key cannot be opened are per-ballot failures.
    pub fn tally(
        ballots: &[Ballot],
        election_key: ElectionPrivateKey,
        published_key: &ElectionPublicKey,
        registry: &CandidateRegistry,
        authority: &SystemAuthority,
    ) -> Result<TallyResult> {
        if &election_key.public_key() != published_key {
            tracing::error!(
                "Tally rejected: supplied key does not match the published key of election {}",
                registry.election_id
            );
            return Err(Error::incompatible_key(
                "private key does not match the election's published key",
            ));
        }

        let mut counts_by_candidate: BTreeMap<String, u64> = BTreeMap::new();
        let mut failures = Vec::new();

        for (index, ballot) in ballots.iter().enumerate() {
            match Self::count_ballot(ballot, &election_key, registry) {
                Ok(name) => *counts_by_candidate.entry(name.to_string()).or_insert(0) += 1,
                Err(Rejection::Decrypt(err)) => {
                    if !err.is_ballot_local() {
                        return Err(err);
                    }
                    tracing::warn!(
                        "Ballot {} (owner={}) could not be decrypted: {}",
                        index,
                        short_id(&ballot.owner_id),
                        err
                    );
                    failures.push(BallotFailure {
                        index,
                        owner_id: ballot.owner_id.clone(),
                        reason: FailureReason::Decryption(err.to_string()),
                    });
                }
                Err(Rejection::Invalid(reason)) => {
                    tracing::warn!(
                        "Ballot {} (owner={}) excluded: {:?}",
                        index,
                        short_id(&ballot.owner_id),
                        reason
                    );
                    failures.push(BallotFailure {
                        index,
                        owner_id: ballot.owner_id.clone(),
                        reason,
                    });
                }
            }
        }
        drop(election_key);

        let signature = authority.sign(&counts_by_candidate)?;
        let failure_count = failures.len();

        tracing::info!(
            "📊 Tally complete: election={}, ballots={}, counted={}, failures={}",
            registry.election_id,
            ballots.len(),
            ballots.len() - failure_count,
            failure_count
        );

        Ok(TallyResult {
            counts_by_candidate,
            signature,
            failure_count,
            failures,
        })
    }

    fn count_ballot<'r>(
        ballot: &Ballot,
        election_key: &ElectionPrivateKey,
        registry: &'r CandidateRegistry,
    ) -> std::result::Result<&'r str, Rejection> {
        if ballot.election_id != registry.election_id {
            return Err(Rejection::Invalid(FailureReason::ElectionMismatch));
        }

        let payload: Value =
            HybridCipher::decrypt(&ballot.envelope, election_key).map_err(Rejection::Decrypt)?;

        let payload_election = payload
            .get("election_id")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok());
        if payload_election != Some(registry.election_id) {
            return Err(Rejection::Invalid(FailureReason::ElectionMismatch));
        }

        let candidate_id = match payload.get("candidate_id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(Rejection::Invalid(FailureReason::MissingCandidate)),
        };

        registry
            .name_of(&candidate_id)
            .ok_or(Rejection::Invalid(FailureReason::UnknownCandidate(candidate_id)))
    }
}

impl TallyResult {
    /// Check the authority signature over the counts
    pub fn verify(&self, authority_key: &VerifyingKey) -> bool {
        SignatureService::verify(&self.counts_by_candidate, &self.signature, authority_key)
    }
}

/// A computed tally and when it was produced
#[derive(Debug, Clone, PartialEq)]
pub struct TallyRecord {
    pub result: TallyResult,
    pub tallied_at: DateTime<Utc>,
}

/// Tally lifecycle of one election. `Tallied` is terminal for the snapshot
/// and key it was computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TallyState<'a> {
    Untallied,
    Tallied(&'a TallyRecord),
}

/// Per-election tally holder for callers that re-serve cached results
///
/// Holds the election's published key so every run checks the supplied
/// private key against it. Concurrent runs for the same election must be
/// serialized by the caller.
#[derive(Debug, Clone)]
pub struct ElectionTally {
    election_id: Uuid,
    published_key: ElectionPublicKey,
    latest: Option<TallyRecord>,
}

impl ElectionTally {
    pub fn new(election_id: Uuid, published_key: ElectionPublicKey) -> Self {
        Self {
            election_id,
            published_key,
            latest: None,
        }
    }

    pub fn election_id(&self) -> Uuid {
        self.election_id
    }

    pub fn state(&self) -> TallyState<'_> {
        match &self.latest {
            Some(record) => TallyState::Tallied(record),
            None => TallyState::Untallied,
        }
    }

    /// Previously computed result, if any
    pub fn cached(&self) -> Option<&TallyResult> {
        self.latest.as_ref().map(|record| &record.result)
    }

    /// Run a fresh tally and record it
    ///
    /// Always recomputes; presenting the key again is an explicit re-trigger.
    /// On error the previous state is kept.
    pub fn run(
        &mut self,
        ballots: &[Ballot],
        election_key: ElectionPrivateKey,
        registry: &CandidateRegistry,
        authority: &SystemAuthority,
    ) -> Result<&TallyResult> {
        if registry.election_id != self.election_id {
            return Err(Error::internal(format!(
                "registry for election {} used to tally election {}",
                registry.election_id, self.election_id
            )));
        }

        let result = TallyEngine::tally(
            ballots,
            election_key,
            &self.published_key,
            registry,
            authority,
        )?;
        let record = self.latest.insert(TallyRecord {
            result,
            tallied_at: Utc::now(),
        });
        Ok(&record.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{election_keys, election_private_pem};
    use crate::types::{HybridEnvelope, VoteData};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    struct Fixture {
        election_id: Uuid,
        registry: CandidateRegistry,
        authority: SystemAuthority,
    }

    fn fixture() -> Fixture {
        let election_id = Uuid::new_v4();
        Fixture {
            election_id,
            registry: CandidateRegistry::new(election_id)
                .with_candidate("a", "A")
                .with_candidate("b", "B"),
            authority: SystemAuthority::generate(),
        }
    }

    fn vote_for(candidate: &str, election_id: Uuid, owner: &str) -> Ballot {
        let (public, _) = election_keys();
        Ballot {
            owner_id: owner.to_string(),
            election_id,
            envelope: HybridCipher::encrypt(&VoteData::new(candidate, election_id), &public)
                .unwrap(),
            voter_signature: None,
        }
    }

    fn key() -> ElectionPrivateKey {
        ElectionPrivateKey::from_pem(election_private_pem()).unwrap()
    }

    fn published() -> ElectionPublicKey {
        election_keys().0
    }

    #[test]
    fn test_empty_election_is_signed() {
        let f = fixture();
        let result =
            TallyEngine::tally(&[], key(), &published(), &f.registry, &f.authority).unwrap();

        assert!(result.counts_by_candidate.is_empty());
        assert_eq!(result.failure_count, 0);
        assert_eq!(result.canonical_counts().unwrap(), b"{}");
        assert!(result.verify(&f.authority.verifying_key()));
        assert!(f.authority.verify(&BTreeMap::<String, u64>::new(), &result.signature));
    }

    #[test]
    fn test_counts_by_candidate_name() {
        let f = fixture();
        let ballots = vec![
            vote_for("a", f.election_id, "v1"),
            vote_for("b", f.election_id, "v2"),
            vote_for("a", f.election_id, "v3"),
        ];

        let result =
            TallyEngine::tally(&ballots, key(), &published(), &f.registry, &f.authority).unwrap();
        assert_eq!(result.counts_by_candidate.get("A"), Some(&2));
        assert_eq!(result.counts_by_candidate.get("B"), Some(&1));
        assert_eq!(result.failure_count, 0);
        assert_eq!(result.canonical_counts().unwrap(), br#"{"A":2,"B":1}"#.to_vec());
        assert!(result.verify(&f.authority.verifying_key()));
    }

    #[test]
    fn test_corrupted_tag_is_counted_as_failure() {
        let f = fixture();
        let mut bad = vote_for("b", f.election_id, "v2");
        let mut tag = STANDARD.decode(&bad.envelope.tag).unwrap();
        tag[0] ^= 0xff;
        bad.envelope.tag = STANDARD.encode(tag);

        let ballots = vec![
            vote_for("a", f.election_id, "v1"),
            bad,
            vote_for("a", f.election_id, "v3"),
        ];

        let result =
            TallyEngine::tally(&ballots, key(), &published(), &f.registry, &f.authority).unwrap();
        assert_eq!(result.counts_by_candidate.get("A"), Some(&2));
        assert_eq!(result.counts_by_candidate.get("B"), None);
        assert_eq!(result.failure_count, 1);
        assert_eq!(result.failures[0].index, 1);
        assert_eq!(result.failures[0].owner_id, "v2");
        assert!(matches!(result.failures[0].reason, FailureReason::Decryption(_)));
    }

    #[test]
    fn test_malformed_and_foreign_ballots() {
        let f = fixture();
        let mut malformed = vote_for("a", f.election_id, "m");
        malformed.envelope = HybridEnvelope {
            encrypted_key: String::new(),
            iv: String::new(),
            ciphertext: String::new(),
            tag: String::new(),
        };
        let foreign = vote_for("a", Uuid::new_v4(), "f");
        let unknown = vote_for("zzz", f.election_id, "u");

        let ballots = vec![malformed, foreign, unknown, vote_for("b", f.election_id, "ok")];
        let result =
            TallyEngine::tally(&ballots, key(), &published(), &f.registry, &f.authority).unwrap();

        assert_eq!(result.total_votes(), 1);
        assert_eq!(result.failure_count, 3);
        assert_eq!(result.failures[1].reason, FailureReason::ElectionMismatch);
        assert_eq!(
            result.failures[2].reason,
            FailureReason::UnknownCandidate("zzz".to_string())
        );
    }

    #[test]
    fn test_payload_without_candidate() {
        let f = fixture();
        let (public, _) = election_keys();
        let payload = serde_json::json!({"election_id": f.election_id});
        let ballot = Ballot {
            owner_id: "x".to_string(),
            election_id: f.election_id,
            envelope: HybridCipher::encrypt(&payload, &public).unwrap(),
            voter_signature: None,
        };

        let result =
            TallyEngine::tally(&[ballot], key(), &published(), &f.registry, &f.authority).unwrap();
        assert_eq!(result.failures[0].reason, FailureReason::MissingCandidate);
    }

    #[test]
    fn test_numeric_candidate_ids_accepted() {
        let f = fixture();
        let (public, _) = election_keys();
        let registry = f.registry.clone().with_candidate("17", "Numeric");
        let payload = serde_json::json!({"candidate_id": 17, "election_id": f.election_id});
        let ballot = Ballot {
            owner_id: "n".to_string(),
            election_id: f.election_id,
            envelope: HybridCipher::encrypt(&payload, &public).unwrap(),
            voter_signature: None,
        };

        let result =
            TallyEngine::tally(&[ballot], key(), &published(), &registry, &f.authority).unwrap();
        assert_eq!(result.counts_by_candidate.get("Numeric"), Some(&1));
    }

    #[test]
    fn test_repeat_tally_is_identical() {
        let f = fixture();
        let ballots = vec![
            vote_for("b", f.election_id, "v1"),
            vote_for("a", f.election_id, "v2"),
        ];

        let first =
            TallyEngine::tally(&ballots, key(), &published(), &f.registry, &f.authority).unwrap();
        let second =
            TallyEngine::tally(&ballots, key(), &published(), &f.registry, &f.authority).unwrap();
        assert_eq!(first.canonical_counts().unwrap(), second.canonical_counts().unwrap());
        assert_eq!(first.signature, second.signature);
        assert!(first.verify(&f.authority.verifying_key()));
        assert!(second.verify(&f.authority.verifying_key()));
    }

    #[test]
    fn test_key_not_matching_published_key_aborts() {
        let f = fixture();
        let ballots = vec![vote_for("a", f.election_id, "v1")];

        let other = crate::crypto::keys::ElectionKeyMaterial::generate(2048).unwrap();
        let (other_public, other_pem) = other.into_parts();
        let wrong = ElectionPrivateKey::from_pem(&other_pem).unwrap();

        assert!(matches!(
            TallyEngine::tally(&ballots, wrong, &published(), &f.registry, &f.authority),
            Err(Error::IncompatibleKey { .. })
        ));
        assert!(matches!(
            TallyEngine::tally(&ballots, key(), &other_public, &f.registry, &f.authority),
            Err(Error::IncompatibleKey { .. })
        ));
    }

    #[test]
    fn test_single_ballot_with_corrupt_wrapped_key_is_still_signed() {
        let f = fixture();
        let mut ballot = vote_for("a", f.election_id, "only");
        let mut wrapped = STANDARD.decode(&ballot.envelope.encrypted_key).unwrap();
        wrapped[5] ^= 0xff;
        ballot.envelope.encrypted_key = STANDARD.encode(wrapped);

        let result =
            TallyEngine::tally(&[ballot], key(), &published(), &f.registry, &f.authority).unwrap();
        assert!(result.counts_by_candidate.is_empty());
        assert_eq!(result.failure_count, 1);
        assert_eq!(result.failures[0].owner_id, "only");
        assert!(matches!(result.failures[0].reason, FailureReason::Decryption(_)));
        assert!(result.verify(&f.authority.verifying_key()));
    }

    #[test]
    fn test_election_tally_state() {
        let f = fixture();
        let mut tally = ElectionTally::new(f.election_id, published());
        assert_eq!(tally.state(), TallyState::Untallied);
        assert!(tally.cached().is_none());

        let ballots = vec![vote_for("a", f.election_id, "v1")];
        let signature = tally
            .run(&ballots, key(), &f.registry, &f.authority)
            .unwrap()
            .signature
            .clone();

        let cached = tally.cached().unwrap();
        assert_eq!(cached.signature, signature);
        assert_eq!(cached.total_votes(), 1);
        assert!(matches!(tally.state(), TallyState::Tallied(record) if record.result.signature == signature));

        let other_registry = CandidateRegistry::new(Uuid::new_v4());
        assert!(tally.run(&ballots, key(), &other_registry, &f.authority).is_err());
        assert!(tally.cached().is_some());
    }
}
