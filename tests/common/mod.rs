//! Shared fixtures for integration tests

use std::sync::OnceLock;
use uuid::Uuid;
use vote_engine::config::SecurityConfig;
use vote_engine::crypto::{ElectionKeyMaterial, ElectionPrivateKey, ElectionPublicKey};
use vote_engine::types::CandidateRegistry;

static ELECTION_KEYS: OnceLock<(String, String)> = OnceLock::new();

fn pems() -> &'static (String, String) {
    ELECTION_KEYS.get_or_init(|| {
        let (public, private_pem) = ElectionKeyMaterial::from_config(&SecurityConfig::for_testing())
            .expect("election key generation")
            .into_parts();
        (
            public.to_pem().expect("public key PEM"),
            private_pem.to_string(),
        )
    })
}

/// One 2048-bit election key pair per test binary
#[allow(dead_code)]
pub fn election_keys() -> (ElectionPublicKey, ElectionPrivateKey) {
    let (public, private) = pems();
    (
        ElectionPublicKey::from_pem(public).expect("public key"),
        ElectionPrivateKey::from_pem(private).expect("private key"),
    )
}

#[allow(dead_code)]
pub fn public_key() -> ElectionPublicKey {
    ElectionPublicKey::from_pem(&pems().0).expect("public key")
}

#[allow(dead_code)]
pub fn private_key() -> ElectionPrivateKey {
    ElectionPrivateKey::from_pem(&pems().1).expect("private key")
}

#[allow(dead_code)]
pub fn three_candidates(election_id: Uuid) -> CandidateRegistry {
    CandidateRegistry::new(election_id)
        .with_candidate("1", "Alice")
        .with_candidate("2", "Bob")
        .with_candidate("3", "Carol")
}
