//! Cryptographic building blocks for commit, cast and tally

pub mod casting;
pub mod commitment;
pub mod hybrid;
pub mod keys;
pub mod random;
pub mod signature;
pub mod tally;

pub use casting::BallotCaster;
pub use commitment::CommitmentScheme;
pub use hybrid::HybridCipher;
pub use keys::{ElectionKeyMaterial, ElectionPrivateKey, ElectionPublicKey};
pub use random::SecureRandom;
pub use signature::{SignatureService, SystemAuthority};
pub use tally::{ElectionTally, TallyEngine, TallyRecord, TallyState};

/// Compare two byte strings in constant time
///
/// Length is not secret; differing lengths return early.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Log-safe prefix of an identifier
pub(crate) fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}
