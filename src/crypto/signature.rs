//! Ed25519 signatures over canonical payloads
//!
//! Signing and verification both run the payload through
//! [`crate::canonical::to_canonical_bytes`], the same encoding used for
//! commitments, so a signer and a verifier can never disagree on the bytes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::Serialize;
use zeroize::Zeroizing;

use crate::canonical::to_canonical_bytes;
use crate::config::{SYSTEM_PRIVATE_KEY_VAR, SYSTEM_PUBLIC_KEY_VAR, SecurityConfig};
use crate::types::{Ballot, EncodedSignature};
use crate::{Error, Result, config_error};

/// Stateless Ed25519 sign/verify
pub struct SignatureService;

impl SignatureService {
    /// Sign the canonical encoding of `payload`, returning base64
    pub fn sign<T: Serialize + ?Sized>(payload: &T, key: &SigningKey) -> Result<EncodedSignature> {
        let bytes = to_canonical_bytes(payload)?;
        Ok(STANDARD.encode(key.sign(&bytes).to_bytes()))
    }

    /// Verify a base64 signature over the canonical encoding of `payload`
    ///
    /// Undecodable signatures, wrong lengths and payloads that fail to
    /// serialize all yield `false`.
    pub fn verify<T: Serialize + ?Sized>(payload: &T, signature: &str, key: &VerifyingKey) -> bool {
        let Ok(raw) = STANDARD.decode(signature) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&raw) else {
            return false;
        };
        let Ok(bytes) = to_canonical_bytes(payload) else {
            return false;
        };
        key.verify_strict(&bytes, &signature).is_ok()
    }

    /// Verify against a base64 raw public key; a bad key yields `false`
    pub fn verify_with_encoded_key<T: Serialize + ?Sized>(
        payload: &T,
        signature: &str,
        public_key_b64: &str,
    ) -> bool {
        match Self::verifying_key_from_b64(public_key_b64) {
            Ok(key) => Self::verify(payload, signature, &key),
            Err(_) => false,
        }
    }

    /// Decode a base64 raw 32-byte Ed25519 public key
    pub fn verifying_key_from_b64(encoded: &str) -> Result<VerifyingKey> {
        let raw = decode_key(encoded)?;
        VerifyingKey::from_bytes(&raw)
            .map_err(|e| Error::incompatible_key(format!("invalid Ed25519 public key: {e}")))
    }

    /// Decode a base64 raw 32-byte Ed25519 private key
    pub fn signing_key_from_b64(encoded: &str) -> Result<SigningKey> {
        let raw = decode_key(encoded)?;
        Ok(SigningKey::from_bytes(&raw))
    }
}

fn decode_key(encoded: &str) -> Result<Zeroizing<[u8; 32]>> {
    let decoded = Zeroizing::new(
        STANDARD
            .decode(encoded)
            .map_err(|_| Error::incompatible_key("Ed25519 key is not valid base64"))?,
    );
    if decoded.len() != 32 {
        return Err(Error::incompatible_key(format!(
            "Ed25519 key must be 32 bytes, got {}",
            decoded.len()
        )));
    }
    let mut raw = Zeroizing::new([0u8; 32]);
    raw.copy_from_slice(&decoded);
    Ok(raw)
}

/// The process-wide tally signing identity
///
/// Loaded once from configuration and passed explicitly to whatever needs it.
/// The public half is what third parties use to check published tallies.
pub struct SystemAuthority {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl SystemAuthority {
    /// Build from configuration; both halves must be present and agree
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        let private = config
            .system_private_key_b64
            .as_deref()
            .ok_or_else(|| config_error!("{} is not configured", SYSTEM_PRIVATE_KEY_VAR))?;
        let public = config
            .system_public_key_b64
            .as_deref()
            .ok_or_else(|| config_error!("{} is not configured", SYSTEM_PUBLIC_KEY_VAR))?;

        let signing_key = SignatureService::signing_key_from_b64(private)
            .map_err(|e| config_error!("{}: {}", SYSTEM_PRIVATE_KEY_VAR, e))?;
        let verifying_key = SignatureService::verifying_key_from_b64(public)
            .map_err(|e| config_error!("{}: {}", SYSTEM_PUBLIC_KEY_VAR, e))?;

        if signing_key.verifying_key() != verifying_key {
            return Err(config_error!(
                "{} does not match {}",
                SYSTEM_PUBLIC_KEY_VAR,
                SYSTEM_PRIVATE_KEY_VAR
            ));
        }

        tracing::info!("🔐 System authority key loaded");

        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    /// Generate a new authority key pair for provisioning
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Sign a payload as the system authority
    pub fn sign<T: Serialize + ?Sized>(&self, payload: &T) -> Result<EncodedSignature> {
        SignatureService::sign(payload, &self.signing_key)
    }

    /// Check a signature made by this authority
    pub fn verify<T: Serialize + ?Sized>(&self, payload: &T, signature: &str) -> bool {
        SignatureService::verify(payload, signature, &self.verifying_key)
    }

    /// Public key for distribution to verifiers
    pub fn verifying_key(&self) -> VerifyingKey {
        self.verifying_key
    }

    /// Base64 raw public key
    pub fn public_key_b64(&self) -> String {
        STANDARD.encode(self.verifying_key.to_bytes())
    }

    /// Base64 raw private and public keys, in that order, for writing into
    /// the process configuration
    pub fn export_b64(&self) -> (Zeroizing<String>, String) {
        let private = Zeroizing::new(self.signing_key.to_bytes());
        (
            Zeroizing::new(STANDARD.encode(private.as_slice())),
            self.public_key_b64(),
        )
    }
}

impl std::fmt::Debug for SystemAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemAuthority")
            .field("public_key", &self.public_key_b64())
            .finish_non_exhaustive()
    }
}

impl Ballot {
    /// Attach the voter's signature over owner, election and envelope
    pub fn sign_by_voter(&mut self, voter_key: &SigningKey) -> Result<()> {
        let signature = SignatureService::sign(&self.signing_payload(), voter_key)?;
        self.voter_signature = Some(signature);
        Ok(())
    }

    /// Check the voter's signature; an unsigned ballot does not verify
    pub fn verify_voter_signature(&self, voter_key: &VerifyingKey) -> bool {
        match &self.voter_signature {
            Some(signature) => SignatureService::verify(&self.signing_payload(), signature, voter_key),
            None => false,
        }
    }
}
