//! Hybrid ballot encryption
//!
//! The payload is sealed with AES-256-GCM under a fresh key and 128-bit IV;
//! the AES key is wrapped with RSA-OAEP (SHA-256 for both the label hash and
//! MGF1) under the election public key. A new key and IV are drawn for every
//! envelope and never reused.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce, Tag};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::Oaep;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::canonical::to_canonical_bytes;
use crate::crypto::keys::{ElectionPrivateKey, ElectionPublicKey};
use crate::crypto::random::{IV_LEN, SYMMETRIC_KEY_LEN, SecureRandom};
use crate::types::HybridEnvelope;
use crate::{Error, Result, malformed_envelope};

/// GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// AES-256-GCM with a 128-bit nonce
type BallotCipher = AesGcm<Aes256, U16>;

/// RSA-OAEP + AES-256-GCM envelope encryption
pub struct HybridCipher;

impl HybridCipher {
    /// Encrypt the canonical encoding of `payload` for the election key holder
    pub fn encrypt<T: Serialize + ?Sized>(
        payload: &T,
        recipient: &ElectionPublicKey,
    ) -> Result<HybridEnvelope> {
        let plaintext = Zeroizing::new(to_canonical_bytes(payload)?);
        Self::encrypt_bytes(&plaintext, recipient)
    }

    /// Encrypt raw bytes for the election key holder
    pub fn encrypt_bytes(plaintext: &[u8], recipient: &ElectionPublicKey) -> Result<HybridEnvelope> {
        let key = SecureRandom::symmetric_key();
        let iv = SecureRandom::iv();

        let mut buffer = Zeroizing::new(plaintext.to_vec());
        let tag = aead_seal(&key[..], &iv, buffer.as_mut_slice())?;

        let wrapped_key = recipient
            .inner()
            .encrypt(&mut rand::rngs::OsRng, Oaep::new::<Sha256>(), &key[..])
            .map_err(|e| Error::incompatible_key(format!("RSA-OAEP wrap failed: {e}")))?;

        Ok(HybridEnvelope {
            encrypted_key: STANDARD.encode(wrapped_key),
            iv: STANDARD.encode(iv),
            ciphertext: STANDARD.encode(buffer.as_slice()),
            tag: STANDARD.encode(tag),
        })
    }

    /// Decrypt an envelope and parse the payload
    pub fn decrypt<T: DeserializeOwned>(
        envelope: &HybridEnvelope,
        recipient: &ElectionPrivateKey,
    ) -> Result<T> {
        let plaintext = Self::decrypt_bytes(envelope, recipient)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| malformed_envelope!("payload is not valid JSON: {}", e))
    }

    /// Decrypt an envelope to raw bytes
    ///
    /// Errors: `MalformedEnvelope` for missing or undecodable fields,
    /// `IncompatibleKey` when the AES key cannot be unwrapped,
    /// `TamperedCiphertext` when the GCM tag does not verify.
    pub fn decrypt_bytes(
        envelope: &HybridEnvelope,
        recipient: &ElectionPrivateKey,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let wrapped_key = decode_field("encrypted_key", &envelope.encrypted_key, false)?;
        let iv = decode_field("iv", &envelope.iv, false)?;
        let mut buffer = Zeroizing::new(decode_field("ciphertext", &envelope.ciphertext, true)?);
        let tag = decode_field("tag", &envelope.tag, false)?;

        if iv.len() != IV_LEN {
            return Err(malformed_envelope!("iv must be {} bytes, got {}", IV_LEN, iv.len()));
        }
        if tag.len() != TAG_LEN {
            return Err(malformed_envelope!("tag must be {} bytes, got {}", TAG_LEN, tag.len()));
        }

        let key = Zeroizing::new(
            recipient
                .inner()
                .decrypt(Oaep::new::<Sha256>(), &wrapped_key)
                .map_err(|_| Error::incompatible_key("could not unwrap the ballot key"))?,
        );
        if key.len() != SYMMETRIC_KEY_LEN {
            return Err(Error::incompatible_key(format!(
                "unwrapped key is {} bytes, expected {}",
                key.len(),
                SYMMETRIC_KEY_LEN
            )));
        }

        aead_open(&key, &iv, buffer.as_mut_slice(), &tag)?;
        Ok(buffer)
    }
}

fn decode_field(name: &str, value: &str, allow_empty: bool) -> Result<Vec<u8>> {
    if value.is_empty() && !allow_empty {
        return Err(malformed_envelope!("{} is empty", name));
    }
    STANDARD
        .decode(value)
        .map_err(|e| malformed_envelope!("{} is not valid base64: {}", name, e))
}

fn aead_seal(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> Result<[u8; TAG_LEN]> {
    let cipher = BallotCipher::new_from_slice(key)
        .map_err(|_| Error::internal("AES-256 key must be 32 bytes"))?;
    let tag = cipher
        .encrypt_in_place_detached(Nonce::<U16>::from_slice(iv), b"", buffer)
        .map_err(|_| Error::internal("AES-GCM encryption failed"))?;

    let mut out = [0u8; TAG_LEN];
    out.copy_from_slice(&tag);
    Ok(out)
}

fn aead_open(key: &[u8], iv: &[u8], buffer: &mut [u8], tag: &[u8]) -> Result<()> {
    let cipher = BallotCipher::new_from_slice(key)
        .map_err(|_| Error::incompatible_key("AES-256 key must be 32 bytes"))?;
    cipher
        .decrypt_in_place_detached(Nonce::<U16>::from_slice(iv), b"", buffer, Tag::from_slice(tag))
        .map_err(|_| Error::TamperedCiphertext)
}
