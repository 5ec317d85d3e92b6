//! Configuration for the vote engine
//!
//! Loads the system authority key material and protocol parameters from
//! environment variables with validation. The system signing key may be
//! absent at load time; [`crate::crypto::SystemAuthority::from_config`] fails
//! with a configuration error the first time it is actually needed.

use crate::{Result, config_error};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Minimum RSA modulus accepted for election keys
pub const MIN_ELECTION_KEY_BITS: usize = 2048;

/// Minimum random bytes behind a generated commitment nonce
pub const MIN_NONCE_BYTES: usize = 16;

/// Environment variable holding the raw 32-byte Ed25519 private key, base64
pub const SYSTEM_PRIVATE_KEY_VAR: &str = "SYSTEM_ED25519_PRIVATE_KEY_B64";

/// Environment variable holding the raw 32-byte Ed25519 public key, base64
pub const SYSTEM_PUBLIC_KEY_VAR: &str = "SYSTEM_ED25519_PUBLIC_KEY_B64";

/// Security configuration for cryptographic operations
#[derive(Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// System authority private key (base64, 32 raw bytes). Never serialized.
    #[serde(skip_serializing, default)]
    pub system_private_key_b64: Option<String>,

    /// System authority public key (base64, 32 raw bytes)
    pub system_public_key_b64: Option<String>,

    /// RSA modulus size for newly generated election keys
    pub election_key_bits: usize,

    /// Random bytes behind each generated commitment nonce
    pub nonce_bytes: usize,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field(
                "system_private_key_b64",
                &self.system_private_key_b64.as_ref().map(|_| "<redacted>"),
            )
            .field("system_public_key_b64", &self.system_public_key_b64)
            .field("election_key_bits", &self.election_key_bits)
            .field("nonce_bytes", &self.nonce_bytes)
            .finish()
    }
}

impl SecurityConfig {
    /// Load security configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load security configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let system_private_key_b64 = lookup(SYSTEM_PRIVATE_KEY_VAR).filter(|v| !v.is_empty());
        let system_public_key_b64 = lookup(SYSTEM_PUBLIC_KEY_VAR).filter(|v| !v.is_empty());

        if let Some(key) = &system_private_key_b64 {
            Self::validate_key(key, SYSTEM_PRIVATE_KEY_VAR)?;
        }
        if let Some(key) = &system_public_key_b64 {
            Self::validate_key(key, SYSTEM_PUBLIC_KEY_VAR)?;
        }

        let election_key_bits = lookup("ELECTION_RSA_KEY_BITS")
            .unwrap_or_else(|| MIN_ELECTION_KEY_BITS.to_string())
            .parse()
            .map_err(|_| config_error!("Invalid ELECTION_RSA_KEY_BITS"))?;

        if election_key_bits < MIN_ELECTION_KEY_BITS {
            return Err(config_error!(
                "ELECTION_RSA_KEY_BITS must be at least {}",
                MIN_ELECTION_KEY_BITS
            ));
        }

        let nonce_bytes = lookup("VOTE_NONCE_BYTES")
            .unwrap_or_else(|| MIN_NONCE_BYTES.to_string())
            .parse()
            .map_err(|_| config_error!("Invalid VOTE_NONCE_BYTES"))?;

        if nonce_bytes < MIN_NONCE_BYTES {
            return Err(config_error!(
                "VOTE_NONCE_BYTES must be at least {}",
                MIN_NONCE_BYTES
            ));
        }

        Ok(Self {
            system_private_key_b64,
            system_public_key_b64,
            election_key_bits,
            nonce_bytes,
        })
    }

    /// Create configuration for testing with a freshly generated system key
    pub fn for_testing() -> Self {
        let signing_key = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let engine = base64::engine::general_purpose::STANDARD;

        Self {
            system_private_key_b64: Some(engine.encode(signing_key.to_bytes())),
            system_public_key_b64: Some(engine.encode(signing_key.verifying_key().to_bytes())),
            election_key_bits: MIN_ELECTION_KEY_BITS,
            nonce_bytes: MIN_NONCE_BYTES,
        }
    }

    /// Validate a base64-encoded raw Ed25519 key
    fn validate_key(key: &str, name: &str) -> Result<()> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(key)
            .map_err(|_| config_error!("{} must be valid base64", name))?;

        if decoded.len() != 32 {
            return Err(config_error!(
                "{} must decode to exactly 32 bytes, got {}",
                name,
                decoded.len()
            ));
        }

        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `vote_engine=debug`
    pub level: String,
    /// `compact` or `full`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "vote_engine=info".to_string(),
            format: "full".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self> {
        let security = SecurityConfig::from_env()?;

        let defaults = LoggingConfig::default();
        let logging = LoggingConfig {
            level: std::env::var("LOG_LEVEL").unwrap_or(defaults.level),
            format: std::env::var("LOG_FORMAT").unwrap_or(defaults.format),
        };

        Ok(Self { security, logging })
    }

    /// Create configuration for testing
    pub fn for_testing() -> Self {
        Self {
            security: SecurityConfig::for_testing(),
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "compact".to_string(),
            },
        }
    }
}
