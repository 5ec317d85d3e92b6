//! Error handling for the vote engine
//!
//! Verification-style checks (commitment verify, signature verify) return
//! `bool` and never produce these errors. Everything here is a fault the
//! caller has to map to a user-facing rejection.

/// Result type alias for the vote engine
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the vote engine
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Random bounds where `max <= min`
    #[error("Invalid random range: [{min}, {max})")]
    InvalidRange { min: i64, max: i64 },

    /// AEAD tag did not verify
    #[error("Ciphertext failed authentication")]
    TamperedCiphertext,

    /// Envelope field missing, empty, undecodable or of the wrong length
    #[error("Malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },

    /// Key of the wrong type or size, or a key that cannot unwrap the envelope
    #[error("Incompatible key: {reason}")]
    IncompatibleKey { reason: String },

    /// Revealed vote or nonce does not match the stored commitment
    #[error("Vote data or nonce does not match the commitment")]
    CommitmentMismatch,

    /// Candidate not registered for the election
    #[error("Unknown candidate: {candidate_id}")]
    UnknownCandidate { candidate_id: String },

    /// Commitment nonce empty or oversized
    #[error("Invalid nonce: {reason}")]
    InvalidNonce { reason: String },

    /// Commitment has already been revealed
    #[error("Commitment has already been revealed")]
    CommitmentAlreadyRevealed,

    /// Missing or invalid system key material and other configuration faults
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new malformed envelope error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            reason: reason.into(),
        }
    }

    /// Create a new incompatible key error
    pub fn incompatible_key(reason: impl Into<String>) -> Self {
        Self::IncompatibleKey {
            reason: reason.into(),
        }
    }

    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a tally should skip the ballot that produced this error
    /// instead of aborting.
    pub fn is_ballot_local(&self) -> bool {
        matches!(
            self,
            Self::TamperedCiphertext | Self::MalformedEnvelope { .. } | Self::IncompatibleKey { .. }
        )
    }
}

/// Convenience macros for creating specific error types
#[macro_export]
macro_rules! malformed_envelope {
    ($msg:expr) => {
        $crate::Error::malformed($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::malformed(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::Error::configuration($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::configuration(format!($fmt, $($arg)*))
    };
}
