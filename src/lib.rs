//! Cryptographic core of a commit-reveal voting engine
//!
//! Voters commit to a vote, reveal it into a ballot encrypted under the
//! election's RSA key, and an election authority later tallies the ballots
//! with the private key. Tallies are signed by a system-wide Ed25519 key.
//! Persistence, HTTP and identity are left to the caller.

pub mod canonical;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod types;

// Re-export commonly used types
pub use errors::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging from `RUST_LOG`, falling back to `vote_engine=info`
pub fn init() -> Result<()> {
    init_with(&config::LoggingConfig::default())
}

/// Initialize logging from explicit settings
///
/// `RUST_LOG` still wins when set. Fails if a global subscriber is already
/// installed.
pub fn init_with(logging: &config::LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let installed = if logging.format == "compact" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    installed.map_err(|e| Error::internal(format!("logging already initialized: {e}")))?;

    tracing::info!("🗳️  Vote engine v{} initialized", VERSION);
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_fails() {
        let first = init_with(&config::LoggingConfig {
            level: "warn".to_string(),
            format: "compact".to_string(),
        });
        let second = init();
        assert!(first.is_ok() || second.is_err());
        assert!(init().is_err());
    }
}
