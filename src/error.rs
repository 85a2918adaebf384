/// Error types for the nativex library
use thiserror::Error;

/// Result type alias for nativex operations
pub type Result<T> = std::result::Result<T, NativexError>;

/// Main error type for extraction and trie operations
#[derive(Debug, Error)]
pub enum NativexError {
    /// A stream could not be opened, validated or used
    #[error("Stream failed: {0}")]
    ResourceFailure(String),

    /// A miner module could not be loaded, resolved or initialized
    #[error("Couldn't load miner {path}::{symbol}: {reason}")]
    MinerLoadFailure {
        /// Module path as given at registration
        path: String,
        /// Entry symbol
        symbol: String,
        /// What went wrong
        reason: String,
    },

    /// Operation attempted in the wrong engine state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Mutation attempted on a read-only (mapped) trie
    #[error("Cannot insert into a read-only (mapped) trie")]
    ReadOnlyViolation,

    /// Trie file could not be loaded
    #[error("Load failure: {0}")]
    LoadFailure(String),

    /// Trie could not be serialized or written
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    /// Malformed miner parameter (glob syntax, dictionary spec)
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Invalid pipeline configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NativexError {
    /// True for errors that only affect a single miner registration
    pub fn is_miner_failure(&self) -> bool {
        matches!(
            self,
            NativexError::MinerLoadFailure { .. } | NativexError::InvalidPattern(_)
        )
    }
}

impl From<serde_json::Error> for NativexError {
    fn from(err: serde_json::Error) -> Self {
        NativexError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = NativexError::MinerLoadFailure {
            path: "glob_entities.so".to_string(),
            symbol: "match_glob".to_string(),
            reason: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Couldn't load miner glob_entities.so::match_glob: not found"
        );
        assert!(err.is_miner_failure());
        assert!(!NativexError::ReadOnlyViolation.is_miner_failure());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: NativexError = io.into();
        assert!(matches!(err, NativexError::Io(_)));
    }
}
