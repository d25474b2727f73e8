//! Error types for the similarity pipeline.
//!
//! Only genuine failures live here. An unknown query record and a degenerate
//! (zero variance) vector pair are regular outcomes and never surface as errors.

use thiserror::Error;

/// Crate-level result alias
pub type Result<T> = std::result::Result<T, SimilarityError>;

/// Errors surfaced by the similarity pipeline
#[derive(Debug, Error)]
pub enum SimilarityError {
    /// The backing record store could not be queried.
    /// Not retried: a dataset is a snapshot, not a live sync.
    #[error("record source '{source_name}' unavailable: {reason}")]
    SourceUnavailable {
        /// Name of the source that failed
        source_name: String,
        /// What went wrong
        reason: String,
    },

    /// The default cache backend failed.
    /// Failures of the dedicated backend never get here, they fall back instead.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Configuration rejected during validation
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SimilarityError {
    /// Shorthand for a `SourceUnavailable` error
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Cache backend errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// No backend is configured under this name
    #[error("cache backend '{0}' is not configured")]
    InvalidBackend(String),

    /// The backend is configured but failed on get/set
    #[error("cache backend '{backend}' failed: {reason}")]
    Backend {
        backend: String,
        reason: String,
    },

    /// A vector space could not be encoded into a cache blob
    #[error("failed to encode cache value: {0}")]
    Encode(String),

    /// A cached blob is not a valid vector space
    #[error("failed to decode cache value: {0}")]
    Decode(String),
}

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// At least one comparison field is required
    #[error("no comparison fields configured")]
    NoFields,

    #[error("comparison field names must not be blank")]
    EmptyField,

    /// `Some(0)` would build an empty dataset; use `None` for "all records"
    #[error("record limit must be positive (use no limit to fetch every record)")]
    ZeroLimit,

    #[error("cache key namespace must not be empty")]
    EmptyNamespace,

    /// An environment variable held an unusable value
    #[error("environment variable {var}: {reason}")]
    Env {
        var: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_unavailable_message_names_the_source() {
        let err = SimilarityError::source_unavailable("entries", "connection refused");
        assert_eq!(
            err.to_string(),
            "record source 'entries' unavailable: connection refused"
        );
    }

    #[test]
    fn cache_and_config_errors_convert_transparently() {
        let err: SimilarityError = CacheError::InvalidBackend("default".into()).into();
        assert_eq!(err.to_string(), "cache backend 'default' is not configured");

        let err: SimilarityError = ConfigError::ZeroLimit.into();
        assert!(matches!(err, SimilarityError::Config(ConfigError::ZeroLimit)));
    }
}
