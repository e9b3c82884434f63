//! Error types for the dbsync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

// ---------------------------------------------------------------------------
// Selector errors
// ---------------------------------------------------------------------------

/// Errors from selector resolution.
#[derive(Debug, Error)]
pub enum SelectorError {
    /// Both a branch name and a commit id were supplied.
    #[error("either a branch name or a commit id can be given, not both")]
    BranchAndCommit,
}

// ---------------------------------------------------------------------------
// Content cache errors
// ---------------------------------------------------------------------------

/// Errors from the content-addressed blob cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No blob with the given digest exists in the cache.
    #[error("no cached content with digest {0}")]
    NotFound(String),

    /// Generic I/O wrapper.
    #[error("cache I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Metadata store errors
// ---------------------------------------------------------------------------

/// Errors from metadata persistence and validation.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A branch or active-branch pointer references an unknown key.
    #[error("metadata invariant violated: {0}")]
    InvariantViolation(String),

    /// The record could not be serialized.
    #[error("metadata encode error: {0}")]
    EncodeError(String),

    /// Generic I/O wrapper.
    #[error("metadata I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Synchronization errors
// ---------------------------------------------------------------------------

/// Errors from pull/push synchronization against the remote service.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required request field is missing or empty. Raised before any
    /// network access.
    #[error("validation failed for '{field}': {detail}")]
    Validation {
        field: String,
        detail: String,
    },

    /// The requested database, branch, or commit does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The remote returned a non-success status other than 404.
    #[error("remote request failed: HTTP {status} - {message}")]
    Remote {
        status: u16,
        message: String,
    },

    /// Push was rejected as non-fast-forward and the force flag was not
    /// set. Retry with force, or pull first.
    #[error("push to branch '{branch}' rejected: remote history has diverged (pull first, or push with --force)")]
    Conflict {
        branch: String,
    },

    /// The remote response had an unexpected shape (malformed header or
    /// body).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// HTTP-level transport error (network, TLS, etc.).
    #[error("transport error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Underlying selector error.
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// Underlying cache error.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Underlying metadata error.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Generic I/O wrapper (working-copy reads/writes).
    #[error("sync I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = SelectorError::BranchAndCommit;
        assert!(err.to_string().contains("not both"));

        let err = CacheError::NotFound("abc123".into());
        assert_eq!(err.to_string(), "no cached content with digest abc123");

        let err = SyncError::Remote {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert!(err.to_string().contains("HTTP 500"));

        let err = SyncError::Conflict {
            branch: "master".into(),
        };
        assert!(err.to_string().contains("diverged"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let cache_err = CacheError::NotFound("deadbeef".into());
        let core_err: CoreError = cache_err.into();
        assert!(matches!(core_err, CoreError::Cache(_)));

        let sync_err: SyncError = SelectorError::BranchAndCommit.into();
        assert!(matches!(sync_err, SyncError::Selector(_)));
    }
}
