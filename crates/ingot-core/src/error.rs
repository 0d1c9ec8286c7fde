//! Error types and handling for ingot-core operations.
//!
//! One error enum covers every failure the core can surface. Errors are
//! categorized for logging and carry a recoverability hint so callers
//! can decide whether a retry is worthwhile.
//!
//! ## Error Categories
//!
//! - **Validation**: missing or malformed caller input (domains,
//!   release ids, chunk fields, scope mismatches)
//! - **Not Found**: captures, releases, or artifact paths that do not
//!   exist; no active release for a domain
//! - **Backend**: remote embedding backend failures (HTTP errors,
//!   unparseable responses)
//! - **Integrity**: broken artifact references (unsupported
//!   `embedding_ref` schemes, files missing during a merge)
//! - **I/O / Network / Storage / Config / Serialization**: the usual
//!   ambient failures

use thiserror::Error;

/// The main error type for ingot-core operations.
///
/// All public functions in ingot-core return `Result<T, Error>`.
/// Common standard-library and dependency errors convert automatically;
/// the remaining variants are constructed at the failure site with a
/// human-readable message.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network operation failed.
    ///
    /// Covers URL captures and remote embedder calls. The underlying
    /// `reqwest::Error` is preserved for connection detail.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Caller input was missing or malformed.
    ///
    /// Raised for empty domains/release ids, chunks missing required
    /// fields, scope mismatches on upsert, and merges with fewer than
    /// two sources.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested resource was not found.
    ///
    /// Used for missing captures, missing artifact files, and domains
    /// with no active release.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote embedding backend failed.
    ///
    /// Non-2xx responses, connection failures surfaced by the backend,
    /// and responses missing the expected `embedding` field.
    #[error("Backend error: {0}")]
    Backend(String),

    /// An artifact reference is broken.
    ///
    /// Unsupported `embedding_ref` schemes and chunk/embedding files
    /// that disappeared between index write and merge.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Content store operation failed beyond plain I/O.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration is invalid.
    ///
    /// Unknown vector store adapters, unusable data roots.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Network timeouts and connection failures are worth retrying;
    /// validation, scope, and integrity failures are permanent.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Backend(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a string identifier.
    ///
    /// Useful for grouping errors in observability events.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Backend(_) => "backend",
            Self::Integrity(_) => "integrity",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn display_includes_category_prefix_and_message() {
        let cases = vec![
            (
                Error::Validation("domain is required".into()),
                "Validation error",
            ),
            (Error::NotFound("capture".into()), "Not found"),
            (Error::Backend("HTTP 500".into()), "Backend error"),
            (
                Error::Integrity("missing embedding file".into()),
                "Integrity error",
            ),
            (Error::Storage("disk full".into()), "Storage error"),
            (Error::Config("bad adapter".into()), "Configuration error"),
        ];

        for (error, prefix) in cases {
            let rendered = error.to_string();
            assert!(rendered.starts_with(prefix), "got: {rendered}");
        }
    }

    #[test]
    fn categories_are_stable() {
        assert_eq!(Error::Validation(String::new()).category(), "validation");
        assert_eq!(Error::NotFound(String::new()).category(), "not_found");
        assert_eq!(Error::Backend(String::new()).category(), "backend");
        assert_eq!(Error::Integrity(String::new()).category(), "integrity");
        assert_eq!(
            Error::Io(io::Error::other("boom")).category(),
            "io"
        );
    }

    #[test]
    fn recoverability_hints() {
        assert!(Error::Backend("timeout".into()).is_recoverable());
        assert!(
            Error::Io(io::Error::new(io::ErrorKind::TimedOut, "t")).is_recoverable()
        );
        assert!(!Error::Validation("bad".into()).is_recoverable());
        assert!(!Error::Integrity("ref".into()).is_recoverable());
        assert!(!Error::NotFound("gone".into()).is_recoverable());
    }

    #[test]
    fn serde_json_errors_convert_to_serialization() {
        let err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let converted: Error = err.into();
        assert_eq!(converted.category(), "serialization");
    }
}
