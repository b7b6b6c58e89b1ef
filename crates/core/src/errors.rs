//! Error types for the DeckVault core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Store failures carry a retryability classification: the orchestrator
//! retries only transient classes (network, timeout, 5xx) and surfaces
//! everything else immediately with an actionable message.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Vcs(#[from] VcsError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// What a `NotFound` store failure refers to.
///
/// A missing branch and a missing deck file produce the same HTTP status at
/// the store; the client keeps them apart so the caller's message can say
/// which one to fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Branch,
    File,
    Commit,
    Repo,
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Branch => write!(f, "branch"),
            Self::File => write!(f, "deck file"),
            Self::Commit => write!(f, "commit"),
            Self::Repo => write!(f, "repository"),
        }
    }
}

/// Errors from the version-controlled object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP-level transport error (network, TLS, etc.). Retryable.
    #[error("store network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request timed out in transit. Retryable.
    #[error("store request timed out: {0}")]
    Timeout(String),

    /// The store returned a 5xx status. Retryable.
    #[error("store server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    /// Conditional write rejected because the content-hash was stale.
    /// Never retried: the same stale hash would produce the same outcome,
    /// and a blind overwrite would discard a concurrent edit.
    #[error("stale write rejected for '{path}': refresh the deck and retry")]
    Conflict { path: String },

    /// Authentication or authorization failure (401/403).
    #[error("store authentication failed (HTTP {status}): re-authenticate")]
    Auth { status: u16 },

    /// The requested branch, file, commit, or repository does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: NotFoundKind, name: String },

    /// The store's response could not be decoded.
    #[error("store response parse error: {0}")]
    Parse(String),
}

impl StoreError {
    /// Whether the orchestrator's retry policy applies to this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Server { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Diff offload errors
// ---------------------------------------------------------------------------

/// Errors from the background diff worker.
#[derive(Debug, Error)]
pub enum DiffError {
    /// The worker produced no response within the deadline.
    #[error("offloaded diff computation timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The worker task is gone (shut down or panicked).
    #[error("diff worker is no longer running")]
    WorkerGone,
}

// ---------------------------------------------------------------------------
// Annotation codec errors
// ---------------------------------------------------------------------------

/// Errors from the commit-message annotation codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A line inside the annotation block matched no known pattern.
    #[error("malformed annotation line: '{line}'")]
    MalformedLine { line: String },
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

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing { var: String, field: String },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Orchestrator errors
// ---------------------------------------------------------------------------

/// Errors from the version-control orchestrator.
#[derive(Debug, Error)]
pub enum VcsError {
    /// Underlying store failure (already classified and retried).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Offloaded diff computation failure.
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// Annotation codec failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A deck file fetched from the store is not valid deck JSON.
    #[error("failed to decode deck file '{path}': {source}")]
    DeckDecode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A deck could not be serialized for writing.
    #[error("failed to encode deck '{name}': {source}")]
    DeckEncode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// `complete_merge` was called with no merge awaiting resolution.
    #[error("no merge is awaiting resolution")]
    NoPendingMerge,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StoreError::Timeout("connect".into()).is_retryable());
        assert!(StoreError::Server {
            status: 503,
            body: "unavailable".into()
        }
        .is_retryable());

        assert!(!StoreError::Conflict {
            path: "decks/a.json".into()
        }
        .is_retryable());
        assert!(!StoreError::Auth { status: 401 }.is_retryable());
        assert!(!StoreError::NotFound {
            kind: NotFoundKind::File,
            name: "decks/a.json".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display_messages() {
        let err = StoreError::NotFound {
            kind: NotFoundKind::Branch,
            name: "feature/burn".into(),
        };
        assert_eq!(err.to_string(), "branch not found: feature/burn");

        let err = StoreError::Conflict {
            path: "decks/burn.json".into(),
        };
        assert!(err.to_string().contains("refresh the deck"));

        let err = DiffError::Timeout { secs: 30 };
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let store_err = StoreError::Auth { status: 403 };
        let core_err: CoreError = store_err.into();
        assert!(matches!(core_err, CoreError::Store(_)));

        let vcs_err = VcsError::Diff(DiffError::WorkerGone);
        let core_err: CoreError = vcs_err.into();
        assert!(matches!(core_err, CoreError::Vcs(_)));
    }
}
