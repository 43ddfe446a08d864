//! Error types shared across the crate

use std::path::PathBuf;

/// The input could not be read as a bookmark export at all
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("bookmark file is empty")]
    Empty,
    #[error("no bookmark list (<DL>) found; not a NETSCAPE-Bookmark-file-1 export")]
    NotABookmarkFile,
}

/// Failure reported by a completion backend for a single request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Network or server fault worth retrying
    #[error("transient service error: {0}")]
    Transient(String),
    /// Rate limit or overload signal (service unavailable); retried with a doubled delay
    #[error("service unavailable: {0}")]
    Overloaded(String),
    /// Permanent refusal (bad key, bad request); never retried
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ServiceError::Rejected(_))
    }

    pub fn is_overload(&self) -> bool {
        matches!(self, ServiceError::Overloaded(_))
    }
}

/// Failure of an organize run. Any of these discards the whole run.
#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    #[error("no organizable bookmarks")]
    EmptyInput,
    #[error("categorization service unavailable after {attempts} attempts: {source}")]
    ServiceUnavailable {
        attempts: usize,
        #[source]
        source: ServiceError,
    },
    #[error("categorization service rejected the request: {0}")]
    ServiceRejected(#[source] ServiceError),
    #[error("chunk {chunk}: response is not the expected JSON array ({reason}); response began with: {preview}")]
    ResponseFormat {
        chunk: usize,
        reason: String,
        preview: String,
    },
    #[error("organize cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Organize(#[from] OrganizeError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}: bookmark files must have an .html extension")]
    UnsupportedExtension(PathBuf),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

pub type Result<T> = std::result::Result<T, Error>;
