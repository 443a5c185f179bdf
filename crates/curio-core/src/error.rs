//! Error types for curio.

use thiserror::Error;

/// Result type alias using curio's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for curio operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Classifier not found
    #[error("Classifier not found: {0}")]
    ClassifierNotFound(uuid::Uuid),

    /// Content item not found
    #[error("Content item not found: {0}")]
    ContentNotFound(uuid::Uuid),

    /// Sequence not found
    #[error("Sequence not found: {0}")]
    SequenceNotFound(uuid::Uuid),

    /// Alias text collides with an existing alias of the same kind
    #[error("Duplicate alias: {0}")]
    DuplicateAlias(String),

    /// Pre-save validation failed; nothing was written
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upstream source fetch failed (transport, auth, rate limit)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Fetch(e.to_string())
    }
}

impl Error {
    /// True when the underlying cause is a unique-constraint violation
    /// (SQLSTATE 23505). Used to turn raw database errors into
    /// [`Error::DuplicateAlias`] at the repository boundary.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }
}
