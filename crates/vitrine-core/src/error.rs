//! Error types for vitrine

use thiserror::Error;

/// Core error type for vitrine operations
///
/// `Connection` and `Query` variants carry the driver's original message
/// verbatim; callers rely on that text never being rewritten.
#[derive(Error, Debug)]
pub enum VitrineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection manager is shut down")]
    Shutdown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for vitrine operations
pub type Result<T> = std::result::Result<T, VitrineError>;
