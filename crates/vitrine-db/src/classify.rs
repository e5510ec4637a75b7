//! Advisory error classification
//!
//! Recognizes the failure classes where a caller's retry has a
//! reasonable chance of succeeding, plus the provider connection-limit
//! case. Classification only tags log lines and return values; the
//! manager never retries on its own.

use vitrine_core::VitrineError;

/// The transient failure that was recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// Peer reset the connection
    ConnectionReset,
    /// Client- or server-side timeout
    Timeout,
    /// Nothing listening at the configured host/port
    ConnectionRefused,
    /// Connection ended mid-conversation
    ConnectionClosed,
}

/// How an error should be read by a caller deciding whether to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Network-level blip; retrying later may succeed
    Transient(TransientKind),
    /// Provider connection limit reached; wait rather than fail hard
    Capacity,
    /// Deterministic failure (bad SQL, constraint violation); never retry
    Statement,
}

impl ErrorDisposition {
    /// Whether a retry is worth attempting
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorDisposition::Statement)
    }
}

impl std::fmt::Display for ErrorDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDisposition::Transient(TransientKind::ConnectionReset) => {
                write!(f, "transient/connection_reset")
            }
            ErrorDisposition::Transient(TransientKind::Timeout) => write!(f, "transient/timeout"),
            ErrorDisposition::Transient(TransientKind::ConnectionRefused) => {
                write!(f, "transient/connection_refused")
            }
            ErrorDisposition::Transient(TransientKind::ConnectionClosed) => {
                write!(f, "transient/connection_closed")
            }
            ErrorDisposition::Capacity => write!(f, "capacity"),
            ErrorDisposition::Statement => write!(f, "statement"),
        }
    }
}

/// Classify an error for the advisory log tag
pub fn classify(error: &VitrineError) -> ErrorDisposition {
    match error {
        VitrineError::Timeout(_) => ErrorDisposition::Transient(TransientKind::Timeout),
        VitrineError::Io(e) => classify_io(e),
        VitrineError::Connection(msg) | VitrineError::Query(msg) => classify_message(msg),
        VitrineError::Configuration(_) | VitrineError::Shutdown => ErrorDisposition::Statement,
    }
}

fn classify_io(error: &std::io::Error) -> ErrorDisposition {
    use std::io::ErrorKind;
    match error.kind() {
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            ErrorDisposition::Transient(TransientKind::ConnectionReset)
        }
        ErrorKind::ConnectionRefused => {
            ErrorDisposition::Transient(TransientKind::ConnectionRefused)
        }
        ErrorKind::TimedOut => ErrorDisposition::Transient(TransientKind::Timeout),
        ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof => {
            ErrorDisposition::Transient(TransientKind::ConnectionClosed)
        }
        _ => ErrorDisposition::Statement,
    }
}

/// SQLSTATE 53300 is `too_many_connections`; the string markers cover
/// the pooler-specific wording managed providers emit in front of it.
const CAPACITY_MARKERS: &[&str] = &[
    "max client connections reached",
    "too many clients",
    "remaining connection slots are reserved",
    "53300",
];

fn classify_message(message: &str) -> ErrorDisposition {
    let msg = message.to_ascii_lowercase();

    if CAPACITY_MARKERS.iter().any(|m| msg.contains(m)) {
        return ErrorDisposition::Capacity;
    }

    if msg.contains("connection reset") || msg.contains("econnreset") {
        ErrorDisposition::Transient(TransientKind::ConnectionReset)
    } else if msg.contains("connection refused") || msg.contains("econnrefused") {
        ErrorDisposition::Transient(TransientKind::ConnectionRefused)
    } else if msg.contains("timed out") || msg.contains("timeout") {
        ErrorDisposition::Transient(TransientKind::Timeout)
    } else if msg.contains("connection closed")
        || msg.contains("connection terminated")
        || msg.contains("connection ended")
    {
        ErrorDisposition::Transient(TransientKind::ConnectionClosed)
    } else {
        ErrorDisposition::Statement
    }
}

#[cfg(test)]
mod tests;
