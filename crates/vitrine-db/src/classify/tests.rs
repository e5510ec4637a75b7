//! Tests for advisory error classification

use vitrine_core::VitrineError;

use super::{ErrorDisposition, TransientKind, classify};

#[test]
fn test_capacity_distinct_from_reset() {
    let capacity = classify(&VitrineError::Connection(
        "FATAL: Max client connections reached".into(),
    ));
    let reset = classify(&VitrineError::Connection(
        "connection reset by peer".into(),
    ));

    assert_eq!(capacity, ErrorDisposition::Capacity);
    assert_eq!(
        reset,
        ErrorDisposition::Transient(TransientKind::ConnectionReset)
    );
    assert_ne!(capacity, reset);
    assert_ne!(capacity.to_string(), reset.to_string());
}

#[test]
fn test_postgres_connection_limit_is_capacity() {
    let err = VitrineError::Query("sorry, too many clients already (code: 53300)".into());
    assert_eq!(classify(&err), ErrorDisposition::Capacity);

    let err = VitrineError::Connection(
        "remaining connection slots are reserved for superuser connections".into(),
    );
    assert_eq!(classify(&err), ErrorDisposition::Capacity);
}

#[test]
fn test_timeout_variants_are_transient() {
    let err = VitrineError::Timeout("timed out waiting for a connection".into());
    assert_eq!(
        classify(&err),
        ErrorDisposition::Transient(TransientKind::Timeout)
    );

    let err = VitrineError::Connection("connection timed out".into());
    assert_eq!(
        classify(&err),
        ErrorDisposition::Transient(TransientKind::Timeout)
    );
}

#[test]
fn test_refused_and_ended_are_transient() {
    let refused = classify(&VitrineError::Connection(
        "connection refused (os error 111)".into(),
    ));
    assert_eq!(
        refused,
        ErrorDisposition::Transient(TransientKind::ConnectionRefused)
    );

    let ended = classify(&VitrineError::Connection(
        "Connection terminated unexpectedly".into(),
    ));
    assert_eq!(
        ended,
        ErrorDisposition::Transient(TransientKind::ConnectionClosed)
    );
}

#[test]
fn test_statement_errors_never_retryable() {
    let err = VitrineError::Query(
        "syntax error at or near \"SELEC\" (code: 42601)".into(),
    );
    let disposition = classify(&err);
    assert_eq!(disposition, ErrorDisposition::Statement);
    assert!(!disposition.is_retryable());

    let err = VitrineError::Query(
        "duplicate key value violates unique constraint \"projects_slug_key\" (code: 23505)".into(),
    );
    assert_eq!(classify(&err), ErrorDisposition::Statement);
}

#[test]
fn test_io_error_kinds() {
    use std::io::{Error, ErrorKind};

    let reset = VitrineError::Io(Error::new(ErrorKind::ConnectionReset, "reset"));
    assert_eq!(
        classify(&reset),
        ErrorDisposition::Transient(TransientKind::ConnectionReset)
    );

    let refused = VitrineError::Io(Error::new(ErrorKind::ConnectionRefused, "refused"));
    assert_eq!(
        classify(&refused),
        ErrorDisposition::Transient(TransientKind::ConnectionRefused)
    );

    let pipe = VitrineError::Io(Error::new(ErrorKind::BrokenPipe, "pipe"));
    assert_eq!(
        classify(&pipe),
        ErrorDisposition::Transient(TransientKind::ConnectionClosed)
    );
}

#[test]
fn test_display_tags() {
    assert_eq!(ErrorDisposition::Capacity.to_string(), "capacity");
    assert_eq!(ErrorDisposition::Statement.to_string(), "statement");
    assert_eq!(
        ErrorDisposition::Transient(TransientKind::Timeout).to_string(),
        "transient/timeout"
    );
}

#[test]
fn test_retryable_flags() {
    assert!(ErrorDisposition::Capacity.is_retryable());
    assert!(ErrorDisposition::Transient(TransientKind::ConnectionReset).is_retryable());
    assert!(!ErrorDisposition::Statement.is_retryable());
}
