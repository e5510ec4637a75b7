//! Tests for TLS connector construction

use super::{TlsPolicy, build_connector};

#[test]
fn test_disabled_policy_builds_nothing() {
    let connector = build_connector(TlsPolicy::Disabled).expect("build");
    assert!(connector.is_none());
    assert!(!TlsPolicy::Disabled.is_enabled());
}

#[test]
fn test_relaxed_policy_builds_connector() {
    let connector = build_connector(TlsPolicy::RequireRelaxed).expect("build");
    assert!(connector.is_some());
    assert!(TlsPolicy::RequireRelaxed.is_enabled());
}

#[test]
fn test_policy_serialization() {
    let json = serde_json::to_string(&TlsPolicy::RequireRelaxed).expect("serialize");
    assert_eq!(json, "\"require_relaxed\"");
    let back: TlsPolicy = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, TlsPolicy::RequireRelaxed);
}
