//! Tests for environment configuration

use std::time::Duration;

use super::{DbConfig, DeploymentTarget};
use crate::tls::TlsPolicy;
use vitrine_core::VitrineError;

fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
    move |key| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    }
}

#[test]
fn test_defaults_applied() {
    let config = DbConfig::from_lookup(|_| None).expect("config");

    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 5432);
    assert_eq!(config.dbname, "postgres");
    assert_eq!(config.user, "postgres");
    assert_eq!(config.target, DeploymentTarget::Local);
    assert_eq!(config.max_connections, 10);
    assert_eq!(config.min_connections, 0);
    assert_eq!(config.tls_policy(), TlsPolicy::Disabled);
}

#[test]
fn test_timeout_defaults() {
    let config = DbConfig::from_lookup(|_| None).expect("config");

    assert_eq!(config.idle_timeout, Duration::from_secs(30));
    assert_eq!(config.connect_timeout, Duration::from_secs(10));
    assert_eq!(config.acquire_timeout, Duration::from_secs(15));
    assert_eq!(config.statement_timeout, Duration::from_secs(30));
    assert_eq!(config.query_timeout, Duration::from_secs(25));
}

#[test]
fn test_explicit_values() {
    let vars = [
        ("DB_HOST", "db.internal.example.com"),
        ("DB_PORT", "6432"),
        ("DB_NAME", "vitrine"),
        ("DB_USER", "studio"),
        ("DB_PASSWORD", "s3cret"),
    ];
    let config = DbConfig::from_lookup(lookup(&vars)).expect("config");

    assert_eq!(config.host, "db.internal.example.com");
    assert_eq!(config.port, 6432);
    assert_eq!(config.dbname, "vitrine");
    assert_eq!(config.user, "studio");
    assert_eq!(config.password, "s3cret");
    assert_eq!(config.target, DeploymentTarget::Remote);
    assert_eq!(config.max_connections, 10);
}

#[test]
fn test_managed_cloud_policy() {
    let vars = [("DB_HOST", "db.abcdefgh.supabase.co")];
    let config = DbConfig::from_lookup(lookup(&vars)).expect("config");

    assert_eq!(config.target, DeploymentTarget::ManagedCloud);
    assert_eq!(config.max_connections, 2);
    assert_eq!(config.min_connections, 0);
    assert_eq!(config.tls_policy(), TlsPolicy::RequireRelaxed);
}

#[test]
fn test_invalid_port_is_configuration_error() {
    let vars = [("DB_PORT", "not-a-port")];
    let err = DbConfig::from_lookup(lookup(&vars)).expect_err("must fail");
    assert!(matches!(err, VitrineError::Configuration(_)));
    assert!(err.to_string().contains("DB_PORT"));
}

#[test]
fn test_empty_values_fall_back_to_defaults() {
    let vars = [("DB_HOST", ""), ("DB_PORT", "")];
    let config = DbConfig::from_lookup(lookup(&vars)).expect("config");
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 5432);
}

#[test]
fn test_deployment_target_from_host() {
    assert_eq!(
        DeploymentTarget::from_host("localhost"),
        DeploymentTarget::Local
    );
    assert_eq!(
        DeploymentTarget::from_host("127.0.0.1"),
        DeploymentTarget::Local
    );
    assert_eq!(DeploymentTarget::from_host("::1"), DeploymentTarget::Local);
    assert_eq!(
        DeploymentTarget::from_host("dpg-abc123.frankfurt-postgres.render.com"),
        DeploymentTarget::ManagedCloud
    );
    assert_eq!(
        DeploymentTarget::from_host("ep-cool-sky.eu-central-1.aws.neon.tech"),
        DeploymentTarget::ManagedCloud
    );
    assert_eq!(
        DeploymentTarget::from_host("db.example.com"),
        DeploymentTarget::Remote
    );
}

#[test]
fn test_pool_config_mapping() {
    let config = DbConfig::from_lookup(|_| None).expect("config");
    let pool = config.pool_config();

    assert_eq!(pool.min_size(), 0);
    assert_eq!(pool.max_size(), 10);
    assert_eq!(pool.acquire_timeout(), Duration::from_secs(15));
    assert_eq!(pool.idle_timeout(), Duration::from_secs(30));
}

#[test]
fn test_debug_redacts_password() {
    let vars = [("DB_PASSWORD", "s3cret")];
    let config = DbConfig::from_lookup(lookup(&vars)).expect("config");
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("s3cret"));
    assert!(rendered.contains("<redacted>"));
}
