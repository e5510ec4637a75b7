//! TLS connector construction for Postgres connections

use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use serde::{Deserialize, Serialize};
use vitrine_core::{Result, VitrineError};

/// TLS policy for outgoing database connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsPolicy {
    /// Plaintext connection (local and self-managed hosts)
    Disabled,
    /// TLS with certificate verification relaxed.
    ///
    /// Managed free tiers present provider-chain certificates that fail
    /// full verification, so hostname and chain checks are skipped for
    /// that target only. Flagged for reconsideration in DESIGN.md.
    RequireRelaxed,
}

impl TlsPolicy {
    /// Whether this policy encrypts the connection
    pub fn is_enabled(&self) -> bool {
        matches!(self, TlsPolicy::RequireRelaxed)
    }
}

/// Build a TLS connector for the given policy.
///
/// Returns `None` for [`TlsPolicy::Disabled`]; callers connect with
/// `NoTls` in that case.
pub fn build_connector(policy: TlsPolicy) -> Result<Option<MakeTlsConnector>> {
    match policy {
        TlsPolicy::Disabled => Ok(None),
        TlsPolicy::RequireRelaxed => {
            tracing::warn!(
                "building TLS connector with relaxed certificate verification for managed host"
            );
            let connector = TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|e| {
                    VitrineError::Connection(format!("failed to build TLS connector: {e}"))
                })?;
            Ok(Some(MakeTlsConnector::new(connector)))
        }
    }
}

#[cfg(test)]
mod tests;
