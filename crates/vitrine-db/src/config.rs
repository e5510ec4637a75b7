//! Environment-sourced database configuration
//!
//! Configuration is read once at process start and never mutated;
//! changing any of it requires a restart.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vitrine_core::{Result, VitrineError};

use crate::pool::PoolConfig;
use crate::tls::TlsPolicy;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_DBNAME: &str = "postgres";
const DEFAULT_USER: &str = "postgres";
const DEFAULT_PASSWORD: &str = "password";

/// Where the configured database host lives.
///
/// Computed once from the host string; all downstream policy (pool
/// sizing, TLS) reads this enum instead of re-inspecting the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentTarget {
    /// Loopback database on the developer machine
    Local,
    /// Hosted provider with free-tier connection caps
    ManagedCloud,
    /// Any other reachable host
    Remote,
}

/// Managed providers are recognized by domain substring; the list covers
/// the hosts the studio has actually deployed against.
const MANAGED_HOST_MARKERS: &[&str] = &["render.com", "supabase.co", "supabase.com", "neon.tech"];

impl DeploymentTarget {
    /// Classify a host string
    pub fn from_host(host: &str) -> Self {
        let host = host.to_ascii_lowercase();
        if host == "localhost" || host == "127.0.0.1" || host == "::1" {
            return DeploymentTarget::Local;
        }
        if MANAGED_HOST_MARKERS.iter().any(|m| host.contains(m)) {
            DeploymentTarget::ManagedCloud
        } else {
            DeploymentTarget::Remote
        }
    }

    /// Pool cap for this target. Managed free tiers allow very few
    /// concurrent clients, so the pool stays small there.
    pub fn max_connections(&self) -> usize {
        match self {
            DeploymentTarget::ManagedCloud => 2,
            DeploymentTarget::Local | DeploymentTarget::Remote => 10,
        }
    }

    /// TLS policy for this target
    pub fn tls_policy(&self) -> TlsPolicy {
        match self {
            DeploymentTarget::ManagedCloud => TlsPolicy::RequireRelaxed,
            DeploymentTarget::Local | DeploymentTarget::Remote => TlsPolicy::Disabled,
        }
    }
}

/// Immutable, process-wide database configuration
#[derive(Clone)]
pub struct DbConfig {
    /// Database host
    pub host: String,
    /// Database port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Classified deployment target
    pub target: DeploymentTarget,
    /// Maximum pooled connections
    pub max_connections: usize,
    /// Minimum pooled connections (no warm pool: always 0)
    pub min_connections: usize,
    /// Idle connection eviction interval
    pub idle_timeout: Duration,
    /// TCP connect timeout for new connections
    pub connect_timeout: Duration,
    /// Timeout waiting for a pooled connection
    pub acquire_timeout: Duration,
    /// Server-side statement timeout
    pub statement_timeout: Duration,
    /// Client-side timeout around a whole query round trip
    pub query_timeout: Duration,
}

impl DbConfig {
    /// Read configuration from `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`
    /// and `DB_PASSWORD`, applying defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("DB_HOST")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("DB_PORT").filter(|v| !v.is_empty()) {
            None => DEFAULT_PORT,
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                VitrineError::Configuration(format!("invalid DB_PORT value: {raw}"))
            })?,
        };

        let dbname = lookup("DB_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DBNAME.to_string());
        let user = lookup("DB_USER")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_USER.to_string());

        let target = DeploymentTarget::from_host(&host);

        let password = match lookup("DB_PASSWORD").filter(|v| !v.is_empty()) {
            Some(p) => p,
            None => {
                if target == DeploymentTarget::Local {
                    tracing::warn!("DB_PASSWORD is not set, using the default local password");
                } else {
                    tracing::warn!(host = %host, "DB_PASSWORD is not set for a non-local host");
                }
                DEFAULT_PASSWORD.to_string()
            }
        };

        tracing::info!(
            host = %host,
            port = port,
            dbname = %dbname,
            target = ?target,
            max_connections = target.max_connections(),
            "database configuration loaded"
        );

        Ok(Self {
            host,
            port,
            dbname,
            user,
            password,
            target,
            max_connections: target.max_connections(),
            min_connections: 0,
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(15),
            statement_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(25),
        })
    }

    /// TLS policy derived from the deployment target
    pub fn tls_policy(&self) -> TlsPolicy {
        self.target.tls_policy()
    }

    /// Pool configuration derived from this config
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.min_connections, self.max_connections)
            .with_acquire_timeout_ms(self.acquire_timeout.as_millis() as u64)
            .with_idle_timeout_ms(self.idle_timeout.as_millis() as u64)
    }

    /// Override the pool cap (used by tests and one-off tooling)
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Override the acquire timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("target", &self.target)
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
