//! Vitrine DB - Postgres access layer for the studio data service
//!
//! This crate owns the process-wide connection pool and everything around
//! it: environment configuration, TLS policy, the Postgres driver, error
//! classification, health reporting, and graceful shutdown. Consumers go
//! through [`ConnectionManager`] and nothing else.

mod classify;
mod config;
mod health;
mod manager;
pub mod pool;
mod postgres;
mod tls;

pub use classify::{ErrorDisposition, TransientKind, classify};
pub use config::{DbConfig, DeploymentTarget};
pub use health::{HealthReport, HealthStatus};
pub use manager::ConnectionManager;
pub use pool::{ConnectionFactory, ConnectionPool, PoolConfig, PoolStats, PooledConnection};
pub use postgres::{PgConnection, PgConnectionFactory};
pub use tls::TlsPolicy;
