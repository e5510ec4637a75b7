//! Connection manager: the single entry point for database access
//!
//! Owned by the process's composition root and passed by reference to
//! every caller; never re-created or reached through globals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use vitrine_core::{Result, RowSet, Value, VitrineError};

use crate::classify::classify;
use crate::config::DbConfig;
use crate::health::HealthReport;
use crate::pool::{ConnectionFactory, ConnectionPool, PoolStats};
use crate::postgres::PgConnectionFactory;

/// Manages the process-wide connection pool and its lifecycle
///
/// State machine: Running until the first `shutdown` call, then Draining
/// until every in-flight query finishes, then Closed. Closed is terminal;
/// query errors never change state.
pub struct ConnectionManager {
    config: DbConfig,
    pool: ConnectionPool,
    /// Monotonic shutdown flag; guards against double teardown
    shutdown: AtomicBool,
}

impl ConnectionManager {
    /// Create a manager backed by Postgres connections
    pub fn new(config: DbConfig) -> Self {
        let factory = PgConnectionFactory::new(config.clone());
        Self::with_factory(config, factory)
    }

    /// Create a manager with a custom connection factory
    pub fn with_factory<F: ConnectionFactory>(config: DbConfig, factory: F) -> Self {
        let pool = ConnectionPool::new(config.pool_config(), factory);
        Self {
            config,
            pool,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Execute a single parameterized statement
    ///
    /// Acquires a connection, runs the statement, and releases the
    /// connection on completion, success or failure. Driver errors
    /// propagate unmodified; classification only tags the log line. A
    /// failed query never tears down the pool.
    #[tracing::instrument(skip(self, sql, params))]
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<RowSet> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(VitrineError::Shutdown);
        }

        let conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(e) => {
                let disposition = classify(&e);
                tracing::warn!(
                    error = %e,
                    disposition = %disposition,
                    retryable = disposition.is_retryable(),
                    "failed to acquire connection"
                );
                return Err(e);
            }
        };

        let stats = self.pool.stats();
        tracing::debug!(
            total = stats.total(),
            idle = stats.idle(),
            waiting = stats.waiting(),
            "query start"
        );

        let started = Instant::now();
        let result = conn.query(sql, params).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let stats = self.pool.stats();
        match &result {
            Ok(set) => {
                tracing::debug!(
                    rows = set.row_count,
                    elapsed_ms,
                    total = stats.total(),
                    idle = stats.idle(),
                    waiting = stats.waiting(),
                    "query done"
                );
            }
            Err(e) => {
                let disposition = classify(e);
                tracing::warn!(
                    error = %e,
                    disposition = %disposition,
                    retryable = disposition.is_retryable(),
                    elapsed_ms,
                    total = stats.total(),
                    idle = stats.idle(),
                    waiting = stats.waiting(),
                    "query failed"
                );
            }
        }

        result
    }

    /// Run a trivial probe query and report the outcome
    ///
    /// Never returns an error: any failure is folded into an
    /// `Unhealthy` report. The probe acquires and releases a connection
    /// like any other query, so frequent checks cannot leak the pool.
    pub async fn health_check(&self) -> HealthReport {
        let started = Instant::now();
        match self.execute("SELECT 1", &[]).await {
            Ok(_) => HealthReport::healthy(self.stats(), started.elapsed().as_millis() as u64),
            Err(e) => HealthReport::unhealthy(self.stats(), e.to_string()),
        }
    }

    /// Current pool statistics; synchronous and connection-free
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// The configuration this manager was built with
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Shut down the manager, draining the pool gracefully
    ///
    /// Idempotent: the first call drains and closes the pool; later
    /// calls observe the flag and return immediately. There is no way
    /// back to Running.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            tracing::debug!("shutdown already performed");
            return;
        }

        tracing::info!("shutting down connection manager");
        self.pool.close().await;
        tracing::info!("connection manager shut down");
    }
}
