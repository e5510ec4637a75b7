//! Connection trait implemented by database connections

use crate::{Result, RowSet, Value};
use async_trait::async_trait;

/// A database connection
///
/// Exactly one caller holds a connection at a time; the pool enforces
/// exclusive ownership while a connection is leased.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a single parameterized statement and return its result.
    ///
    /// Covers both queries (rows returned) and commands (rows affected).
    async fn query(&self, sql: &str, params: &[Value]) -> Result<RowSet>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
