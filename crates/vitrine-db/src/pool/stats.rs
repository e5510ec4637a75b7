//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a connection pool's state
///
/// Recomputed on demand, never cached. For every observed snapshot
/// `0 <= idle <= total <= max_size` and `waiting >= 0` hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Total number of connections (idle + active)
    total: usize,
    /// Number of idle connections available in the pool
    idle: usize,
    /// Number of connections currently in use
    active: usize,
    /// Number of requests waiting for a connection
    waiting: usize,
    /// Configured maximum pool size
    max_size: usize,
    /// Configured minimum pool size
    min_size: usize,
    /// Whether the pool has been closed
    closed: bool,
}

impl PoolStats {
    /// Create new pool statistics
    pub fn new(
        total: usize,
        idle: usize,
        active: usize,
        waiting: usize,
        max_size: usize,
        min_size: usize,
        closed: bool,
    ) -> Self {
        Self {
            total,
            idle,
            active,
            waiting,
            max_size,
            min_size,
            closed,
        }
    }

    /// Get the total number of connections
    pub fn total(&self) -> usize {
        self.total
    }

    /// Get the number of idle connections
    pub fn idle(&self) -> usize {
        self.idle
    }

    /// Get the number of active (in-use) connections
    pub fn active(&self) -> usize {
        self.active
    }

    /// Get the number of waiting requests
    pub fn waiting(&self) -> usize {
        self.waiting
    }

    /// Get the configured maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the configured minimum pool size
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Whether the pool has been closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Check if the pool is fully utilized (all connections in use)
    pub fn is_full(&self) -> bool {
        self.idle == 0 && self.total >= self.max_size && self.max_size > 0
    }
}
