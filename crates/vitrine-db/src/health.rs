//! Health report types
//!
//! A health check runs a trivial query through the normal pool path and
//! folds any failure into the report instead of raising it.

use serde::{Deserialize, Serialize};

use crate::pool::PoolStats;

/// Health status of the database behind the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// The probe query completed
    Healthy,
    /// The probe query failed; the report carries the error
    Unhealthy,
}

impl HealthStatus {
    /// Check if status is healthy
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Result of a single health check
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// The resulting status
    pub status: HealthStatus,
    /// Pool statistics at check time
    pub stats: PoolStats,
    /// Probe round-trip time, if the probe succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Error message, if the probe failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    /// Create a healthy report
    pub fn healthy(stats: PoolStats, latency_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            stats,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    /// Create an unhealthy report carrying the failure message
    pub fn unhealthy(stats: PoolStats, error: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            stats,
            latency_ms: None,
            error: Some(error),
        }
    }
}
