//! Response DTOs for the caching proxy
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::gateway::GatewayStats;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cached entries
    pub size: usize,
    /// Number of reads in flight
    pub pending_requests: usize,
    /// Cached keys
    pub keys: Vec<String>,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub expirations: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<GatewayStats> for StatsResponse {
    fn from(stats: GatewayStats) -> Self {
        Self {
            size: stats.size,
            pending_requests: stats.pending_requests,
            keys: stats.keys,
            hits: stats.hits,
            misses: stats.misses,
            invalidations: stats.invalidations,
            expirations: stats.expirations,
            hit_rate: stats.hit_rate,
        }
    }
}

/// Response body for the cache invalidation endpoints (DELETE /cache...)
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Human-readable summary
    pub message: String,
    /// Number of cached entries removed
    pub removed: usize,
}

impl InvalidateResponse {
    pub fn new(scope: impl AsRef<str>, removed: usize) -> Self {
        Self {
            message: format!("Invalidated {} ({} entries)", scope.as_ref(), removed),
            removed,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
