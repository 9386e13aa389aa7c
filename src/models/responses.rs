//! Response DTOs for the orchestrator API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::InterceptStats;
use crate::queue::{QueueCounts, QueuedOperation};

/// Response body for GET /generations
#[derive(Debug, Clone, Serialize)]
pub struct GenerationsResponse {
    pub current_static: Option<String>,
    pub current_dynamic: Option<String>,
    /// Every stored generation, oldest first
    pub generations: Vec<String>,
}

/// Response body for GET /queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueResponse {
    pub counts: QueueCounts,
    /// Every queued operation, DEAD ones included
    pub operations: Vec<QueuedOperation>,
}

impl QueueResponse {
    pub fn new(counts: QueueCounts, operations: Vec<QueuedOperation>) -> Self {
        Self { counts, operations }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Cache lookups that found an entry
    pub hits: u64,
    /// Cache lookups that found nothing
    pub misses: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub network: u64,
    pub fallbacks: u64,
    pub synthesized: u64,
    pub failures: u64,
    pub enqueued: u64,
    /// Queue depth by status
    pub queue: QueueCounts,
}

impl StatsResponse {
    /// Creates a new StatsResponse from interception counters and queue depth
    pub fn new(stats: &InterceptStats, queue: QueueCounts) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            hit_rate: stats.hit_rate(),
            network: stats.network,
            fallbacks: stats.fallbacks,
            synthesized: stats.synthesized,
            failures: stats.failures,
            enqueued: stats.enqueued,
            queue,
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
