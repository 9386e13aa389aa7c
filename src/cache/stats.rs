//! Interception Statistics Module
//!
//! Tracks how intercepted requests were resolved.

use serde::Serialize;

// == Intercept Stats ==
/// Counters for the interception boundary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterceptStats {
    /// Cache lookups that found an entry
    pub hits: u64,
    /// Cache lookups that found nothing
    pub misses: u64,
    /// Responses served straight from the network
    pub network: u64,
    /// Cached responses served after a network failure
    pub fallbacks: u64,
    /// Synthesized offline placeholders
    pub synthesized: u64,
    /// Requests that failed with no safe fallback
    pub failures: u64,
    /// Mutating requests handed to the offline queue
    pub enqueued: u64,
}

impl InterceptStats {
    // == Constructor ==
    /// Creates a new InterceptStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Recorders ==
    /// Records the outcome of a cache lookup.
    pub fn record_lookup(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub fn record_network(&mut self) {
        self.network += 1;
    }

    pub fn record_fallback(&mut self) {
        self.fallbacks += 1;
    }

    pub fn record_synthesized(&mut self) {
        self.synthesized += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn record_enqueued(&mut self) {
        self.enqueued += 1;
    }
}
