//! Cache Module
//!
//! Generation-scoped durable response storage.

mod entry;
mod generation;
mod stats;
mod store;

// Re-export public types
pub use entry::{CacheEntry, ResponsePayload};
pub use generation::{CacheGeneration, GenerationKind, GenerationNames};
pub use stats::InterceptStats;
pub use store::CacheStore;

pub(crate) use store::{parse_timestamp, timestamp};
