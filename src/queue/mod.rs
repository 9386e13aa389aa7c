//! Queue Module
//!
//! Offline write queue with bounded retry and dead-lettering.

mod offline;
mod operation;
mod retry;


pub use offline::{DrainReport, OfflineQueue, QueueCounts};
pub use operation::{OperationPayload, OperationStatus, QueuedOperation};
pub use retry::{Backoff, RetryPolicy};

/// Connectivity-restored trigger that drains the queue.
pub const OFFLINE_ORDER_TAG: &str = "offline-order";
