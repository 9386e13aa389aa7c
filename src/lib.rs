//! Offline Orders - Offline request-interception cache orchestrator
//!
//! Classifies outbound storefront requests, serves them from versioned
//! cache generations or the network, and parks failed order submissions in
//! a durable queue that drains when connectivity returns.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod network;
pub mod notify;
pub mod queue;
pub mod strategy;
pub mod tasks;
pub mod worker;

pub use api::AppState;
pub use config::Config;
pub use error::{Error, Result};
pub use tasks::spawn_menu_refresh_task;
pub use worker::{Event, EventOutcome, ServiceWorker};
