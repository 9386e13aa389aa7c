//! Background Tasks Module
//!
//! Contains background tasks that run while the orchestrator is serving.
//!
//! # Tasks
//! - Menu refresh: fires the `menu-update` sync at a configured interval
//! - Re-drain: follow-up drain cycles with backoff after failed deliveries

mod menu_refresh;
mod redrain;

pub use menu_refresh::spawn_menu_refresh_task;
pub use redrain::RedrainScheduler;
