//! Strategy Module
//!
//! Request classification and the per-class fetch strategies.

mod classify;
mod engine;
pub mod fallback;


pub use classify::{RequestClass, RequestClassifier};
pub use engine::{Handled, ServedFrom, StrategyEngine, MENU_ENDPOINT};
