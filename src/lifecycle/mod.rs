//! Lifecycle Module
//!
//! Install / activate state machine over cache generations.

mod controller;
mod manifest;

pub use controller::{
    ActivationReport, GenerationPointers, GenerationView, LifecycleController, LifecycleState,
    LifecycleStatus,
};
pub use manifest::StaticManifest;
