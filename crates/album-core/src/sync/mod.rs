//! Sync cycle orchestration.
//!
//! This module provides:
//! - **engine**: [`SyncEngine`], which drives one cycle over every rule
//! - **reconcile**: pure desired-versus-persisted membership arithmetic
//! - **report**: per-rule and per-cycle outcome types

mod engine;
mod reconcile;
mod report;

pub use engine::{EngineDefaults, SyncEngine, SyncOptions};
pub use reconcile::{ReconcilePlan, reconcile};
pub use report::{CycleReport, RuleReport};
