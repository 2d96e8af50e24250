//! Core orchestration layer for Album Manager
//!
//! This crate turns validated rules into catalog state, implementing:
//!
//! - **Condition evaluation**: pure boolean trees over asset attributes
//! - **Query planning**: DNF rewrite of condition trees into minimal
//!   native catalog queries plus an exact residual predicate
//! - **Recurring expansion**: one concrete rule per year, DST-correct
//! - **Fuzzy matching**: time/distance proximity expansion of exact matches
//! - **Reconciliation**: desired-versus-persisted membership plans
//! - **Sharing resolution**: per-rule and global share targets to user ids
//! - **SyncEngine**: the per-cycle driver tying all of the above together
//!
//! # Architecture
//!
//! `album-core` sits above the Layer 0 crates and below the CLI:
//!
//! ```text
//!                  CLI
//!                   |
//!              album-core
//!                   |
//!     +-------------+-------------+
//!     |             |             |
//! album-config album-catalog album-store
//! ```

pub mod error;
pub mod eval;
pub mod fuzzy;
pub mod planner;
pub mod recurring;
pub mod share;
pub mod sync;

pub use error::{Error, Result};
pub use eval::evaluate;
pub use fuzzy::FuzzyWindows;
pub use planner::{QueryPlan, QueryPlanner};
pub use recurring::expand_rules;
pub use share::{GlobalSharing, ShareResolver};
pub use sync::{
    CycleReport, EngineDefaults, ReconcilePlan, RuleReport, SyncEngine, SyncOptions, reconcile,
};
