//! Persistent sync state for Album Manager.
//!
//! One SQLite file holds everything the engine remembers between cycles:
//! which assets it placed in which album for which rule (and whether the
//! match was exact or fuzzy), which assets it has ever analyzed, and the
//! history of sync runs.

pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{
    MatchKind, MatchRecord, MembershipStore, RunOutcome, RunStatus, SyncRunRecord,
};
