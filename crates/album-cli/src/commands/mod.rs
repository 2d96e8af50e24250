//! Command implementations for album-cli

pub mod history;
pub mod sync;
pub mod validate;

pub use history::run_history;
pub use sync::run_sync;
pub use validate::run_validate;
