//! Shared test utilities for the album-manager workspace.
//!
//! This crate provides standardised test fixtures to eliminate duplication
//! across crate test suites. It is a dev-dependency only — never published.
//!
//! # Modules
//!
//! - [`asset`] — [`AssetBuilder`] for catalog asset records
//! - [`catalog`] — [`FakeCatalog`], an in-memory scripted Catalog
//! - [`rules`] — rule and condition-tree builders

pub mod asset;
pub mod catalog;
pub mod rules;

pub use asset::{AssetBuilder, asset};
pub use catalog::FakeCatalog;
pub use rules::{RuleBuilder, camera_leaf, favorite_leaf, kinds_leaf, people_leaf, rule, tags_leaf};
