//! Catalog service contract for Album Manager.
//!
//! The [`Catalog`] trait is the seam between the sync engine and whatever
//! stores the photos. It covers asset search, album CRUD, membership
//! mutation, sharing, and the user directory, plus the capability
//! declarations the query planner consults. [`immich::ImmichCatalog`] is
//! the production implementation; tests substitute an in-memory fake.

use std::collections::BTreeSet;

pub mod error;
pub mod immich;
pub mod types;

pub use error::{CatalogError, Result};
pub use immich::{ImmichCatalog, ImmichConfig};
pub use types::{
    AlbumInfo, AssetRecord, CatalogCapabilities, GpsPoint, LeafSupport, QuerySpec, UserInfo,
};

/// External photo catalog: search, albums, sharing, users.
///
/// Implementations are synchronous; the engine never issues more than one
/// call at a time. Asset and album ids are opaque strings owned by the
/// catalog.
pub trait Catalog {
    /// What the backing search API can filter natively.
    fn capabilities(&self) -> &CatalogCapabilities;

    /// Run one search query, following pagination to exhaustion.
    fn search(&self, query: &QuerySpec) -> Result<Vec<AssetRecord>>;

    /// Exact-name album lookup.
    fn find_album_by_name(&self, name: &str) -> Result<Option<AlbumInfo>>;

    /// Create an empty album.
    fn create_album(&self, name: &str, description: Option<&str>) -> Result<AlbumInfo>;

    /// Add assets to an album. Returns how many the catalog reports newly
    /// added; already-present assets are not an error.
    fn add_assets(&self, album_id: &str, asset_ids: &[String]) -> Result<usize>;

    /// Remove assets from an album. Returns how many were removed.
    fn remove_assets(&self, album_id: &str, asset_ids: &[String]) -> Result<usize>;

    /// Ids of users the album is currently shared with as viewers.
    fn album_viewers(&self, album_id: &str) -> Result<BTreeSet<String>>;

    /// Make the album's viewer set exactly `viewers`.
    fn update_sharing(&self, album_id: &str, viewers: &BTreeSet<String>) -> Result<()>;

    /// All users in the catalog's directory.
    fn list_users(&self) -> Result<Vec<UserInfo>>;

    /// The user the API key belongs to — the owner of every album this
    /// tool creates.
    fn current_user(&self) -> Result<UserInfo>;
}
