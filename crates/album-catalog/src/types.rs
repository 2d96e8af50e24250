//! Catalog data types: asset records, query specs, capability declarations.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use album_config::{AssetKind, DateRange};

/// GPS position from an asset's EXIF data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPoint {
    pub lat: f64,
    pub lon: f64,
}

/// One asset as returned by a catalog search, carrying every attribute the
/// condition evaluator and fuzzy matcher read.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    pub id: String,
    pub kind: AssetKind,
    /// Capture time from EXIF, when the catalog knows it.
    pub taken_at: Option<DateTime<Utc>>,
    /// File creation time; the fallback moment for assets without EXIF.
    pub created_at: Option<DateTime<Utc>>,
    pub favorite: bool,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    /// Names of recognized people on the asset.
    pub people: Vec<String>,
    pub tags: Vec<String>,
    pub gps: Option<GpsPoint>,
}

impl AssetRecord {
    /// Best-known capture moment: EXIF time, else file creation time.
    pub fn moment(&self) -> Option<DateTime<Utc>> {
        self.taken_at.or(self.created_at)
    }
}

/// A flat constraint set the catalog can answer in one search call.
///
/// All constraints AND together. `people` relies on the catalog's native
/// AND semantics for multiple person filters; OR-of-people comes from the
/// planner issuing separate queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySpec {
    pub taken: DateRange,
    pub created: DateRange,
    pub favorite: Option<bool>,
    pub asset_types: Option<BTreeSet<AssetKind>>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub people: BTreeSet<String>,
}

impl QuerySpec {
    /// A query with only the rule's date bounds.
    pub fn date_bounded(taken: DateRange, created: DateRange) -> Self {
        Self {
            taken,
            created,
            ..Self::default()
        }
    }

    /// True when nothing beyond date bounds constrains the query.
    pub fn is_date_only(&self) -> bool {
        self.favorite.is_none()
            && self.asset_types.is_none()
            && self.camera_make.is_none()
            && self.camera_model.is_none()
            && self.people.is_empty()
    }
}

/// How well the catalog can filter one leaf kind server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafSupport {
    /// Fully filterable within one query.
    Native,
    /// Filterable, but multiple values in one query AND together, so
    /// disjunctions need separate queries.
    NativeAndOnly,
    /// Not filterable server-side at all; left to the residual predicate.
    ClientOnly,
}

impl LeafSupport {
    pub fn is_native(&self) -> bool {
        !matches!(self, LeafSupport::ClientOnly)
    }
}

/// Per-leaf-kind capability declarations a catalog implementation exposes
/// to the query planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCapabilities {
    pub favorite: LeafSupport,
    pub asset_types: LeafSupport,
    pub camera: LeafSupport,
    pub people: LeafSupport,
    pub tags: LeafSupport,
}

impl CatalogCapabilities {
    /// What the Immich search API supports natively.
    pub fn immich() -> Self {
        Self {
            favorite: LeafSupport::Native,
            asset_types: LeafSupport::Native,
            camera: LeafSupport::Native,
            people: LeafSupport::NativeAndOnly,
            tags: LeafSupport::ClientOnly,
        }
    }

    /// Everything client-side. Degrades every plan to date-bounded fetches;
    /// useful as a worst-case planner input.
    pub fn client_only() -> Self {
        Self {
            favorite: LeafSupport::ClientOnly,
            asset_types: LeafSupport::ClientOnly,
            camera: LeafSupport::ClientOnly,
            people: LeafSupport::ClientOnly,
            tags: LeafSupport::ClientOnly,
        }
    }
}

/// An album as the catalog reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumInfo {
    pub id: String,
    pub name: String,
    pub owner_id: Option<String>,
}

/// A user from the catalog's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}
