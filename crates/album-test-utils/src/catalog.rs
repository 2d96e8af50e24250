//! [`FakeCatalog`], an in-memory scripted [`Catalog`] implementation.
//!
//! The fake answers searches from a fixed asset list, applying every
//! constraint present in the query the way the real service would, and
//! records every call so tests can assert on wire traffic. Album, member,
//! and viewer state is mutable behind a `RefCell`; the trait takes `&self`
//! and the engine is single-threaded.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use album_catalog::{
    AlbumInfo, AssetRecord, Catalog, CatalogCapabilities, CatalogError, QuerySpec, Result, UserInfo,
};

#[derive(Default)]
struct State {
    albums: Vec<AlbumInfo>,
    descriptions: BTreeMap<String, String>,
    members: BTreeMap<String, BTreeSet<String>>,
    viewers: BTreeMap<String, BTreeSet<String>>,
    searches: Vec<QuerySpec>,
    add_calls: Vec<(String, Vec<String>)>,
    remove_calls: Vec<(String, Vec<String>)>,
    sharing_updates: Vec<(String, BTreeSet<String>)>,
    next_album_id: u32,
}

/// In-memory catalog double.
///
/// # Example
///
/// ```rust
/// use album_catalog::{Catalog, QuerySpec};
/// use album_test_utils::{FakeCatalog, asset};
///
/// let catalog = FakeCatalog::new()
///     .with_asset(asset("a1").favorite(true).build())
///     .with_asset(asset("a2").build());
///
/// let hits = catalog
///     .search(&QuerySpec { favorite: Some(true), ..QuerySpec::default() })
///     .unwrap();
/// assert_eq!(hits.len(), 1);
/// ```
pub struct FakeCatalog {
    capabilities: CatalogCapabilities,
    owner: UserInfo,
    users: Vec<UserInfo>,
    assets: Vec<AssetRecord>,
    fail_search_make: Option<String>,
    fail_user_directory: bool,
    state: RefCell<State>,
}

impl Default for FakeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            capabilities: CatalogCapabilities::immich(),
            owner: UserInfo {
                id: "owner-1".to_string(),
                email: "owner@example.com".to_string(),
                name: Some("Owner".to_string()),
            },
            users: Vec::new(),
            assets: Vec::new(),
            fail_search_make: None,
            fail_user_directory: false,
            state: RefCell::new(State::default()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: CatalogCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_asset(mut self, asset: AssetRecord) -> Self {
        self.assets.push(asset);
        self
    }

    pub fn with_assets(mut self, assets: Vec<AssetRecord>) -> Self {
        self.assets.extend(assets);
        self
    }

    /// Add a directory user; ids are assigned `u1`, `u2`, ... in call order.
    pub fn with_user(mut self, email: &str) -> Self {
        let id = format!("u{}", self.users.len() + 1);
        self.users.push(UserInfo {
            id,
            email: email.to_string(),
            name: None,
        });
        self
    }

    /// Any search whose `camera_make` equals `make` fails with a 500.
    pub fn with_search_failure_for_make(mut self, make: &str) -> Self {
        self.fail_search_make = Some(make.to_string());
        self
    }

    /// `list_users` fails with a 500; sharing should degrade, not abort.
    pub fn with_user_directory_failure(mut self) -> Self {
        self.fail_user_directory = true;
        self
    }

    /// Create an album directly in catalog state, bypassing call recording.
    pub fn seed_album(&self, name: &str) -> AlbumInfo {
        let mut state = self.state.borrow_mut();
        state.next_album_id += 1;
        let info = AlbumInfo {
            id: format!("album-{}", state.next_album_id),
            name: name.to_string(),
            owner_id: Some(self.owner.id.clone()),
        };
        state.albums.push(info.clone());
        info
    }

    /// Put assets into an album directly, as if added out-of-band.
    pub fn seed_members(&self, album_id: &str, asset_ids: &[&str]) {
        let mut state = self.state.borrow_mut();
        let members = state.members.entry(album_id.to_string()).or_default();
        for id in asset_ids {
            members.insert((*id).to_string());
        }
    }

    /// Set an album's viewer list directly.
    pub fn seed_viewers(&self, album_id: &str, user_ids: &[&str]) {
        let mut state = self.state.borrow_mut();
        state.viewers.insert(
            album_id.to_string(),
            user_ids.iter().map(|id| (*id).to_string()).collect(),
        );
    }

    pub fn owner_id(&self) -> &str {
        &self.owner.id
    }

    pub fn searches(&self) -> Vec<QuerySpec> {
        self.state.borrow().searches.clone()
    }

    pub fn albums(&self) -> Vec<AlbumInfo> {
        self.state.borrow().albums.clone()
    }

    pub fn album_named(&self, name: &str) -> Option<AlbumInfo> {
        self.state
            .borrow()
            .albums
            .iter()
            .find(|album| album.name == name)
            .cloned()
    }

    pub fn description_of(&self, album_id: &str) -> Option<String> {
        self.state.borrow().descriptions.get(album_id).cloned()
    }

    pub fn members_of(&self, album_id: &str) -> BTreeSet<String> {
        self.state
            .borrow()
            .members
            .get(album_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn viewers_of(&self, album_id: &str) -> BTreeSet<String> {
        self.state
            .borrow()
            .viewers
            .get(album_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn add_calls(&self) -> Vec<(String, Vec<String>)> {
        self.state.borrow().add_calls.clone()
    }

    pub fn remove_calls(&self) -> Vec<(String, Vec<String>)> {
        self.state.borrow().remove_calls.clone()
    }

    pub fn sharing_updates(&self) -> Vec<(String, BTreeSet<String>)> {
        self.state.borrow().sharing_updates.clone()
    }

    fn matches(query: &QuerySpec, asset: &AssetRecord) -> bool {
        if !query.taken.is_unbounded() {
            match asset.moment() {
                Some(moment) if query.taken.contains(moment) => {}
                _ => return false,
            }
        }
        if !query.created.is_unbounded() {
            match asset.created_at {
                Some(created) if query.created.contains(created) => {}
                _ => return false,
            }
        }
        if let Some(favorite) = query.favorite
            && asset.favorite != favorite
        {
            return false;
        }
        if let Some(kinds) = &query.asset_types
            && !kinds.contains(&asset.kind)
        {
            return false;
        }
        if let Some(make) = &query.camera_make
            && !text_matches(asset.camera_make.as_deref(), make)
        {
            return false;
        }
        if let Some(model) = &query.camera_model
            && !text_matches(asset.camera_model.as_deref(), model)
        {
            return false;
        }
        for name in &query.people {
            if !asset.people.iter().any(|person| text_eq(person, name)) {
                return false;
            }
        }
        true
    }
}

impl Catalog for FakeCatalog {
    fn capabilities(&self) -> &CatalogCapabilities {
        &self.capabilities
    }

    fn search(&self, query: &QuerySpec) -> Result<Vec<AssetRecord>> {
        self.state.borrow_mut().searches.push(query.clone());
        if let Some(poison) = &self.fail_search_make
            && query.camera_make.as_deref() == Some(poison.as_str())
        {
            return Err(CatalogError::Api {
                status: 500,
                message: "search backend exploded".to_string(),
            });
        }
        Ok(self
            .assets
            .iter()
            .filter(|asset| Self::matches(query, asset))
            .cloned()
            .collect())
    }

    fn find_album_by_name(&self, name: &str) -> Result<Option<AlbumInfo>> {
        Ok(self.album_named(name))
    }

    fn create_album(&self, name: &str, description: Option<&str>) -> Result<AlbumInfo> {
        let mut state = self.state.borrow_mut();
        state.next_album_id += 1;
        let info = AlbumInfo {
            id: format!("album-{}", state.next_album_id),
            name: name.to_string(),
            owner_id: Some(self.owner.id.clone()),
        };
        state.albums.push(info.clone());
        if let Some(description) = description {
            state
                .descriptions
                .insert(info.id.clone(), description.to_string());
        }
        Ok(info)
    }

    fn add_assets(&self, album_id: &str, asset_ids: &[String]) -> Result<usize> {
        let mut state = self.state.borrow_mut();
        state
            .add_calls
            .push((album_id.to_string(), asset_ids.to_vec()));
        let members = state.members.entry(album_id.to_string()).or_default();
        let mut added = 0;
        for id in asset_ids {
            if members.insert(id.clone()) {
                added += 1;
            }
        }
        Ok(added)
    }

    fn remove_assets(&self, album_id: &str, asset_ids: &[String]) -> Result<usize> {
        let mut state = self.state.borrow_mut();
        state
            .remove_calls
            .push((album_id.to_string(), asset_ids.to_vec()));
        let members = state.members.entry(album_id.to_string()).or_default();
        let mut removed = 0;
        for id in asset_ids {
            if members.remove(id) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn album_viewers(&self, album_id: &str) -> Result<BTreeSet<String>> {
        Ok(self.viewers_of(album_id))
    }

    fn update_sharing(&self, album_id: &str, viewers: &BTreeSet<String>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state
            .sharing_updates
            .push((album_id.to_string(), viewers.clone()));
        state.viewers.insert(album_id.to_string(), viewers.clone());
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<UserInfo>> {
        if self.fail_user_directory {
            return Err(CatalogError::Api {
                status: 500,
                message: "user directory unavailable".to_string(),
            });
        }
        let mut users = vec![self.owner.clone()];
        users.extend(self.users.iter().cloned());
        Ok(users)
    }

    fn current_user(&self) -> Result<UserInfo> {
        Ok(self.owner.clone())
    }
}

fn text_eq(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn text_matches(actual: Option<&str>, wanted: &str) -> bool {
    actual.is_some_and(|value| text_eq(value, wanted))
}
