//! Blocking HTTP client for the Immich API.
//!
//! Wire behavior worth knowing about:
//!
//! - Search is `POST /search/metadata` with `page`/`size` pagination; the
//!   server hands back a `nextPage` token until the result set is drained.
//! - Person filters go out as person *ids*. Rules name people, so the
//!   client resolves names through a lazily cached `GET /people` listing.
//! - Asset-kind filtering happens client-side on the returned pages, which
//!   lets one query carry a whole kind set.
//! - Membership mutations are chunked, and every call is paced by a minimum
//!   inter-call delay so sync cycles stay polite to the server.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::Method;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use album_config::AssetKind;

use crate::error::{CatalogError, Result};
use crate::types::{
    AlbumInfo, AssetRecord, CatalogCapabilities, GpsPoint, QuerySpec, UserInfo,
};
use crate::Catalog;

const API_KEY_HEADER: &str = "x-api-key";

/// Connection settings for [`ImmichCatalog`].
#[derive(Debug, Clone)]
pub struct ImmichConfig {
    /// Server URL, with or without the `/api` suffix.
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    /// Search page size.
    pub page_size: u32,
    /// Membership mutation chunk size.
    pub chunk_size: usize,
    /// Minimum delay between any two API calls.
    pub min_call_interval: Duration,
}

impl ImmichConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            page_size: 1000,
            chunk_size: 500,
            min_call_interval: Duration::from_millis(100),
        }
    }
}

/// [`Catalog`] implementation over the Immich HTTP API.
pub struct ImmichCatalog {
    config: ImmichConfig,
    base: String,
    client: Client,
    capabilities: CatalogCapabilities,
    last_call: Cell<Option<Instant>>,
    /// name (lowercased) → person id, filled on first person lookup.
    people: RefCell<Option<HashMap<String, String>>>,
}

impl ImmichCatalog {
    pub fn new(config: ImmichConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let base = normalize_base(&config.base_url);
        Ok(Self {
            config,
            base,
            client,
            capabilities: CatalogCapabilities::immich(),
            last_call: Cell::new(None),
            people: RefCell::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Enforce the minimum inter-call delay.
    fn pace(&self) {
        if let Some(last) = self.last_call.get() {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_call_interval {
                std::thread::sleep(self.config.min_call_interval - elapsed);
            }
        }
        self.last_call.set(Some(Instant::now()));
    }

    fn request(&self, method: Method, path: &str) -> reqwest::blocking::RequestBuilder {
        self.pace();
        self.client
            .request(method, self.url(path))
            .header(API_KEY_HEADER, &self.config.api_key)
    }

    fn check(&self, response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().unwrap_or_default();
        Err(CatalogError::Api {
            status: status.as_u16(),
            message: snippet(&message),
        })
    }

    /// Resolve rule-facing person names to catalog person ids, case
    /// insensitively, through the cached `/people` listing.
    fn person_ids(&self, names: &BTreeSet<String>) -> Result<Vec<String>> {
        if self.people.borrow().is_none() {
            let response = self.request(Method::GET, "/people").send()?;
            let listing: PeopleResponse = self.check(response)?.json()?;
            let map: HashMap<String, String> = listing
                .people
                .into_iter()
                .map(|p| (p.name.trim().to_lowercase(), p.id))
                .collect();
            debug!(people = map.len(), "primed person name cache");
            *self.people.borrow_mut() = Some(map);
        }

        let cache = self.people.borrow();
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let key = name.trim().to_lowercase();
            match cache.as_ref().and_then(|map| map.get(&key)) {
                Some(id) => ids.push(id.clone()),
                None => {
                    return Err(CatalogError::UnknownPerson { name: name.clone() });
                }
            }
        }
        Ok(ids)
    }
}

impl Catalog for ImmichCatalog {
    fn capabilities(&self) -> &CatalogCapabilities {
        &self.capabilities
    }

    fn search(&self, query: &QuerySpec) -> Result<Vec<AssetRecord>> {
        let person_ids = if query.people.is_empty() {
            Vec::new()
        } else {
            self.person_ids(&query.people)?
        };

        let mut assets = Vec::new();
        let mut page = 1u32;
        loop {
            let payload = search_payload(query, page, self.config.page_size, &person_ids);
            let response = self
                .request(Method::POST, "/search/metadata")
                .json(&payload)
                .send()?;
            let parsed: SearchResponse = self.check(response)?.json()?;
            debug!(page, items = parsed.assets.items.len(), "search page fetched");

            for item in parsed.assets.items {
                let record = item.into_record();
                if let Some(kinds) = &query.asset_types
                    && !kinds.contains(&record.kind)
                {
                    continue;
                }
                assets.push(record);
            }

            match parsed.assets.next_page {
                Some(token) => page = token.into_page()?,
                None => break,
            }
        }
        Ok(assets)
    }

    fn find_album_by_name(&self, name: &str) -> Result<Option<AlbumInfo>> {
        let response = self.request(Method::GET, "/albums").send()?;
        let albums: Vec<AlbumResponse> = self.check(response)?.json()?;
        Ok(albums
            .into_iter()
            .find(|album| album.album_name == name)
            .map(AlbumResponse::into_info))
    }

    fn create_album(&self, name: &str, description: Option<&str>) -> Result<AlbumInfo> {
        let mut payload = Map::new();
        payload.insert("albumName".into(), name.into());
        if let Some(description) = description {
            payload.insert("description".into(), description.into());
        }
        let response = self
            .request(Method::POST, "/albums")
            .json(&Value::Object(payload))
            .send()?;
        let album: AlbumResponse = self.check(response)?.json()?;
        Ok(album.into_info())
    }

    fn add_assets(&self, album_id: &str, asset_ids: &[String]) -> Result<usize> {
        self.bulk_assets(Method::PUT, album_id, asset_ids, "add")
    }

    fn remove_assets(&self, album_id: &str, asset_ids: &[String]) -> Result<usize> {
        self.bulk_assets(Method::DELETE, album_id, asset_ids, "remove")
    }

    fn album_viewers(&self, album_id: &str) -> Result<BTreeSet<String>> {
        let response = self
            .request(Method::GET, &format!("/albums/{album_id}"))
            .send()?;
        let detail: AlbumDetailResponse = self.check(response)?.json()?;
        Ok(detail
            .album_users
            .into_iter()
            .filter(|share| share.role == "viewer")
            .map(|share| share.user.id)
            .collect())
    }

    fn update_sharing(&self, album_id: &str, viewers: &BTreeSet<String>) -> Result<()> {
        let current = self.album_viewers(album_id)?;

        let to_add: Vec<&String> = viewers.difference(&current).collect();
        if !to_add.is_empty() {
            let album_users: Vec<Value> = to_add
                .iter()
                .map(|id| serde_json::json!({ "userId": id, "role": "viewer" }))
                .collect();
            let response = self
                .request(Method::PUT, &format!("/albums/{album_id}/users"))
                .json(&serde_json::json!({ "albumUsers": album_users }))
                .send()?;
            self.check(response)?;
        }

        for user_id in current.difference(viewers) {
            let response = self
                .request(Method::DELETE, &format!("/albums/{album_id}/user/{user_id}"))
                .send()?;
            self.check(response)?;
        }
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<UserInfo>> {
        let response = self.request(Method::GET, "/users").send()?;
        let users: Vec<UserResponse> = self.check(response)?.json()?;
        Ok(users.into_iter().map(UserResponse::into_info).collect())
    }

    fn current_user(&self) -> Result<UserInfo> {
        let response = self.request(Method::GET, "/users/me").send()?;
        let user: UserResponse = self.check(response)?.json()?;
        Ok(user.into_info())
    }
}

impl ImmichCatalog {
    fn bulk_assets(
        &self,
        method: Method,
        album_id: &str,
        asset_ids: &[String],
        action: &str,
    ) -> Result<usize> {
        let mut affected = 0;
        for chunk in asset_ids.chunks(self.config.chunk_size.max(1)) {
            let response = self
                .request(method.clone(), &format!("/albums/{album_id}/assets"))
                .json(&serde_json::json!({ "ids": chunk }))
                .send()?;
            let results: Vec<BulkResult> = self.check(response)?.json()?;
            for result in &results {
                if result.success {
                    affected += 1;
                } else if let Some(error) = &result.error {
                    // "duplicate" on add just means the asset was already
                    // in the album; anything else deserves a warning.
                    if error != "duplicate" {
                        warn!(asset = %result.id, error = %error, "asset {action} rejected");
                    }
                }
            }
            debug!(
                album = album_id,
                chunk = chunk.len(),
                affected,
                "album asset {action} chunk done"
            );
        }
        Ok(affected)
    }
}

/// Accept the server URL with or without the `/api` suffix.
fn normalize_base(raw: &str) -> String {
    let trimmed = raw.trim_end_matches('/');
    if trimmed.ends_with("/api") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api")
    }
}

fn snippet(message: &str) -> String {
    const LIMIT: usize = 200;
    let trimmed = message.trim();
    if trimmed.len() <= LIMIT {
        trimmed.to_string()
    } else {
        let mut end = LIMIT;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}

fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Build the `/search/metadata` body for one page.
fn search_payload(query: &QuerySpec, page: u32, size: u32, person_ids: &[String]) -> Value {
    let mut body = Map::new();
    body.insert("page".into(), page.into());
    body.insert("size".into(), size.into());
    body.insert("withExif".into(), true.into());
    body.insert("withPeople".into(), true.into());

    if let Some(start) = query.taken.start {
        body.insert("takenAfter".into(), format_timestamp(start).into());
    }
    if let Some(end) = query.taken.end {
        body.insert("takenBefore".into(), format_timestamp(end).into());
    }
    if let Some(start) = query.created.start {
        body.insert("createdAfter".into(), format_timestamp(start).into());
    }
    if let Some(end) = query.created.end {
        body.insert("createdBefore".into(), format_timestamp(end).into());
    }
    if let Some(favorite) = query.favorite {
        body.insert("isFavorite".into(), favorite.into());
    }
    if let Some(make) = &query.camera_make {
        body.insert("make".into(), make.as_str().into());
    }
    if let Some(model) = &query.camera_model {
        body.insert("model".into(), model.as_str().into());
    }
    if !person_ids.is_empty() {
        body.insert("personIds".into(), person_ids.into());
    }

    Value::Object(body)
}

fn parse_kind(raw: &str) -> AssetKind {
    match raw {
        "IMAGE" => AssetKind::Image,
        "VIDEO" => AssetKind::Video,
        "AUDIO" => AssetKind::Audio,
        _ => AssetKind::Other,
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    assets: AssetPage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetPage {
    #[serde(default)]
    items: Vec<AssetItem>,
    next_page: Option<PageToken>,
}

/// `nextPage` arrives as a string in current servers; accept a bare number
/// too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PageToken {
    Number(u32),
    Text(String),
}

impl PageToken {
    fn into_page(self) -> Result<u32> {
        match self {
            PageToken::Number(page) => Ok(page),
            PageToken::Text(raw) => raw
                .parse()
                .map_err(|_| CatalogError::Decode(format!("bad nextPage token '{raw}'"))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetItem {
    id: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    is_favorite: bool,
    file_created_at: Option<DateTime<Utc>>,
    exif_info: Option<ExifInfo>,
    #[serde(default)]
    people: Vec<PersonRef>,
    #[serde(default)]
    tags: Vec<TagRef>,
}

impl AssetItem {
    fn into_record(self) -> AssetRecord {
        let exif = self.exif_info.unwrap_or_default();
        let gps = match (exif.latitude, exif.longitude) {
            (Some(lat), Some(lon)) => Some(GpsPoint { lat, lon }),
            _ => None,
        };
        AssetRecord {
            id: self.id,
            kind: self.kind.as_deref().map(parse_kind).unwrap_or(AssetKind::Other),
            taken_at: exif.date_time_original,
            created_at: self.file_created_at,
            favorite: self.is_favorite,
            camera_make: exif.make,
            camera_model: exif.model,
            people: self.people.into_iter().filter_map(|p| p.name).collect(),
            tags: self.tags.into_iter().filter_map(|t| t.name).collect(),
            gps,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExifInfo {
    date_time_original: Option<DateTime<Utc>>,
    make: Option<String>,
    model: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PersonRef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagRef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumResponse {
    id: String,
    album_name: String,
    owner_id: Option<String>,
}

impl AlbumResponse {
    fn into_info(self) -> AlbumInfo {
        AlbumInfo {
            id: self.id,
            name: self.album_name,
            owner_id: self.owner_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumDetailResponse {
    #[serde(default)]
    album_users: Vec<AlbumShare>,
}

#[derive(Debug, Deserialize)]
struct AlbumShare {
    user: ShareUser,
    #[serde(default)]
    role: String,
}

#[derive(Debug, Deserialize)]
struct ShareUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    email: String,
    name: Option<String>,
}

impl UserResponse {
    fn into_info(self) -> UserInfo {
        UserInfo {
            id: self.id,
            email: self.email,
            name: self.name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PeopleResponse {
    #[serde(default)]
    people: Vec<Person>,
}

#[derive(Debug, Deserialize)]
struct Person {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct BulkResult {
    id: String,
    #[serde(default)]
    success: bool,
    error: Option<String>,
}
