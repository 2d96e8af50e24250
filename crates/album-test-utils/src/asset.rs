//! [`AssetBuilder`] for constructing catalog asset records in tests.

use chrono::{DateTime, Utc};

use album_catalog::{AssetRecord, GpsPoint};
use album_config::AssetKind;

/// Start building an asset record. Defaults: `IMAGE`, not favorite, no
/// timestamps, no camera, no people, no tags, no GPS.
pub fn asset(id: &str) -> AssetBuilder {
    AssetBuilder {
        record: AssetRecord {
            id: id.to_string(),
            kind: AssetKind::Image,
            taken_at: None,
            created_at: None,
            favorite: false,
            camera_make: None,
            camera_model: None,
            people: Vec::new(),
            tags: Vec::new(),
            gps: None,
        },
    }
}

/// Fluent builder over [`AssetRecord`].
///
/// # Example
///
/// ```rust
/// use album_test_utils::asset;
///
/// let record = asset("a1")
///     .taken("2023-12-25T10:00:00Z")
///     .favorite(true)
///     .person("Alice")
///     .build();
/// assert!(record.favorite);
/// ```
pub struct AssetBuilder {
    record: AssetRecord,
}

impl AssetBuilder {
    pub fn kind(mut self, kind: AssetKind) -> Self {
        self.record.kind = kind;
        self
    }

    /// EXIF capture time, RFC 3339.
    ///
    /// # Panics
    /// Panics on an unparsable timestamp.
    pub fn taken(mut self, rfc3339: &str) -> Self {
        self.record.taken_at = Some(parse_utc(rfc3339));
        self
    }

    /// File creation time, RFC 3339.
    ///
    /// # Panics
    /// Panics on an unparsable timestamp.
    pub fn created(mut self, rfc3339: &str) -> Self {
        self.record.created_at = Some(parse_utc(rfc3339));
        self
    }

    pub fn favorite(mut self, favorite: bool) -> Self {
        self.record.favorite = favorite;
        self
    }

    pub fn camera(mut self, make: &str, model: &str) -> Self {
        self.record.camera_make = Some(make.to_string());
        self.record.camera_model = Some(model.to_string());
        self
    }

    pub fn person(mut self, name: &str) -> Self {
        self.record.people.push(name.to_string());
        self
    }

    pub fn tag(mut self, name: &str) -> Self {
        self.record.tags.push(name.to_string());
        self
    }

    pub fn gps(mut self, lat: f64, lon: f64) -> Self {
        self.record.gps = Some(GpsPoint { lat, lon });
        self
    }

    pub fn build(self) -> AssetRecord {
        self.record
    }
}

fn parse_utc(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .unwrap_or_else(|e| panic!("AssetBuilder: bad timestamp '{raw}': {e}"))
        .with_timezone(&Utc)
}
