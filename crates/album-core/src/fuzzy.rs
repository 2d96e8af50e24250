//! Fuzzy matching: pull in assets near the exact matches.
//!
//! A candidate qualifies when it sits within the time window of any exact
//! match, or within the distance window (great-circle) of any exact match.
//! Either axis alone is sufficient; an asset missing a timestamp is simply
//! ineligible on the time axis, never an overall non-match, and likewise
//! for missing GPS. Candidates that are themselves exact matches are never
//! reported.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use album_catalog::{AssetRecord, GpsPoint, QuerySpec};
use album_config::{DateRange, Rule, Settings};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Proximity thresholds, from the rules-file `settings` block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyWindows {
    pub time: Duration,
    pub distance_meters: f64,
}

impl FuzzyWindows {
    pub fn new(time_window_minutes: u32, distance_meters: f64) -> Self {
        Self {
            time: Duration::minutes(i64::from(time_window_minutes)),
            distance_meters,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.time_window_minutes, settings.distance_meters)
    }
}

impl Default for FuzzyWindows {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Ids of candidates within either window of any exact match.
///
/// Pure over the already-fetched records. Returns nothing when `exact` is
/// empty; fuzzy expansion needs at least one anchor.
pub fn expand(
    exact: &[AssetRecord],
    candidates: &[AssetRecord],
    windows: &FuzzyWindows,
) -> BTreeSet<String> {
    if exact.is_empty() {
        return BTreeSet::new();
    }

    let exact_ids: BTreeSet<&str> = exact.iter().map(|a| a.id.as_str()).collect();
    let moments: Vec<DateTime<Utc>> = exact.iter().filter_map(AssetRecord::moment).collect();
    let positions: Vec<GpsPoint> = exact.iter().filter_map(|a| a.gps).collect();

    let mut matched = BTreeSet::new();
    for candidate in candidates {
        if exact_ids.contains(candidate.id.as_str()) {
            continue;
        }

        let near_in_time = candidate.moment().is_some_and(|moment| {
            moments
                .iter()
                .any(|anchor| (moment - *anchor).abs() <= windows.time)
        });
        // First qualifying axis wins; distance is only computed when the
        // time axis did not already admit the candidate.
        let near_in_space = !near_in_time
            && candidate.gps.is_some_and(|point| {
                positions
                    .iter()
                    .any(|anchor| haversine_meters(point, *anchor) <= windows.distance_meters)
            });

        if near_in_time || near_in_space {
            matched.insert(candidate.id.clone());
        }
    }
    matched
}

/// The catalog query that fetches the candidate pool for a rule: the span
/// of the exact matches' moments widened by the time window on both sides,
/// clamped back to the rule's own date bounds, with no other constraints.
///
/// Uses the same date field the rule itself filtered on. `None` when no
/// exact match carries a usable moment.
pub fn candidate_query(
    exact: &[AssetRecord],
    rule: &Rule,
    windows: &FuzzyWindows,
) -> Option<QuerySpec> {
    let moments: Vec<DateTime<Utc>> = exact.iter().filter_map(AssetRecord::moment).collect();
    let first = moments.iter().min()?;
    let last = moments.iter().max()?;

    let mut start = *first - windows.time;
    let mut end = *last + windows.time;
    for bound in [rule.taken.start, rule.created.start].into_iter().flatten() {
        start = start.max(bound);
    }
    for bound in [rule.taken.end, rule.created.end].into_iter().flatten() {
        end = end.min(bound);
    }

    let span = DateRange::new(Some(start), Some(end));
    let query = if rule.taken.is_unbounded() && !rule.created.is_unbounded() {
        QuerySpec {
            created: span,
            ..QuerySpec::default()
        }
    } else {
        QuerySpec {
            taken: span,
            ..QuerySpec::default()
        }
    };
    Some(query)
}

/// Great-circle distance between two points, in meters.
pub fn haversine_meters(a: GpsPoint, b: GpsPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let half_dlat = (lat2 - lat1) / 2.0;
    let half_dlon = (b.lon - a.lon).to_radians() / 2.0;

    let h = half_dlat.sin().powi(2) + lat1.cos() * lat2.cos() * half_dlon.sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}
