//! End-to-end sync cycle tests.
//!
//! These drive [`SyncEngine::run_cycle`] against the scripted
//! [`FakeCatalog`] and a real [`MembershipStore`], exercising the complete
//! flow: recurring expansion -> query planning -> fuzzy expansion -> album
//! creation -> membership reconciliation -> run history.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use pretty_assertions::assert_eq;

use album_config::{ConditionNode, Rule, RuleEntry, RuleSet, Settings, SyncMode};
use album_core::{CycleReport, EngineDefaults, SyncEngine, SyncOptions};
use album_store::{MatchKind, MembershipStore, RunStatus};
use album_test_utils::{FakeCatalog, asset, camera_leaf, favorite_leaf, rule};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn ruleset_with(mode: SyncMode, rules: Vec<Rule>) -> RuleSet {
    RuleSet {
        mode,
        settings: Settings::default(),
        entries: rules.into_iter().map(RuleEntry::Concrete).collect(),
    }
}

fn favorites_rule() -> Rule {
    rule("favorites", "Favorites")
        .condition(favorite_leaf(true))
        .build()
}

/// Run one non-dry cycle with default engine settings.
fn run(catalog: &FakeCatalog, ruleset: &RuleSet, store: &mut MembershipStore) -> CycleReport {
    let engine = SyncEngine::new(catalog, EngineDefaults::default());
    engine
        .run_cycle(ruleset, store, &SyncOptions::default())
        .unwrap()
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| (*id).to_string()).collect()
}

fn member_ids(store: &MembershipStore, rule_id: &str, album_id: &str) -> Vec<String> {
    store
        .get_membership(rule_id, album_id)
        .unwrap()
        .into_iter()
        .map(|record| record.asset_id)
        .collect()
}

// =============================================================================
// First Cycle
// =============================================================================

#[test]
fn test_first_cycle_creates_album_and_adds_matches() {
    let catalog = FakeCatalog::new()
        .with_asset(asset("a1").favorite(true).build())
        .with_asset(asset("a2").favorite(true).build())
        .with_asset(asset("a3").build());
    let mut store = MembershipStore::open_in_memory().unwrap();
    let ruleset = ruleset_with(SyncMode::Sync, vec![favorites_rule()]);

    let report = run(&catalog, &ruleset, &mut store);

    let album = catalog.album_named("Favorites").expect("album created");
    assert_eq!(catalog.members_of(&album.id), set(&["a1", "a2"]));
    assert_eq!(report.rules.len(), 1);
    assert!(report.rules[0].created_album);
    assert_eq!(report.rules[0].exact_matches, 2);
    assert_eq!(report.rules[0].added, 2);
    assert_eq!(report.rules[0].removed, 0);

    // Membership rows persisted as exact matches.
    let records = store.get_membership("favorites", &album.id).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.kind == MatchKind::Exact));

    // The cycle landed in the run history.
    let run_row = store.last_sync_run().unwrap().expect("run recorded");
    assert_eq!(run_row.status, RunStatus::Completed);
    assert_eq!(run_row.rules_processed, 1);
    assert_eq!(run_row.assets_added, 2);
    assert_eq!(run_row.assets_removed, 0);
}

#[test]
fn test_created_album_carries_rule_description() {
    let catalog = FakeCatalog::new().with_asset(asset("a1").favorite(true).build());
    let mut store = MembershipStore::open_in_memory().unwrap();
    let described = rule("favorites", "Favorites")
        .description("Best of the year")
        .condition(favorite_leaf(true))
        .build();

    run(&catalog, &ruleset_with(SyncMode::Sync, vec![described]), &mut store);

    let album = catalog.album_named("Favorites").unwrap();
    assert_eq!(
        catalog.description_of(&album.id).as_deref(),
        Some("Best of the year")
    );
}

#[test]
fn test_rule_without_matches_still_creates_its_album() {
    let catalog = FakeCatalog::new().with_asset(asset("a1").build());
    let mut store = MembershipStore::open_in_memory().unwrap();
    let ruleset = ruleset_with(SyncMode::Sync, vec![favorites_rule()]);

    let report = run(&catalog, &ruleset, &mut store);

    let album = catalog.album_named("Favorites").expect("album exists");
    assert!(catalog.members_of(&album.id).is_empty());
    assert_eq!(report.rules[0].added, 0);
    assert!(catalog.add_calls().is_empty());
}

// =============================================================================
// Idempotence
// =============================================================================

#[test]
fn test_repeated_cycles_are_idempotent() {
    let catalog = FakeCatalog::new()
        .with_asset(asset("a1").favorite(true).build())
        .with_asset(asset("a2").favorite(true).build());
    let mut store = MembershipStore::open_in_memory().unwrap();
    let ruleset = ruleset_with(SyncMode::Sync, vec![favorites_rule()]);

    let first = run(&catalog, &ruleset, &mut store);
    let second = run(&catalog, &ruleset, &mut store);

    assert_eq!(first.rules[0].added, 2);
    assert_eq!(second.rules[0].added, 0);
    assert_eq!(second.rules[0].removed, 0);
    assert!(!second.rules[0].created_album);

    // The second cycle issued no membership mutations at all.
    assert_eq!(catalog.add_calls().len(), 1);
    assert!(catalog.remove_calls().is_empty());

    // Both cycles are in the run history.
    let last = store.last_sync_run().unwrap().unwrap();
    assert_eq!(last.id, 2);
    assert_eq!(last.status, RunStatus::Completed);
}

#[test]
fn test_cycles_survive_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("albums.db");
    let catalog = FakeCatalog::new()
        .with_asset(asset("a1").favorite(true).build())
        .with_asset(asset("a2").favorite(true).build());
    let ruleset = ruleset_with(SyncMode::Sync, vec![favorites_rule()]);

    {
        let mut store = MembershipStore::open(&db).unwrap();
        let report = run(&catalog, &ruleset, &mut store);
        assert_eq!(report.rules[0].added, 2);
    }

    // A fresh process opens the same database; nothing to re-add.
    let mut store = MembershipStore::open(&db).unwrap();
    let report = run(&catalog, &ruleset, &mut store);
    assert_eq!(report.rules[0].added, 0);
    assert_eq!(report.rules[0].removed, 0);
    assert_eq!(catalog.add_calls().len(), 1);
    assert_eq!(store.last_sync_run().unwrap().unwrap().id, 2);
}

// =============================================================================
// Sync Mode versus Add-Only Mode
// =============================================================================

/// The favorites rule narrowed to Canon shots only, under the same id and
/// album name, as an operator would edit a rules file in place.
fn narrowed_favorites_rule() -> Rule {
    rule("favorites", "Favorites")
        .condition(ConditionNode::and(vec![
            favorite_leaf(true),
            camera_leaf(Some("Canon"), None),
        ]))
        .build()
}

#[test]
fn test_sync_mode_removes_assets_that_stopped_matching() {
    let catalog = FakeCatalog::new()
        .with_asset(asset("a1").favorite(true).camera("Canon", "EOS R5").build())
        .with_asset(asset("a2").favorite(true).build());
    let mut store = MembershipStore::open_in_memory().unwrap();

    run(&catalog, &ruleset_with(SyncMode::Sync, vec![favorites_rule()]), &mut store);
    let album = catalog.album_named("Favorites").unwrap();
    assert_eq!(catalog.members_of(&album.id), set(&["a1", "a2"]));

    let narrowed = ruleset_with(SyncMode::Sync, vec![narrowed_favorites_rule()]);
    let report = run(&catalog, &narrowed, &mut store);

    assert_eq!(report.rules[0].removed, 1);
    assert_eq!(catalog.members_of(&album.id), set(&["a1"]));
    assert_eq!(
        catalog.remove_calls(),
        vec![(album.id.clone(), vec!["a2".to_string()])]
    );
    assert_eq!(member_ids(&store, "favorites", &album.id), vec!["a1"]);
}

#[test]
fn test_add_only_mode_never_removes() {
    let catalog = FakeCatalog::new()
        .with_asset(asset("a1").favorite(true).camera("Canon", "EOS R5").build())
        .with_asset(asset("a2").favorite(true).build());
    let mut store = MembershipStore::open_in_memory().unwrap();

    run(
        &catalog,
        &ruleset_with(SyncMode::AddOnly, vec![favorites_rule()]),
        &mut store,
    );
    let album = catalog.album_named("Favorites").unwrap();

    let narrowed = ruleset_with(SyncMode::AddOnly, vec![narrowed_favorites_rule()]);
    let report = run(&catalog, &narrowed, &mut store);

    // a2 no longer matches but stays in the album and in the store.
    assert_eq!(report.rules[0].removed, 0);
    assert!(catalog.remove_calls().is_empty());
    assert_eq!(catalog.members_of(&album.id), set(&["a1", "a2"]));
    assert_eq!(member_ids(&store, "favorites", &album.id), vec!["a1", "a2"]);
}

#[test]
fn test_manual_additions_survive_sync_mode() {
    let catalog = FakeCatalog::new().with_asset(asset("a1").favorite(true).build());
    let album = catalog.seed_album("Favorites");
    catalog.seed_members(&album.id, &["manual-1"]);
    let mut store = MembershipStore::open_in_memory().unwrap();

    run(&catalog, &ruleset_with(SyncMode::Sync, vec![favorites_rule()]), &mut store);

    // Sync mode only removes what this tool once added; the hand-placed
    // asset stays.
    assert_eq!(catalog.members_of(&album.id), set(&["a1", "manual-1"]));
    assert!(catalog.remove_calls().is_empty());
}

// =============================================================================
// Dry Run
// =============================================================================

#[test]
fn test_dry_run_reports_without_mutating() {
    let catalog = FakeCatalog::new()
        .with_asset(asset("a1").favorite(true).build())
        .with_asset(asset("a2").favorite(true).build());
    let mut store = MembershipStore::open_in_memory().unwrap();
    let ruleset = ruleset_with(SyncMode::Sync, vec![favorites_rule()]);

    let engine = SyncEngine::new(&catalog, EngineDefaults::default());
    let report = engine
        .run_cycle(&ruleset, &mut store, &SyncOptions { dry_run: true })
        .unwrap();

    // The report shows what would happen.
    assert!(report.dry_run);
    assert_eq!(report.rules[0].added, 2);
    assert_eq!(report.rules[0].exact_matches, 2);
    assert!(!report.rules[0].created_album);
    assert_eq!(report.rules[0].album_id, None);

    // Catalog and store stay untouched.
    assert!(catalog.albums().is_empty());
    assert!(catalog.add_calls().is_empty());
    assert!(catalog.sharing_updates().is_empty());
    assert!(store.last_sync_run().unwrap().is_none());
    assert_eq!(store.seen_asset_count().unwrap(), 0);
}

// =============================================================================
// Fuzzy Expansion
// =============================================================================

#[test]
fn test_fuzzy_expansion_pulls_in_nearby_assets() {
    // One Canon shot on Christmas day anchors the rule. A second photo
    // thirty minutes later has no camera metadata and only qualifies
    // through proximity. A third from the evening sits outside the widened
    // candidate span entirely.
    let catalog = FakeCatalog::new()
        .with_asset(
            asset("exact-1")
                .taken("2023-12-25T12:00:00Z")
                .camera("Canon", "EOS R5")
                .build(),
        )
        .with_asset(asset("fuzzy-1").taken("2023-12-25T12:30:00Z").build())
        .with_asset(asset("far-1").taken("2023-12-25T18:00:00Z").build());
    let mut store = MembershipStore::open_in_memory().unwrap();

    let xmas = rule("xmas", "Christmas")
        .taken("2023-12-25T00:00:00Z", "2023-12-26T00:00:00Z")
        .condition(camera_leaf(Some("Canon"), None))
        .fuzzy(true)
        .build();
    let ruleset = ruleset_with(SyncMode::Sync, vec![xmas]);

    let report = run(&catalog, &ruleset, &mut store);
    assert_eq!(report.rules[0].exact_matches, 1);
    assert_eq!(report.rules[0].fuzzy_matches, 1);
    assert_eq!(report.rules[0].added, 2);

    let album = catalog.album_named("Christmas").unwrap();
    assert_eq!(catalog.members_of(&album.id), set(&["exact-1", "fuzzy-1"]));

    // The store remembers how each asset got in.
    let records = store.get_membership("xmas", &album.id).unwrap();
    let kinds: Vec<(&str, MatchKind)> = records
        .iter()
        .map(|r| (r.asset_id.as_str(), r.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![("exact-1", MatchKind::Exact), ("fuzzy-1", MatchKind::Fuzzy)]
    );

    // Only the exact hit and the candidate pool were ever fetched.
    assert_eq!(store.seen_asset_count().unwrap(), 2);

    // A second cycle changes nothing, and the stored kind stays fuzzy.
    let again = run(&catalog, &ruleset, &mut store);
    assert_eq!(again.rules[0].added, 0);
    let records = store.get_membership("xmas", &album.id).unwrap();
    assert_eq!(records[1].kind, MatchKind::Fuzzy);
}

// =============================================================================
// Failure Isolation
// =============================================================================

#[test]
fn test_rule_failure_does_not_abort_cycle() {
    let catalog = FakeCatalog::new()
        .with_asset(asset("a1").favorite(true).build())
        .with_search_failure_for_make("Poison");
    let mut store = MembershipStore::open_in_memory().unwrap();

    let doomed = rule("doomed", "Doomed")
        .condition(camera_leaf(Some("Poison"), None))
        .build();
    let ruleset = ruleset_with(SyncMode::Sync, vec![doomed, favorites_rule()]);

    let report = run(&catalog, &ruleset, &mut store);

    assert_eq!(report.rules.len(), 2);
    assert!(report.rules[0].is_failed());
    assert!(!report.rules[1].is_failed());
    assert_eq!(report.rules[1].added, 1);

    // The healthy rule still synced; the failed one created nothing.
    let album = catalog.album_named("Favorites").unwrap();
    assert_eq!(catalog.members_of(&album.id), set(&["a1"]));
    assert!(catalog.album_named("Doomed").is_none());

    // The run history names the failed rule.
    let run_row = store.last_sync_run().unwrap().unwrap();
    assert_eq!(run_row.status, RunStatus::CompletedWithErrors);
    assert!(run_row.error_message.unwrap().contains("doomed"));
}

// =============================================================================
// Recurring Rules
// =============================================================================

#[test]
fn test_recurring_rule_syncs_one_album_per_year() {
    let yaml = r#"
mode: sync
rules:
  - id: christmas
    recurring: true
    month_day: "12-25"
    duration_days: 1
    year_range: [2022, 2023]
    album_name_template: "Christmas {year}"
    timezone: "UTC"
"#;
    let ruleset = album_config::load_rules_str(yaml).unwrap();

    let catalog = FakeCatalog::new()
        .with_asset(asset("a-2022").taken("2022-12-25T10:00:00Z").build())
        .with_asset(asset("a-2023").taken("2023-12-25T10:00:00Z").build())
        .with_asset(asset("summer").taken("2023-07-01T10:00:00Z").build());
    let mut store = MembershipStore::open_in_memory().unwrap();

    let report = run(&catalog, &ruleset, &mut store);
    assert_eq!(report.rules.len(), 2);

    let album_2022 = catalog.album_named("Christmas 2022").unwrap();
    let album_2023 = catalog.album_named("Christmas 2023").unwrap();
    assert_eq!(catalog.members_of(&album_2022.id), set(&["a-2022"]));
    assert_eq!(catalog.members_of(&album_2023.id), set(&["a-2023"]));

    // Membership is keyed by the per-year derived rule ids.
    assert_eq!(
        member_ids(&store, "christmas-2022", &album_2022.id),
        vec!["a-2022"]
    );
    assert_eq!(
        member_ids(&store, "christmas-2023", &album_2023.id),
        vec!["a-2023"]
    );
}

// =============================================================================
// Stop Flag
// =============================================================================

#[test]
fn test_stop_flag_ends_cycle_before_any_rule() {
    let catalog = FakeCatalog::new().with_asset(asset("a1").favorite(true).build());
    let mut store = MembershipStore::open_in_memory().unwrap();
    let ruleset = ruleset_with(SyncMode::Sync, vec![favorites_rule()]);

    let stop = Arc::new(AtomicBool::new(true));
    let engine = SyncEngine::new(&catalog, EngineDefaults::default()).with_stop_flag(stop);
    let report = engine
        .run_cycle(&ruleset, &mut store, &SyncOptions::default())
        .unwrap();

    assert!(report.stopped_early);
    assert!(report.rules.is_empty());
    assert!(catalog.albums().is_empty());

    // The aborted cycle still closes its history row.
    let run_row = store.last_sync_run().unwrap().unwrap();
    assert_eq!(run_row.status, RunStatus::Completed);
    assert_eq!(run_row.rules_processed, 0);
}
