//! End-to-end album sharing tests.
//!
//! Sharing resolution has four sources with a strict precedence order, and
//! its failures must degrade instead of failing the rule. These tests run
//! full engine cycles so the precedence, the owner exclusion, and the
//! degradation path are all exercised through [`SyncEngine::run_cycle`].

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;

use album_config::{Rule, RuleEntry, RuleSet, Settings, ShareWith, SyncMode};
use album_core::{CycleReport, EngineDefaults, GlobalSharing, SyncEngine, SyncOptions};
use album_store::{MembershipStore, RunStatus};
use album_test_utils::{FakeCatalog, asset, favorite_leaf, rule};

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

fn defaults_with(sharing: GlobalSharing) -> EngineDefaults {
    EngineDefaults {
        sharing,
        ..EngineDefaults::default()
    }
}

fn run_with(
    catalog: &FakeCatalog,
    ruleset: &RuleSet,
    store: &mut MembershipStore,
    defaults: EngineDefaults,
) -> CycleReport {
    let engine = SyncEngine::new(catalog, defaults);
    engine
        .run_cycle(ruleset, store, &SyncOptions::default())
        .unwrap()
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| (*id).to_string()).collect()
}

// =============================================================================
// Rule-Level Sharing
// =============================================================================

#[test]
fn test_rule_email_list_shares_new_album() {
    let catalog = FakeCatalog::new()
        .with_user("friend@example.com")
        .with_asset(asset("a1").favorite(true).build());
    let mut store = MembershipStore::open_in_memory().unwrap();
    let shared = rule("favorites", "Favorites")
        .condition(favorite_leaf(true))
        .share_users(&["friend@example.com"])
        .build();

    let report = run_with(
        &catalog,
        &ruleset_with(SyncMode::Sync, vec![shared]),
        &mut store,
        EngineDefaults::default(),
    );

    let album = catalog.album_named("Favorites").unwrap();
    assert_eq!(catalog.viewers_of(&album.id), set(&["u1"]));
    assert!(report.rules[0].sharing_updated);
}

#[test]
fn test_empty_share_list_unshares_album() {
    let catalog = FakeCatalog::new()
        .with_user("friend@example.com")
        .with_asset(asset("a1").favorite(true).build());
    let album = catalog.seed_album("Favorites");
    catalog.seed_viewers(&album.id, &["u1"]);
    let mut store = MembershipStore::open_in_memory().unwrap();

    let private = rule("favorites", "Favorites")
        .condition(favorite_leaf(true))
        .share_with(ShareWith::Users(vec![]))
        .build();
    let defaults = defaults_with(GlobalSharing {
        share_all: true,
        share_users: vec![],
    });
    let report = run_with(
        &catalog,
        &ruleset_with(SyncMode::Sync, vec![private]),
        &mut store,
        defaults,
    );

    // The explicit empty list wins over the global share-all flag.
    assert!(catalog.viewers_of(&album.id).is_empty());
    assert_eq!(catalog.sharing_updates().len(), 1);
    assert!(report.rules[0].sharing_updated);
}

#[test]
fn test_rule_share_list_overrides_global_list() {
    let catalog = FakeCatalog::new()
        .with_user("alice@example.com")
        .with_user("bob@example.com")
        .with_asset(asset("a1").favorite(true).build());
    let mut store = MembershipStore::open_in_memory().unwrap();

    let shared = rule("favorites", "Favorites")
        .condition(favorite_leaf(true))
        .share_users(&["bob@example.com"])
        .build();
    let defaults = defaults_with(GlobalSharing {
        share_all: false,
        share_users: vec!["alice@example.com".to_string()],
    });
    run_with(
        &catalog,
        &ruleset_with(SyncMode::Sync, vec![shared]),
        &mut store,
        defaults,
    );

    let album = catalog.album_named("Favorites").unwrap();
    assert_eq!(catalog.viewers_of(&album.id), set(&["u2"]));
}

#[test]
fn test_unknown_email_results_in_no_sharing_call() {
    let catalog = FakeCatalog::new().with_asset(asset("a1").favorite(true).build());
    let mut store = MembershipStore::open_in_memory().unwrap();
    let shared = rule("favorites", "Favorites")
        .condition(favorite_leaf(true))
        .share_users(&["ghost@example.com"])
        .build();

    let report = run_with(
        &catalog,
        &ruleset_with(SyncMode::Sync, vec![shared]),
        &mut store,
        EngineDefaults::default(),
    );

    // The unknown address resolves to nobody, which already matches the
    // new album's empty viewer list.
    let album = catalog.album_named("Favorites").unwrap();
    assert!(catalog.viewers_of(&album.id).is_empty());
    assert!(catalog.sharing_updates().is_empty());
    assert!(!report.rules[0].sharing_updated);
}

// =============================================================================
// Global Sharing Defaults
// =============================================================================

#[test]
fn test_global_share_all_reaches_every_other_user() {
    let catalog = FakeCatalog::new()
        .with_user("alice@example.com")
        .with_user("bob@example.com")
        .with_asset(asset("a1").favorite(true).build());
    let mut store = MembershipStore::open_in_memory().unwrap();
    let defaults = defaults_with(GlobalSharing {
        share_all: true,
        share_users: vec![],
    });

    run_with(
        &catalog,
        &ruleset_with(SyncMode::Sync, vec![favorites_rule()]),
        &mut store,
        defaults,
    );

    // The album owner never appears in its own viewer list.
    let album = catalog.album_named("Favorites").unwrap();
    assert_eq!(catalog.viewers_of(&album.id), set(&["u1", "u2"]));
}

#[test]
fn test_silent_rule_without_globals_never_touches_sharing() {
    let catalog = FakeCatalog::new()
        .with_user("friend@example.com")
        .with_asset(asset("a1").favorite(true).build());
    let album = catalog.seed_album("Favorites");
    catalog.seed_viewers(&album.id, &["u1"]);
    let mut store = MembershipStore::open_in_memory().unwrap();

    run_with(
        &catalog,
        &ruleset_with(SyncMode::Sync, vec![favorites_rule()]),
        &mut store,
        EngineDefaults::default(),
    );

    // Nothing configured anywhere: the hand-set viewer list survives.
    assert_eq!(catalog.viewers_of(&album.id), set(&["u1"]));
    assert!(catalog.sharing_updates().is_empty());
}

// =============================================================================
// Degradation and Idempotence
// =============================================================================

#[test]
fn test_directory_failure_degrades_sharing_without_failing_rules() {
    let catalog = FakeCatalog::new()
        .with_user_directory_failure()
        .with_asset(asset("a1").favorite(true).build());
    let mut store = MembershipStore::open_in_memory().unwrap();
    let defaults = defaults_with(GlobalSharing {
        share_all: true,
        share_users: vec![],
    });

    let report = run_with(
        &catalog,
        &ruleset_with(SyncMode::Sync, vec![favorites_rule()]),
        &mut store,
        defaults,
    );

    // No sharing this cycle, but the membership sync went through.
    assert!(catalog.sharing_updates().is_empty());
    assert!(!report.rules[0].is_failed());
    let album = catalog.album_named("Favorites").unwrap();
    assert_eq!(catalog.members_of(&album.id), set(&["a1"]));
    assert_eq!(
        store.last_sync_run().unwrap().unwrap().status,
        RunStatus::Completed
    );
}

#[test]
fn test_sharing_updates_only_on_change() {
    let catalog = FakeCatalog::new()
        .with_user("friend@example.com")
        .with_asset(asset("a1").favorite(true).build());
    let mut store = MembershipStore::open_in_memory().unwrap();
    let shared = rule("favorites", "Favorites")
        .condition(favorite_leaf(true))
        .share_users(&["friend@example.com"])
        .build();
    let ruleset = ruleset_with(SyncMode::Sync, vec![shared]);

    let first = run_with(&catalog, &ruleset, &mut store, EngineDefaults::default());
    let second = run_with(&catalog, &ruleset, &mut store, EngineDefaults::default());

    assert!(first.rules[0].sharing_updated);
    assert!(!second.rules[0].sharing_updated);
    assert_eq!(catalog.sharing_updates().len(), 1);
}

#[test]
fn test_dry_run_leaves_sharing_alone() {
    let catalog = FakeCatalog::new()
        .with_user("friend@example.com")
        .with_asset(asset("a1").favorite(true).build());
    let album = catalog.seed_album("Favorites");
    catalog.seed_viewers(&album.id, &["u9"]);
    let mut store = MembershipStore::open_in_memory().unwrap();
    let shared = rule("favorites", "Favorites")
        .condition(favorite_leaf(true))
        .share_users(&["friend@example.com"])
        .build();

    let engine = SyncEngine::new(&catalog, EngineDefaults::default());
    let report = engine
        .run_cycle(
            &ruleset_with(SyncMode::Sync, vec![shared]),
            &mut store,
            &SyncOptions { dry_run: true },
        )
        .unwrap();

    // The target differs from the current viewers, but a dry run reports
    // instead of writing.
    assert!(catalog.sharing_updates().is_empty());
    assert_eq!(catalog.viewers_of(&album.id), set(&["u9"]));
    assert!(!report.rules[0].sharing_updated);
}
