//! The sync engine: one reconciliation cycle over every rule.
//!
//! A cycle expands recurring rules, builds the cycle's share resolver (one
//! user-directory fetch), and then walks the rules with a per-rule error
//! boundary: a failed rule is recorded in the cycle report and the cycle
//! moves on. The result is written to the sync-run history unless the
//! cycle is a dry run, which performs no catalog or store mutation of any
//! kind.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use album_catalog::{AlbumInfo, AssetRecord, Catalog};
use album_config::{Rule, RuleSet, Settings, SyncMode};
use album_store::MembershipStore;

use crate::error::Result;
use crate::fuzzy::{self, FuzzyWindows};
use crate::planner::QueryPlanner;
use crate::recurring;
use crate::share::{GlobalSharing, ShareResolver};

use super::reconcile::reconcile;
use super::report::{CycleReport, RuleReport};

/// Deployment-level defaults applied to every rule, kept explicit so each
/// cycle is reproducible from its inputs.
#[derive(Debug, Clone)]
pub struct EngineDefaults {
    /// Zone for recurring rules that do not name one.
    pub timezone: Tz,
    /// Fuzzy matching for rules without a `fuzzy_match` flag.
    pub allow_fuzzy: bool,
    pub sharing: GlobalSharing,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            allow_fuzzy: false,
            sharing: GlobalSharing::default(),
        }
    }
}

/// Options for a single cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Compute and report every plan without mutating the catalog, the
    /// store, or album sharing.
    pub dry_run: bool,
}

/// Coordinates planner, catalog, fuzzy matcher, reconciliation, and
/// sharing for every rule in a rule set.
pub struct SyncEngine<'a> {
    catalog: &'a dyn Catalog,
    defaults: EngineDefaults,
    stop: Arc<AtomicBool>,
}

impl<'a> SyncEngine<'a> {
    pub fn new(catalog: &'a dyn Catalog, defaults: EngineDefaults) -> Self {
        Self {
            catalog,
            defaults,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Install a cooperative stop flag; the engine checks it between rules.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Run one cycle over every rule in the set.
    ///
    /// # Errors
    ///
    /// Fatal errors only: recurring-rule expansion failures and sync-run
    /// history writes. Per-rule failures land in the report instead.
    pub fn run_cycle(
        &self,
        ruleset: &RuleSet,
        store: &mut MembershipStore,
        options: &SyncOptions,
    ) -> Result<CycleReport> {
        let rules = recurring::expand_rules(&ruleset.entries, self.defaults.timezone)?;
        let windows = FuzzyWindows::from_settings(&ruleset.settings);
        let resolver = ShareResolver::build(self.catalog, self.defaults.sharing.clone());

        let run_id = if options.dry_run {
            None
        } else {
            Some(store.start_sync_run()?)
        };
        info!(
            rules = rules.len(),
            mode = ?ruleset.mode,
            dry_run = options.dry_run,
            "sync cycle started"
        );

        let mut report = CycleReport::new(options.dry_run);
        for rule in &rules {
            if self.stop.load(Ordering::Relaxed) {
                info!("stop requested; ending cycle early");
                report.stopped_early = true;
                break;
            }

            let rule_report = match self.run_rule(
                rule,
                ruleset.mode,
                &ruleset.settings,
                &windows,
                &resolver,
                store,
                options,
            ) {
                Ok(rule_report) => rule_report,
                Err(e) => {
                    error!(rule = %rule.id, error = %e, "rule failed");
                    RuleReport::failed(&rule.id, &rule.album_name, e.to_string())
                }
            };
            if !rule_report.is_failed() {
                info!(
                    rule = %rule_report.rule_id,
                    exact = rule_report.exact_matches,
                    fuzzy = rule_report.fuzzy_matches,
                    added = rule_report.added,
                    removed = rule_report.removed,
                    "rule reconciled"
                );
            }
            report.rules.push(rule_report);
        }

        if let Some(run_id) = run_id {
            store.complete_sync_run(run_id, &report.outcome())?;
        }
        info!(
            rules = report.rules.len(),
            added = report.assets_added(),
            removed = report.assets_removed(),
            failed = report.failed_rules().len(),
            "sync cycle finished"
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_rule(
        &self,
        rule: &Rule,
        mode: SyncMode,
        settings: &Settings,
        windows: &FuzzyWindows,
        resolver: &ShareResolver,
        store: &mut MembershipStore,
        options: &SyncOptions,
    ) -> Result<RuleReport> {
        let planner = QueryPlanner::new(self.catalog.capabilities(), settings.max_queries_per_rule);
        let plan = planner.plan(rule)?;

        let mut fetched: BTreeMap<String, AssetRecord> = BTreeMap::new();
        for query in plan.queries() {
            for asset in self.catalog.search(query)? {
                fetched.entry(asset.id.clone()).or_insert(asset);
            }
        }
        debug!(
            rule = %rule.id,
            queries = plan.queries().len(),
            fetched = fetched.len(),
            "catalog queries executed"
        );

        let mut seen: BTreeSet<String> = fetched.keys().cloned().collect();
        let exact: Vec<AssetRecord> = fetched
            .into_values()
            .filter(|asset| plan.admits(asset))
            .collect();
        let exact_ids: BTreeSet<String> = exact.iter().map(|asset| asset.id.clone()).collect();

        let fuzzy_enabled = rule.fuzzy_match.unwrap_or(self.defaults.allow_fuzzy);
        let mut fuzzy_ids = BTreeSet::new();
        if fuzzy_enabled && !exact.is_empty() {
            if let Some(query) = fuzzy::candidate_query(&exact, rule, windows) {
                let pool = self.catalog.search(&query)?;
                seen.extend(pool.iter().map(|asset| asset.id.clone()));
                fuzzy_ids = fuzzy::expand(&exact, &pool, windows);
                debug!(
                    rule = %rule.id,
                    pool = pool.len(),
                    fuzzy = fuzzy_ids.len(),
                    "fuzzy expansion complete"
                );
            }
        }

        if exact_ids.is_empty() && rule.condition.is_some() {
            warn!(rule = %rule.id, "rule matched no assets; check its conditions");
        }
        if !options.dry_run {
            let seen: Vec<String> = seen.into_iter().collect();
            store.record_assets_seen(&seen)?;
        }

        let mut created_album = false;
        let album = match self.catalog.find_album_by_name(&rule.album_name)? {
            Some(info) => Some(info),
            None if options.dry_run => {
                info!(rule = %rule.id, album = %rule.album_name, "dry-run: would create album");
                None
            }
            None => {
                let info = self
                    .catalog
                    .create_album(&rule.album_name, rule.description.as_deref())?;
                created_album = true;
                info!(rule = %rule.id, album = %info.name, id = %info.id, "album created");
                Some(info)
            }
        };

        // Sharing first; its failures only warn.
        let mut sharing_updated = false;
        if let Some(album) = &album
            && let Some(target) = resolver.resolve(rule.share_with.as_ref(), album.owner_id.as_deref())
        {
            match self.apply_sharing(album, &target, options) {
                Ok(updated) => sharing_updated = updated,
                Err(e) => {
                    warn!(rule = %rule.id, album = %album.name, error = %e, "sharing update failed; continuing");
                }
            }
        }

        let persisted = match &album {
            Some(album) => store.get_membership(&rule.id, &album.id)?,
            None => Vec::new(),
        };
        let membership_plan = reconcile(&exact_ids, &fuzzy_ids, &persisted, mode);

        let (added, removed) = match (&album, options.dry_run) {
            (_, true) | (None, _) => {
                if !membership_plan.is_noop() {
                    info!(
                        rule = %rule.id,
                        add = membership_plan.to_add.len(),
                        remove = membership_plan.to_remove.len(),
                        "dry-run: membership plan"
                    );
                }
                (membership_plan.to_add.len(), membership_plan.to_remove.len())
            }
            (Some(album), false) => {
                if !membership_plan.to_add.is_empty() {
                    let ids: Vec<String> = membership_plan
                        .to_add
                        .iter()
                        .map(|(id, _)| id.clone())
                        .collect();
                    self.catalog.add_assets(&album.id, &ids)?;
                }
                if !membership_plan.to_remove.is_empty() {
                    self.catalog.remove_assets(&album.id, &membership_plan.to_remove)?;
                }
                // Persist only after the catalog accepted the mutations.
                if !membership_plan.is_noop() {
                    store.put_membership(&rule.id, &album.id, &membership_plan.membership)?;
                }
                (membership_plan.to_add.len(), membership_plan.to_remove.len())
            }
        };

        Ok(RuleReport {
            rule_id: rule.id.clone(),
            album_name: rule.album_name.clone(),
            album_id: album.as_ref().map(|info| info.id.clone()),
            created_album,
            exact_matches: exact_ids.len(),
            fuzzy_matches: fuzzy_ids.len(),
            added,
            removed,
            sharing_updated,
            error: None,
        })
    }

    fn apply_sharing(
        &self,
        album: &AlbumInfo,
        target: &BTreeSet<String>,
        options: &SyncOptions,
    ) -> Result<bool> {
        let current = self.catalog.album_viewers(&album.id)?;
        if current == *target {
            return Ok(false);
        }
        if options.dry_run {
            info!(
                album = %album.name,
                viewers = target.len(),
                "dry-run: would update sharing"
            );
            return Ok(false);
        }
        self.catalog.update_sharing(&album.id, target)?;
        info!(album = %album.name, viewers = target.len(), "album sharing updated");
        Ok(true)
    }
}
