//! Query planning: condition trees to minimal catalog query sets.
//!
//! The catalog answers flat AND-only queries, so a tree with `or` nodes
//! cannot run as one call. The planner rewrites the tree into disjunctive
//! normal form, merges each conjunction's natively-supported params into
//! one [`QuerySpec`] (consulting the catalog's capability declarations
//! kind by kind), and keeps the full tree as a residual predicate. Running
//! every query and filtering the union through the residual gives exactly
//! the tree's semantics:
//!
//! - each query only ever relaxes its own conjunction (client-only params
//!   are dropped server-side), so the union is a superset of the answer;
//! - the residual re-evaluates the whole tree per asset, which is the only
//!   single predicate that is correct across OR branches.
//!
//! Conjunctions that can never match (favorite `true` and `false`, two
//! different camera makes, disjoint kind sets) are dropped at plan time
//! rather than sent to the catalog.

use std::collections::BTreeSet;

use tracing::debug;

use album_catalog::{AssetRecord, CatalogCapabilities, QuerySpec};
use album_config::{AssetKind, ConditionNode, DateRange, LeafCondition, Rule};

use crate::error::{Error, Result};
use crate::eval;

/// Plans catalog queries for one capability profile.
pub struct QueryPlanner<'a> {
    capabilities: &'a CatalogCapabilities,
    max_queries: usize,
}

/// The product of planning: queries to run plus the residual predicate to
/// apply to every fetched asset.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    queries: Vec<QuerySpec>,
    residual: Option<ConditionNode>,
}

impl QueryPlan {
    pub fn queries(&self) -> &[QuerySpec] {
        &self.queries
    }

    /// True when no query can ever match (every conjunction was statically
    /// unsatisfiable).
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn residual(&self) -> Option<&ConditionNode> {
        self.residual.as_ref()
    }

    /// Exact-semantics check for one fetched asset.
    pub fn admits(&self, asset: &AssetRecord) -> bool {
        match &self.residual {
            Some(tree) => eval::evaluate(tree, asset),
            None => true,
        }
    }
}

impl<'a> QueryPlanner<'a> {
    pub fn new(capabilities: &'a CatalogCapabilities, max_queries: usize) -> Self {
        Self {
            capabilities,
            max_queries,
        }
    }

    /// Plan the queries for one rule.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCondition`] for a leaf with no params;
    /// [`Error::PlanTooLarge`] when the DNF expansion would exceed the
    /// configured ceiling.
    pub fn plan(&self, rule: &Rule) -> Result<QueryPlan> {
        let Some(tree) = &rule.condition else {
            return Ok(QueryPlan {
                queries: vec![QuerySpec::date_bounded(rule.taken, rule.created)],
                residual: None,
            });
        };

        check_leaves(&rule.id, tree)?;

        let width = dnf_width(tree);
        if width > self.max_queries {
            return Err(Error::PlanTooLarge {
                rule_id: rule.id.clone(),
                queries: width,
                limit: self.max_queries,
            });
        }

        let mut queries = Vec::new();
        for conjunction in to_dnf(tree) {
            match self.merge_conjunction(&conjunction, rule.taken, rule.created) {
                Some(query) => {
                    if !queries.contains(&query) {
                        queries.push(query);
                    }
                }
                None => {
                    debug!(rule = %rule.id, "dropping statically unsatisfiable conjunction");
                }
            }
        }

        Ok(QueryPlan {
            queries,
            residual: Some(tree.clone()),
        })
    }

    /// Fold one conjunction of leaves into a single query, or `None` when
    /// the conjunction is statically unsatisfiable.
    fn merge_conjunction(
        &self,
        leaves: &[&LeafCondition],
        taken: DateRange,
        created: DateRange,
    ) -> Option<QuerySpec> {
        let caps = self.capabilities;
        let mut query = QuerySpec::date_bounded(taken, created);

        for leaf in leaves {
            if caps.favorite.is_native()
                && let Some(favorite) = leaf.is_favorite
            {
                match query.favorite {
                    None => query.favorite = Some(favorite),
                    Some(existing) if existing == favorite => {}
                    Some(_) => return None,
                }
            }

            if caps.asset_types.is_native()
                && let Some(kinds) = &leaf.asset_types
            {
                let incoming: BTreeSet<AssetKind> = kinds.iter().copied().collect();
                let merged = match query.asset_types.take() {
                    None => incoming,
                    Some(existing) => existing.intersection(&incoming).copied().collect(),
                };
                if merged.is_empty() {
                    return None;
                }
                query.asset_types = Some(merged);
            }

            if caps.camera.is_native()
                && let Some(camera) = &leaf.camera
            {
                if let Some(make) = &camera.make
                    && !merge_text(&mut query.camera_make, make)
                {
                    return None;
                }
                if let Some(model) = &camera.model
                    && !merge_text(&mut query.camera_model, model)
                {
                    return None;
                }
            }

            // The catalog ANDs all person constraints in one call, so person
            // sets union within a conjunction. Disjunctions of people arrive
            // here as separate conjunctions.
            if caps.people.is_native()
                && let Some(people) = &leaf.people
            {
                query.people.extend(people.include.iter().cloned());
            }

            // Tags have no native query form; the residual handles them.
        }

        Some(query)
    }
}

/// Merge a camera value into the query; false means the conjunction pins
/// two different values and cannot match.
fn merge_text(slot: &mut Option<String>, value: &str) -> bool {
    match slot {
        None => {
            *slot = Some(value.to_string());
            true
        }
        Some(existing) => existing.trim().to_lowercase() == value.trim().to_lowercase(),
    }
}

fn check_leaves(rule_id: &str, node: &ConditionNode) -> Result<()> {
    match node {
        ConditionNode::Leaf(leaf) if leaf.is_empty() => Err(Error::InvalidCondition {
            rule_id: rule_id.to_string(),
            reason: "leaf condition carries no parameters".to_string(),
        }),
        ConditionNode::Leaf(_) => Ok(()),
        ConditionNode::And { and: children } | ConditionNode::Or { or: children } => children
            .iter()
            .try_for_each(|child| check_leaves(rule_id, child)),
    }
}

/// Conjunction count the DNF rewrite would produce, without producing it.
fn dnf_width(node: &ConditionNode) -> usize {
    match node {
        ConditionNode::Leaf(_) => 1,
        ConditionNode::Or { or } => or
            .iter()
            .map(dnf_width)
            .fold(0usize, usize::saturating_add),
        ConditionNode::And { and } => and
            .iter()
            .map(dnf_width)
            .fold(1usize, usize::saturating_mul),
    }
}

/// Rewrite to a list of conjunctions of leaves. Callers guard the size via
/// [`dnf_width`] first.
fn to_dnf(node: &ConditionNode) -> Vec<Vec<&LeafCondition>> {
    match node {
        ConditionNode::Leaf(leaf) => vec![vec![leaf]],
        ConditionNode::Or { or } => or.iter().flat_map(to_dnf).collect(),
        ConditionNode::And { and } => {
            let mut product: Vec<Vec<&LeafCondition>> = vec![Vec::new()];
            for child in and {
                let branches = to_dnf(child);
                let mut next = Vec::with_capacity(product.len() * branches.len());
                for prefix in &product {
                    for branch in &branches {
                        let mut combined = prefix.clone();
                        combined.extend(branch.iter().copied());
                        next.push(combined);
                    }
                }
                product = next;
            }
            product
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use album_test_utils::{
        asset, camera_leaf, favorite_leaf, kinds_leaf, people_leaf, rule, tags_leaf,
    };
    use pretty_assertions::assert_eq;

    fn immich_planner(caps: &CatalogCapabilities) -> QueryPlanner<'_> {
        QueryPlanner::new(caps, 64)
    }

    #[test]
    fn test_rule_without_condition_plans_single_date_query() {
        let caps = CatalogCapabilities::immich();
        let rule = rule("r", "A")
            .taken("2023-01-01T00:00:00Z", "2023-02-01T00:00:00Z")
            .build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();

        assert_eq!(plan.queries().len(), 1);
        assert!(plan.queries()[0].is_date_only());
        assert_eq!(plan.queries()[0].taken, rule.taken);
        assert!(plan.residual().is_none());
        assert!(plan.admits(&asset("x").build()));
    }

    #[test]
    fn test_or_of_people_plans_two_single_person_queries() {
        let caps = CatalogCapabilities::immich();
        let tree = ConditionNode::or(vec![people_leaf(&["Alice"]), people_leaf(&["Bob"])]);
        let rule = rule("r", "A").condition(tree).build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();

        assert_eq!(plan.queries().len(), 2);
        let people: Vec<Vec<&str>> = plan
            .queries()
            .iter()
            .map(|q| q.people.iter().map(String::as_str).collect())
            .collect();
        assert_eq!(people, vec![vec!["Alice"], vec!["Bob"]]);
    }

    #[test]
    fn test_people_union_within_conjunction() {
        let caps = CatalogCapabilities::immich();
        let tree = ConditionNode::and(vec![people_leaf(&["Alice"]), people_leaf(&["Bob"])]);
        let rule = rule("r", "A").condition(tree).build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();

        assert_eq!(plan.queries().len(), 1);
        let names: Vec<&str> = plan.queries()[0].people.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_and_distributes_over_or() {
        let caps = CatalogCapabilities::immich();
        let tree = ConditionNode::and(vec![
            favorite_leaf(true),
            ConditionNode::or(vec![people_leaf(&["Alice"]), people_leaf(&["Bob"])]),
        ]);
        let rule = rule("r", "A").condition(tree).build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();

        assert_eq!(plan.queries().len(), 2);
        for query in plan.queries() {
            assert_eq!(query.favorite, Some(true));
            assert_eq!(query.people.len(), 1);
        }
    }

    #[test]
    fn test_identical_or_branches_deduplicate() {
        let caps = CatalogCapabilities::immich();
        let tree = ConditionNode::or(vec![favorite_leaf(true), favorite_leaf(true)]);
        let rule = rule("r", "A").condition(tree).build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();
        assert_eq!(plan.queries().len(), 1);
    }

    #[test]
    fn test_conflicting_favorite_drops_conjunction() {
        let caps = CatalogCapabilities::immich();
        let tree = ConditionNode::and(vec![favorite_leaf(true), favorite_leaf(false)]);
        let rule = rule("r", "A").condition(tree).build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_conflicting_camera_make_drops_conjunction() {
        let caps = CatalogCapabilities::immich();
        let tree = ConditionNode::and(vec![
            camera_leaf(Some("Canon"), None),
            camera_leaf(Some("Nikon"), None),
        ]);
        let rule = rule("r", "A").condition(tree).build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_same_camera_make_in_different_case_merges() {
        let caps = CatalogCapabilities::immich();
        let tree = ConditionNode::and(vec![
            camera_leaf(Some("Canon"), None),
            camera_leaf(Some("CANON"), Some("EOS R5")),
        ]);
        let rule = rule("r", "A").condition(tree).build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();
        assert_eq!(plan.queries().len(), 1);
        assert_eq!(plan.queries()[0].camera_make.as_deref(), Some("Canon"));
        assert_eq!(plan.queries()[0].camera_model.as_deref(), Some("EOS R5"));
    }

    #[test]
    fn test_disjoint_kind_sets_drop_conjunction() {
        let caps = CatalogCapabilities::immich();
        let tree = ConditionNode::and(vec![
            kinds_leaf(&[AssetKind::Image]),
            kinds_leaf(&[AssetKind::Video]),
        ]);
        let rule = rule("r", "A").condition(tree).build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_kind_sets_intersect() {
        let caps = CatalogCapabilities::immich();
        let tree = ConditionNode::and(vec![
            kinds_leaf(&[AssetKind::Image, AssetKind::Video]),
            kinds_leaf(&[AssetKind::Video, AssetKind::Audio]),
        ]);
        let rule = rule("r", "A").condition(tree).build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();
        assert_eq!(plan.queries().len(), 1);
        let kinds: Vec<AssetKind> = plan.queries()[0]
            .asset_types
            .as_ref()
            .unwrap()
            .iter()
            .copied()
            .collect();
        assert_eq!(kinds, vec![AssetKind::Video]);
    }

    #[test]
    fn test_tags_only_tree_degrades_to_date_query_with_residual() {
        let caps = CatalogCapabilities::immich();
        let tree = tags_leaf(&["travel"], &[]);
        let rule = rule("r", "A")
            .taken("2023-01-01T00:00:00Z", "2023-02-01T00:00:00Z")
            .condition(tree)
            .build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();

        assert_eq!(plan.queries().len(), 1);
        assert!(plan.queries()[0].is_date_only());
        assert!(plan.admits(&asset("a").tag("travel").build()));
        assert!(!plan.admits(&asset("b").tag("work").build()));
    }

    #[test]
    fn test_client_only_capabilities_degrade_every_query() {
        let caps = CatalogCapabilities::client_only();
        let tree = ConditionNode::and(vec![favorite_leaf(true), people_leaf(&["Alice"])]);
        let rule = rule("r", "A").condition(tree).build();

        let plan = QueryPlanner::new(&caps, 64).plan(&rule).unwrap();

        assert_eq!(plan.queries().len(), 1);
        assert!(plan.queries()[0].is_date_only());
        assert!(plan.admits(&asset("a").favorite(true).person("Alice").build()));
        assert!(!plan.admits(&asset("b").favorite(true).build()));
    }

    #[test]
    fn test_date_bounds_injected_into_every_query() {
        let caps = CatalogCapabilities::immich();
        let tree = ConditionNode::or(vec![people_leaf(&["Alice"]), favorite_leaf(true)]);
        let rule = rule("r", "A")
            .taken("2023-06-01T00:00:00Z", "2023-07-01T00:00:00Z")
            .condition(tree)
            .build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();

        assert_eq!(plan.queries().len(), 2);
        for query in plan.queries() {
            assert_eq!(query.taken, rule.taken);
        }
    }

    #[test]
    fn test_plan_too_large() {
        let caps = CatalogCapabilities::immich();
        // Seven two-way ORs under one AND: 2^7 = 128 conjunctions.
        let pair = || ConditionNode::or(vec![people_leaf(&["Alice"]), favorite_leaf(true)]);
        let tree = ConditionNode::and((0..7).map(|_| pair()).collect());
        let rule = rule("wide", "A").condition(tree).build();

        let err = immich_planner(&caps).plan(&rule).unwrap_err();
        match err {
            Error::PlanTooLarge {
                rule_id,
                queries,
                limit,
            } => {
                assert_eq!(rule_id, "wide");
                assert_eq!(queries, 128);
                assert_eq!(limit, 64);
            }
            other => panic!("expected PlanTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_leaf_is_invalid_at_plan_time() {
        let caps = CatalogCapabilities::immich();
        let tree = ConditionNode::leaf(LeafCondition::default());
        let rule = rule("r", "A").condition(tree).build();

        let err = immich_planner(&caps).plan(&rule).unwrap_err();
        assert!(matches!(err, Error::InvalidCondition { .. }));
    }

    #[test]
    fn test_residual_keeps_or_union_exact() {
        // favorite-only branch admits an asset the people branch vetoes on
        // its own; the single whole-tree residual must still admit it.
        let caps = CatalogCapabilities::immich();
        let tree = ConditionNode::or(vec![
            favorite_leaf(true),
            ConditionNode::and(vec![people_leaf(&["Alice"]), tags_leaf(&["travel"], &[])]),
        ]);
        let rule = rule("r", "A").condition(tree).build();

        let plan = immich_planner(&caps).plan(&rule).unwrap();

        // Favorite asset with no people, no tags: matches the first branch.
        assert!(plan.admits(&asset("a").favorite(true).build()));
        // Alice without the tag: neither branch.
        assert!(!plan.admits(&asset("b").person("Alice").build()));
        // Alice with the tag: second branch.
        assert!(plan.admits(&asset("c").person("Alice").tag("travel").build()));
    }
}
