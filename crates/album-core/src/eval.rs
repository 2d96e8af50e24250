//! Condition-tree evaluation over fetched asset attributes.
//!
//! Evaluation is pure and total: every tree produces a verdict for every
//! asset, including shapes validation would reject (an empty `and` is
//! vacuously true, an empty `or` is false, an empty leaf matches). Query
//! planning relies on this as the residual predicate — after the catalog
//! returns a superset, [`evaluate`] against the full tree is the exact
//! answer.
//!
//! Text comparisons (camera make/model, people, tags) are trimmed and
//! case-insensitive, matching how the catalog itself compares them.

use album_catalog::AssetRecord;
use album_config::{ConditionNode, LeafCondition};

/// Does `asset` satisfy the whole tree?
pub fn evaluate(node: &ConditionNode, asset: &AssetRecord) -> bool {
    match node {
        ConditionNode::And { and } => and.iter().all(|child| evaluate(child, asset)),
        ConditionNode::Or { or } => or.iter().any(|child| evaluate(child, asset)),
        ConditionNode::Leaf(leaf) => evaluate_leaf(leaf, asset),
    }
}

/// Does `asset` satisfy every param the leaf carries?
pub fn evaluate_leaf(leaf: &LeafCondition, asset: &AssetRecord) -> bool {
    if let Some(favorite) = leaf.is_favorite
        && asset.favorite != favorite
    {
        return false;
    }
    if let Some(kinds) = &leaf.asset_types
        && !kinds.contains(&asset.kind)
    {
        return false;
    }
    if let Some(camera) = &leaf.camera {
        if let Some(make) = &camera.make
            && !text_matches(asset.camera_make.as_deref(), make)
        {
            return false;
        }
        if let Some(model) = &camera.model
            && !text_matches(asset.camera_model.as_deref(), model)
        {
            return false;
        }
    }
    if let Some(people) = &leaf.people
        && !people
            .include
            .iter()
            .all(|name| list_contains(&asset.people, name))
    {
        return false;
    }
    if let Some(tags) = &leaf.tags {
        if let Some(include) = &tags.include
            && !include.iter().any(|tag| list_contains(&asset.tags, tag))
        {
            return false;
        }
        if let Some(exclude) = &tags.exclude
            && exclude.iter().any(|tag| list_contains(&asset.tags, tag))
        {
            return false;
        }
    }
    true
}

fn text_eq(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn text_matches(actual: Option<&str>, wanted: &str) -> bool {
    actual.is_some_and(|value| text_eq(value, wanted))
}

fn list_contains(haystack: &[String], needle: &str) -> bool {
    haystack.iter().any(|item| text_eq(item, needle))
}
