//! Boolean condition trees over catalog assets.
//!
//! A rule's `conditions` block parses into a [`ConditionNode`]: nested
//! `and` / `or` combinators with flat filter maps at the leaves. The tree
//! itself is pure data — evaluation and query planning live in album-core —
//! so this module only cares about the YAML shape:
//!
//! ```yaml
//! conditions:
//!   or:
//!     - people:
//!         include: [Alice]
//!     - and:
//!         - is_favorite: true
//!         - camera:
//!             make: Canon
//! ```

use serde::{Deserialize, Serialize};

use crate::model::AssetKind;

/// One node of a condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    /// Every child must match.
    And { and: Vec<ConditionNode> },
    /// At least one child must match.
    Or { or: Vec<ConditionNode> },
    /// A flat filter map; all present params must hold.
    Leaf(LeafCondition),
}

impl ConditionNode {
    pub fn and(children: Vec<ConditionNode>) -> Self {
        ConditionNode::And { and: children }
    }

    pub fn or(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Or { or: children }
    }

    pub fn leaf(leaf: LeafCondition) -> Self {
        ConditionNode::Leaf(leaf)
    }
}

/// Filter params a single leaf may carry. All fields optional; a leaf
/// matches an asset when every present param holds. Validation rejects
/// leaves with no params at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeafCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_types: Option<Vec<AssetKind>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub people: Option<PeopleFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagFilter>,
}

impl LeafCondition {
    pub fn is_empty(&self) -> bool {
        self.is_favorite.is_none()
            && self.asset_types.is_none()
            && self.camera.is_none()
            && self.people.is_none()
            && self.tags.is_none()
    }
}

/// EXIF camera constraint; `make` and `model` compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CameraFilter {
    pub fn is_empty(&self) -> bool {
        self.make.is_none() && self.model.is_none()
    }
}

/// People constraint. Every listed person must appear on the asset — the
/// catalog ANDs person filters within one query, and the evaluator mirrors
/// that. OR-of-people is expressed with an `or` combinator over leaves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeopleFilter {
    pub include: Vec<String>,
}

/// Tag constraint: at least one of `include`, none of `exclude`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}
