//! Rule and condition-tree builders for tests.

use chrono::{DateTime, Utc};

use album_config::{
    AssetKind, CameraFilter, ConditionNode, DateRange, LeafCondition, PeopleFilter, Rule,
    ShareWith, TagFilter,
};

/// Start building a concrete rule with unbounded dates and no condition.
pub fn rule(id: &str, album_name: &str) -> RuleBuilder {
    RuleBuilder {
        rule: Rule {
            id: id.to_string(),
            album_name: album_name.to_string(),
            description: None,
            taken: DateRange::default(),
            created: DateRange::default(),
            condition: None,
            share_with: None,
            fuzzy_match: None,
        },
    }
}

/// Fluent builder over [`Rule`].
pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    /// Half-open taken window, both ends RFC 3339.
    ///
    /// # Panics
    /// Panics on an unparsable timestamp.
    pub fn taken(mut self, start: &str, end: &str) -> Self {
        self.rule.taken = DateRange::new(Some(parse_utc(start)), Some(parse_utc(end)));
        self
    }

    /// Half-open created window, both ends RFC 3339.
    ///
    /// # Panics
    /// Panics on an unparsable timestamp.
    pub fn created(mut self, start: &str, end: &str) -> Self {
        self.rule.created = DateRange::new(Some(parse_utc(start)), Some(parse_utc(end)));
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.rule.description = Some(text.to_string());
        self
    }

    pub fn condition(mut self, node: ConditionNode) -> Self {
        self.rule.condition = Some(node);
        self
    }

    pub fn share_with(mut self, share: ShareWith) -> Self {
        self.rule.share_with = Some(share);
        self
    }

    pub fn share_users(mut self, emails: &[&str]) -> Self {
        self.rule.share_with = Some(ShareWith::Users(
            emails.iter().map(|e| (*e).to_string()).collect(),
        ));
        self
    }

    pub fn fuzzy(mut self, enabled: bool) -> Self {
        self.rule.fuzzy_match = Some(enabled);
        self
    }

    pub fn build(self) -> Rule {
        self.rule
    }
}

/// `is_favorite` leaf.
pub fn favorite_leaf(value: bool) -> ConditionNode {
    ConditionNode::leaf(LeafCondition {
        is_favorite: Some(value),
        ..LeafCondition::default()
    })
}

/// `asset_types` leaf.
pub fn kinds_leaf(kinds: &[AssetKind]) -> ConditionNode {
    ConditionNode::leaf(LeafCondition {
        asset_types: Some(kinds.to_vec()),
        ..LeafCondition::default()
    })
}

/// `camera` leaf; either part optional.
pub fn camera_leaf(make: Option<&str>, model: Option<&str>) -> ConditionNode {
    ConditionNode::leaf(LeafCondition {
        camera: Some(CameraFilter {
            make: make.map(str::to_string),
            model: model.map(str::to_string),
        }),
        ..LeafCondition::default()
    })
}

/// `people` leaf; all names must appear.
pub fn people_leaf(names: &[&str]) -> ConditionNode {
    ConditionNode::leaf(LeafCondition {
        people: Some(PeopleFilter {
            include: names.iter().map(|n| (*n).to_string()).collect(),
        }),
        ..LeafCondition::default()
    })
}

/// `tags` leaf; empty slices mean the part is absent.
pub fn tags_leaf(include: &[&str], exclude: &[&str]) -> ConditionNode {
    let to_vec = |items: &[&str]| -> Option<Vec<String>> {
        if items.is_empty() {
            None
        } else {
            Some(items.iter().map(|t| (*t).to_string()).collect())
        }
    };
    ConditionNode::leaf(LeafCondition {
        tags: Some(TagFilter {
            include: to_vec(include),
            exclude: to_vec(exclude),
        }),
        ..LeafCondition::default()
    })
}

fn parse_utc(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .unwrap_or_else(|e| panic!("RuleBuilder: bad timestamp '{raw}': {e}"))
        .with_timezone(&Utc)
}
