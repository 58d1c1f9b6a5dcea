//! Tag predicates deciding which relations and ways describe areas.

use std::fmt;

use crate::entity::{Relation, Tags};

use super::ResolvedWay;

/// Keys that carry no meaning for the area itself.
const BOOKKEEPING_KEYS: [&str; 5] = ["type", "created_by", "source", "note", "fixme"];

/// Role of a way member within an area relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemberRole {
    /// `role=outer`.
    Outer,
    /// `role=inner`.
    Inner,
    /// Empty role; nesting decides.
    Unspecified,
}

impl MemberRole {
    /// Parse an eligible role, returning `None` for any other role string.
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "outer" => Some(Self::Outer),
            "inner" => Some(Self::Inner),
            "" => Some(Self::Unspecified),
            _ => None,
        }
    }

    /// Role string as written in the relation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outer => "outer",
            Self::Inner => "inner",
            Self::Unspecified => "",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides which entities are eligible for area assembly.
pub trait AreaPredicate {
    /// Whether a relation describes an area and should be collected.
    fn is_area_relation(&self, relation: &Relation) -> bool;

    /// Whether a way forms an area on its own.
    fn is_area_way(&self, way: &ResolvedWay) -> bool;
}

/// Default predicate following OpenStreetMap conventions.
///
/// Relations qualify with `type=multipolygon` or `type=boundary`. Ways
/// qualify when closed, carrying at least one descriptive tag and not tagged
/// `area=no`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TagAreaPredicate;

impl AreaPredicate for TagAreaPredicate {
    fn is_area_relation(&self, relation: &Relation) -> bool {
        matches!(relation.relation_type(), Some("multipolygon" | "boundary"))
    }

    fn is_area_way(&self, way: &ResolvedWay) -> bool {
        way.ends_have_same_id()
            && way.node_refs.len() >= 4
            && carries_area_tags(&way.tags)
            && way.tags.get("area").map(String::as_str) != Some("no")
    }
}

/// Whether tags describe something beyond bookkeeping keys.
///
/// A relation passing this check is a new-style multipolygon: the area takes
/// the relation's own tags. Otherwise it is old-style and the tags come from
/// its outer ways.
pub fn carries_area_tags(tags: &Tags) -> bool {
    tags.keys()
        .any(|key| !BOOKKEEPING_KEYS.contains(&key.as_str()))
}
