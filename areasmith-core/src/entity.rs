//! Map primitives as they arrive from an entity stream.
//!
//! Coordinates are WGS84 with `x = longitude` and `y = latitude`.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

use geo::Coord;

/// OpenStreetMap-style key/value tags.
///
/// Ordered so dumps and persisted JSON are stable across runs.
pub type Tags = BTreeMap<String, String>;

/// Discriminates the three entity families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityKind {
    /// A point location.
    Node,
    /// An ordered list of node references.
    Way,
    /// A collection of role-annotated members.
    Relation,
}

impl EntityKind {
    /// Single-letter code used by the textual reports (`n`, `w`, `r`).
    pub const fn as_char(self) -> char {
        match self {
            Self::Node => 'n',
            Self::Way => 'w',
            Self::Relation => 'r',
        }
    }

    const fn mask_bit(self) -> u8 {
        match self {
            Self::Node => 0b001,
            Self::Way => 0b010,
            Self::Relation => 0b100,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        };
        f.write_str(name)
    }
}

/// Set of entity kinds requested from a stream.
///
/// # Examples
/// ```
/// use areasmith_core::{EntityKind, EntityMask};
///
/// let mask = EntityMask::NODES | EntityMask::WAYS;
/// assert!(mask.contains(EntityKind::Way));
/// assert!(!mask.contains(EntityKind::Relation));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityMask(u8);

impl EntityMask {
    /// Requests nothing.
    pub const NONE: Self = Self(0);
    /// Requests nodes only.
    pub const NODES: Self = Self(EntityKind::Node.mask_bit());
    /// Requests ways only.
    pub const WAYS: Self = Self(EntityKind::Way.mask_bit());
    /// Requests relations only.
    pub const RELATIONS: Self = Self(EntityKind::Relation.mask_bit());

    /// Whether entities of `kind` pass the mask.
    pub const fn contains(self, kind: EntityKind) -> bool {
        self.0 & kind.mask_bit() != 0
    }

    /// Union of two masks.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for EntityMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl fmt::Display for EntityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (EntityKind::Node, "nodes"),
            (EntityKind::Way, "ways"),
            (EntityKind::Relation, "relations"),
        ]
        .into_iter()
        .filter(|(kind, _)| self.contains(*kind))
        .map(|(_, name)| name)
        .collect();
        if names.is_empty() {
            f.write_str("nothing")
        } else {
            f.write_str(&names.join("+"))
        }
    }
}

/// A point location. `location` is `None` when the source carried an
/// absent or out-of-range coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i64,
    pub location: Option<Coord<f64>>,
}

/// An ordered sequence of node references.
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub id: i64,
    pub node_refs: Vec<i64>,
    pub tags: Tags,
}

impl Way {
    /// Whether the first and last node references match.
    pub fn ends_have_same_id(&self) -> bool {
        match (self.node_refs.first(), self.node_refs.last()) {
            (Some(first), Some(last)) => self.node_refs.len() > 1 && first == last,
            _ => false,
        }
    }
}

/// One member reference of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Member {
    pub id: i64,
    pub kind: EntityKind,
    pub role: String,
}

impl Member {
    /// Construct a member reference.
    pub fn new(id: i64, kind: EntityKind, role: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            role: role.into(),
        }
    }
}

/// A tagged collection of members.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relation {
    pub id: i64,
    pub members: Vec<Member>,
    pub tags: Tags,
}

impl Relation {
    /// Value of the `type` tag, if present.
    pub fn relation_type(&self) -> Option<&str> {
        self.tags.get("type").map(String::as_str)
    }
}

/// A single streamed map primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl Entity {
    /// Family of this entity.
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Node(_) => EntityKind::Node,
            Self::Way(_) => EntityKind::Way,
            Self::Relation(_) => EntityKind::Relation,
        }
    }

    /// Identifier of this entity within its family.
    pub const fn id(&self) -> i64 {
        match self {
            Self::Node(node) => node.id,
            Self::Way(way) => way.id,
            Self::Relation(relation) => relation.id,
        }
    }
}

/// Collect borrowed key/value pairs into owned [`Tags`].
pub fn collect_tags<'a, T>(tags: T) -> Tags
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}
