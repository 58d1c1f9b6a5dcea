//! Assembled polygon areas.

use std::fmt;

use geo::MultiPolygon;

use crate::entity::{EntityKind, Tags};

mod ids;

pub use ids::AreaId;

/// Kind of entity an area was assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AreaOrigin {
    /// A single closed way.
    Way,
    /// A multipolygon or boundary relation.
    Relation,
}

impl AreaOrigin {
    /// Single-letter code stored in the `source` column (`w` or `r`).
    pub const fn as_char(self) -> char {
        match self {
            Self::Way => 'w',
            Self::Relation => 'r',
        }
    }

    /// Entity family matching this origin.
    pub const fn entity_kind(self) -> EntityKind {
        match self {
            Self::Way => EntityKind::Way,
            Self::Relation => EntityKind::Relation,
        }
    }
}

impl fmt::Display for AreaOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.entity_kind(), f)
    }
}

/// A polygon area derived from one way or one relation.
///
/// Each polygon of the geometry is one outer ring with the inner rings it
/// immediately encloses. Outer rings wind counter-clockwise and inner rings
/// clockwise. An empty geometry marks a placeholder for a failed assembly.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Area {
    id: AreaId,
    tags: Tags,
    geometry: MultiPolygon<f64>,
}

impl Area {
    /// Construct an area from its id, tags and geometry.
    pub const fn new(id: AreaId, tags: Tags, geometry: MultiPolygon<f64>) -> Self {
        Self { id, tags, geometry }
    }

    /// Placeholder with no rings for a source that failed to assemble.
    pub fn empty(id: AreaId, tags: Tags) -> Self {
        Self::new(id, tags, MultiPolygon::new(Vec::new()))
    }

    /// Synthetic area id.
    pub const fn id(&self) -> AreaId {
        self.id
    }

    /// Whether the area came from a way or a relation.
    pub const fn origin(&self) -> AreaOrigin {
        self.id.origin()
    }

    /// Id of the source way or relation.
    pub const fn original_id(&self) -> i64 {
        self.id.source_id()
    }

    /// Tags describing the area.
    pub const fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Polygon geometry.
    pub const fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Whether this is an empty placeholder.
    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty()
    }

    /// Number of outer rings.
    pub fn outer_ring_count(&self) -> usize {
        self.geometry.0.len()
    }

    /// Number of inner rings across all polygons.
    pub fn inner_ring_count(&self) -> usize {
        self.geometry
            .0
            .iter()
            .map(|polygon| polygon.interiors().len())
            .sum()
    }
}
