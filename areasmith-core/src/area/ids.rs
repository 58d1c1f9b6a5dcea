use std::fmt;

use log::warn;

use super::AreaOrigin;

/// Synthetic identifier of an assembled area.
///
/// The source id is doubled and the lowest bit carries the origin
/// (0 = way, 1 = relation), so way- and relation-derived areas never share an
/// id and the pair (origin, source id) can be recovered from the id alone.
///
/// # Examples
/// ```
/// use areasmith_core::{AreaId, AreaOrigin};
///
/// let id = AreaId::encode(AreaOrigin::Relation, 21).unwrap();
/// assert_eq!(id.get(), 43);
/// assert_eq!(id.origin(), AreaOrigin::Relation);
/// assert_eq!(id.source_id(), 21);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AreaId(i64);

impl AreaId {
    /// Derive the area id for a source entity.
    ///
    /// Returns `None` (and logs a warning) when the source id is too large to
    /// double without overflow.
    pub fn encode(origin: AreaOrigin, source_id: i64) -> Option<Self> {
        let tag = match origin {
            AreaOrigin::Way => 0,
            AreaOrigin::Relation => 1,
        };
        let encoded = source_id.checked_mul(2).and_then(|doubled| doubled.checked_add(tag));
        if encoded.is_none() {
            warn!(
                "Skipped area: origin={origin:?}, source_id={source_id} (exceeds supported range)"
            );
        }
        encoded.map(Self)
    }

    /// Raw numeric value.
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Whether the area came from a way or a relation.
    pub const fn origin(self) -> AreaOrigin {
        if self.0.rem_euclid(2) == 0 {
            AreaOrigin::Way
        } else {
            AreaOrigin::Relation
        }
    }

    /// Id of the way or relation the area was built from.
    pub const fn source_id(self) -> i64 {
        self.0.div_euclid(2)
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(AreaOrigin::Way, 7, 14)]
    #[case(AreaOrigin::Relation, 7, 15)]
    #[case(AreaOrigin::Way, -3, -6)]
    #[case(AreaOrigin::Relation, -3, -5)]
    fn encodes_origin_in_low_bit(
        #[case] origin: AreaOrigin,
        #[case] source: i64,
        #[case] expected: i64,
    ) {
        let id = AreaId::encode(origin, source).expect("id in range");
        assert_eq!(id.get(), expected);
    }

    #[rstest]
    fn rejects_ids_that_overflow() {
        assert!(AreaId::encode(AreaOrigin::Way, i64::MAX).is_none());
        assert!(AreaId::encode(AreaOrigin::Relation, i64::MIN).is_none());
    }

    proptest! {
        #[test]
        fn origin_and_source_are_recoverable(source in -(1_i64 << 61)..(1_i64 << 61), relation in any::<bool>()) {
            let origin = if relation { AreaOrigin::Relation } else { AreaOrigin::Way };
            let id = AreaId::encode(origin, source).expect("id in range");
            prop_assert_eq!(id.origin(), origin);
            prop_assert_eq!(id.source_id(), source);
        }

        #[test]
        fn way_and_relation_ids_never_collide(way in -(1_i64 << 61)..(1_i64 << 61), relation in -(1_i64 << 61)..(1_i64 << 61)) {
            let way_id = AreaId::encode(AreaOrigin::Way, way).expect("way id");
            let relation_id = AreaId::encode(AreaOrigin::Relation, relation).expect("relation id");
            prop_assert_ne!(way_id, relation_id);
        }
    }
}
