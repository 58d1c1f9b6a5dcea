//! Ring chaining and nesting.
//!
//! Ways are chained by node id, never by coordinate, so two distinct nodes
//! sharing a location do not join rings.

use geo::algorithm::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{Coord, LineString, Polygon};

use crate::collector::MemberRole;

/// A way ready to be chained: node ids paired with resolved locations.
#[derive(Debug, Clone)]
pub(super) struct Segment {
    pub way_id: i64,
    pub role: MemberRole,
    pub nodes: Vec<i64>,
    pub coords: Vec<Coord<f64>>,
}

/// A closed ring and the member ways it was chained from.
#[derive(Debug, Clone)]
pub(super) struct Ring {
    pub ways: Vec<(i64, MemberRole)>,
    pub coords: Vec<Coord<f64>>,
}

impl Ring {
    pub fn first_way(&self) -> i64 {
        self.ways.first().map_or(0, |(way_id, _)| *way_id)
    }

    pub fn into_line_string(self) -> LineString<f64> {
        LineString::new(self.coords)
    }
}

/// Chain ends of a ring that could not be closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct OpenChain {
    pub start_node: i64,
    pub end_node: i64,
}

struct Chain {
    ways: Vec<(i64, MemberRole)>,
    nodes: Vec<i64>,
    coords: Vec<Coord<f64>>,
}

impl Chain {
    fn start(segment: Segment) -> Self {
        Self {
            ways: vec![(segment.way_id, segment.role)],
            nodes: segment.nodes,
            coords: segment.coords,
        }
    }

    fn is_closed(&self) -> bool {
        self.nodes.len() > 1 && self.nodes.first() == self.nodes.last()
    }

    fn end_node(&self) -> Option<i64> {
        self.nodes.last().copied()
    }

    fn reverse(&mut self) {
        self.nodes.reverse();
        self.coords.reverse();
    }

    /// Append `segment` if one of its ends meets the chain's end.
    fn try_extend(&mut self, segment: &Segment) -> bool {
        let Some(end) = self.end_node() else {
            return false;
        };
        let forward = segment.nodes.first() == Some(&end);
        let backward = segment.nodes.last() == Some(&end);
        if forward {
            self.nodes.extend(segment.nodes.iter().skip(1));
            self.coords.extend(segment.coords.iter().skip(1));
        } else if backward {
            self.nodes.extend(segment.nodes.iter().rev().skip(1));
            self.coords.extend(segment.coords.iter().rev().skip(1));
        } else {
            return false;
        }
        self.ways.push((segment.way_id, segment.role));
        true
    }
}

/// Chain segments sharing end nodes into rings.
///
/// Segments are consumed in order: each ring starts at the first unused
/// segment and grows at its end, flipping once to grow from the other end
/// before giving up.
pub(super) fn chain_rings(segments: Vec<Segment>) -> (Vec<Ring>, Vec<OpenChain>) {
    let mut unused: Vec<Option<Segment>> = segments.into_iter().map(Some).collect();
    let mut rings = Vec::new();
    let mut open = Vec::new();

    for start in 0..unused.len() {
        let Some(segment) = unused.get_mut(start).and_then(Option::take) else {
            continue;
        };
        let mut chain = Chain::start(segment);
        let mut flipped = false;
        while !chain.is_closed() {
            let next = unused
                .iter()
                .position(|slot| slot.as_ref().is_some_and(|s| chain.try_extend(s)));
            match next {
                Some(index) => {
                    unused[index] = None;
                }
                None if !flipped => {
                    flipped = true;
                    chain.reverse();
                }
                None => break,
            }
        }
        if chain.is_closed() {
            rings.push(Ring {
                ways: chain.ways,
                coords: chain.coords,
            });
        } else {
            open.push(OpenChain {
                start_node: chain.nodes.first().copied().unwrap_or_default(),
                end_node: chain.nodes.last().copied().unwrap_or_default(),
            });
        }
    }
    (rings, open)
}

/// Where a ring sits in the nesting hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Placement {
    /// Number of rings enclosing this one. Even depths are outer rings.
    pub depth: usize,
    /// Immediately enclosing ring, for inner rings.
    pub parent: Option<usize>,
}

impl Placement {
    pub const fn role(self) -> MemberRole {
        if self.depth % 2 == 0 {
            MemberRole::Outer
        } else {
            MemberRole::Inner
        }
    }
}

/// Whether `inner` lies inside `outer`.
///
/// The first vertex of `inner` not on the boundary of `outer` decides, so
/// rings touching at shared nodes still nest. Identical rings do not.
fn encloses(outer: &Polygon<f64>, inner: &Ring) -> bool {
    inner
        .coords
        .iter()
        .map(|coord| outer.coordinate_position(coord))
        .find(|position| *position != CoordPos::OnBoundary)
        .is_some_and(|position| position == CoordPos::Inside)
}

/// Compute nesting depth and parent for every ring.
pub(super) fn place_rings(rings: &[Ring]) -> Vec<Placement> {
    let shapes: Vec<Polygon<f64>> = rings
        .iter()
        .map(|ring| Polygon::new(LineString::new(ring.coords.clone()), Vec::new()))
        .collect();
    let containers: Vec<Vec<usize>> = rings
        .iter()
        .enumerate()
        .map(|(index, ring)| {
            shapes
                .iter()
                .enumerate()
                .filter(|(other, shape)| *other != index && encloses(shape, ring))
                .map(|(other, _)| other)
                .collect()
        })
        .collect();

    containers
        .iter()
        .map(|enclosing| {
            let depth = enclosing.len();
            let parent = depth.checked_sub(1).and_then(|parent_depth| {
                enclosing
                    .iter()
                    .copied()
                    .find(|candidate| containers[*candidate].len() == parent_depth)
            });
            Placement { depth, parent }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn segment(way_id: i64, nodes: &[i64]) -> Segment {
        Segment {
            way_id,
            role: MemberRole::Unspecified,
            nodes: nodes.to_vec(),
            coords: nodes
                .iter()
                .map(|id| Coord {
                    x: *id as f64,
                    y: 0.0,
                })
                .collect(),
        }
    }

    fn square(way_id: i64, first_node: i64, origin: f64, size: f64) -> Segment {
        let nodes = vec![
            first_node,
            first_node + 1,
            first_node + 2,
            first_node + 3,
            first_node,
        ];
        let coords = vec![
            Coord { x: origin, y: origin },
            Coord { x: origin + size, y: origin },
            Coord {
                x: origin + size,
                y: origin + size,
            },
            Coord {
                x: origin,
                y: origin + size,
            },
            Coord { x: origin, y: origin },
        ];
        Segment {
            way_id,
            role: MemberRole::Unspecified,
            nodes,
            coords,
        }
    }

    #[rstest]
    fn chains_ways_in_any_direction() {
        let (rings, open) = chain_rings(vec![
            segment(1, &[1, 2, 3]),
            segment(2, &[5, 4, 3]),
            segment(3, &[5, 1]),
        ]);
        assert!(open.is_empty());
        assert_eq!(rings.len(), 1);
        let ways: Vec<i64> = rings[0].ways.iter().map(|(id, _)| *id).collect();
        assert_eq!(ways, vec![1, 2, 3]);
        assert_eq!(rings[0].coords.len(), 6);
    }

    #[rstest]
    fn grows_from_the_start_when_the_end_is_stuck() {
        let (rings, open) = chain_rings(vec![segment(1, &[2, 3]), segment(2, &[1, 2])]);
        assert!(rings.is_empty());
        assert_eq!(
            open,
            vec![OpenChain {
                start_node: 3,
                end_node: 1
            }]
        );
    }

    #[rstest]
    fn reports_open_chains() {
        let (rings, open) = chain_rings(vec![segment(1, &[1, 2, 3]), segment(2, &[3, 4])]);
        assert!(rings.is_empty());
        assert_eq!(
            open,
            vec![OpenChain {
                start_node: 1,
                end_node: 4
            }]
        );
    }

    #[rstest]
    fn nests_rings_by_containment() {
        let (rings, _) = chain_rings(vec![
            square(1, 10, 0.0, 10.0),
            square(2, 20, 2.0, 6.0),
            square(3, 30, 3.0, 2.0),
            square(4, 40, 20.0, 1.0),
        ]);
        let placements = place_rings(&rings);
        let depths: Vec<usize> = placements.iter().map(|p| p.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 0]);
        assert_eq!(placements[1].parent, Some(0));
        assert_eq!(placements[2].parent, Some(1));
        assert_eq!(placements[1].role(), MemberRole::Inner);
        assert_eq!(placements[2].role(), MemberRole::Outer);
    }

    #[rstest]
    fn touching_inner_ring_still_nests() {
        let outer = square(1, 10, 0.0, 4.0);
        let mut inner = square(2, 20, 0.0, 2.0);
        inner.nodes[0] = 10;
        inner.nodes[4] = 10;
        let (rings, _) = chain_rings(vec![outer, inner]);
        let placements = place_rings(&rings);
        assert_eq!(placements[1].depth, 1);
    }
}
