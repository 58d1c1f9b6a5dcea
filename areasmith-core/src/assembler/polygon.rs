//! Geometry-building assembler.

use std::collections::HashSet;

use geo::algorithm::winding_order::Winding;
use geo::{LineString, MultiPolygon, Polygon};
use log::debug;

use crate::area::{Area, AreaId, AreaOrigin};
use crate::collector::{MemberRole, ReadyRelation, ResolvedWay, carries_area_tags};
use crate::entity::Tags;
use crate::problem::{ProblemKind, ProblemRecord};

use super::rings::{Placement, Ring, Segment, chain_rings, place_rings};
use super::{Assembler, AssemblerConfig, Assembly, AssemblyStats};

/// Builds multipolygon areas by chaining member ways into rings.
///
/// Rings are classified by geometric nesting: even depths are outer rings
/// and odd depths inner rings, each inner ring attached to the ring that
/// immediately encloses it. Declared roles only feed the role check.
///
/// # Examples
/// ```
/// use areasmith_core::{Assembler, AssemblerConfig, ResolvedWay, RingAssembler};
/// use geo::Coord;
///
/// let way = ResolvedWay {
///     id: 4,
///     node_refs: vec![1, 2, 3, 1],
///     locations: vec![
///         Some(Coord { x: 0.0, y: 0.0 }),
///         Some(Coord { x: 1.0, y: 0.0 }),
///         Some(Coord { x: 0.0, y: 1.0 }),
///         Some(Coord { x: 0.0, y: 0.0 }),
///     ],
///     tags: [("building".to_owned(), "yes".to_owned())].into(),
/// };
/// let mut assembler = RingAssembler::new(AssemblerConfig::default());
/// let assembly = assembler.assemble_way(&way);
/// assert_eq!(assembly.areas.len(), 1);
/// assert_eq!(assembly.areas[0].original_id(), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RingAssembler {
    config: AssemblerConfig,
    stats: AssemblyStats,
}

/// Source entity being assembled.
#[derive(Clone, Copy)]
struct Job {
    origin: AreaOrigin,
    source_id: i64,
}

impl Job {
    fn problem(self, kind: ProblemKind) -> ProblemRecord {
        ProblemRecord::new(self.origin.entity_kind(), self.source_id, kind)
    }
}

/// A member way after its locations were checked.
enum Prepared {
    Segment(Segment),
    Skipped,
    MissingLocations,
}

/// Successful geometry plus the outer-ring ways used for old-style tags.
struct Built {
    geometry: MultiPolygon<f64>,
    outer_ways: Vec<i64>,
}

impl RingAssembler {
    /// Create an assembler with the given configuration.
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            config,
            stats: AssemblyStats::default(),
        }
    }

    /// Configuration in use.
    pub const fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Convert way data into a chainable segment, recording defects.
    fn prepare(
        &mut self,
        job: Job,
        way: &ResolvedWay,
        role: MemberRole,
        problems: &mut Vec<ProblemRecord>,
    ) -> Prepared {
        if way.node_refs.len() < 2 {
            self.stats.degenerate_ways += 1;
            problems.push(job.problem(ProblemKind::DegenerateWay { way_id: way.id }));
            return Prepared::Skipped;
        }
        let Some(coords) = way.complete_locations() else {
            self.stats.ways_missing_locations += 1;
            problems.push(job.problem(ProblemKind::MissingLocations {
                way_id: way.id,
                missing: way.missing_locations(),
            }));
            return Prepared::MissingLocations;
        };
        Prepared::Segment(Segment {
            way_id: way.id,
            role,
            nodes: way.node_refs.clone(),
            coords,
        })
    }

    /// Chain, nest and orient rings. `None` means no usable geometry; the
    /// reasons were pushed to `problems`.
    fn build(
        &mut self,
        job: Job,
        segments: Vec<Segment>,
        problems: &mut Vec<ProblemRecord>,
    ) -> Option<Built> {
        let (rings, open) = chain_rings(segments);
        if !open.is_empty() {
            self.stats.open_rings += open.len() as u64;
            problems.extend(open.iter().map(|chain| {
                job.problem(ProblemKind::RingNotClosed {
                    start_node: chain.start_node,
                    end_node: chain.end_node,
                })
            }));
            return None;
        }

        let mut usable = Vec::with_capacity(rings.len());
        for ring in rings {
            if ring.coords.len() < 4 {
                self.stats.degenerate_rings += 1;
                problems.push(job.problem(ProblemKind::DegenerateRing {
                    way_id: ring.first_way(),
                }));
            } else {
                usable.push(ring);
            }
        }
        if usable.is_empty() {
            problems.push(job.problem(ProblemKind::NoRings));
            return None;
        }

        let placements = place_rings(&usable);
        self.check_roles(job, &usable, &placements, problems);
        Some(self.orient(usable, &placements))
    }

    fn check_roles(
        &mut self,
        job: Job,
        rings: &[Ring],
        placements: &[Placement],
        problems: &mut Vec<ProblemRecord>,
    ) {
        for (ring, placement) in rings.iter().zip(placements) {
            let actual = placement.role();
            for (way_id, declared) in &ring.ways {
                if *declared == MemberRole::Unspecified || *declared == actual {
                    continue;
                }
                self.stats.role_mismatches += 1;
                if self.config.check_roles {
                    problems.push(job.problem(ProblemKind::RoleMismatch {
                        way_id: *way_id,
                        declared: *declared,
                        actual,
                    }));
                }
            }
        }
    }

    /// Group inner rings under their enclosing outer ring and fix winding.
    fn orient(&mut self, rings: Vec<Ring>, placements: &[Placement]) -> Built {
        let mut outer_ways = Vec::new();
        let mut exteriors: Vec<LineString<f64>> = Vec::new();
        let mut interiors: Vec<Vec<LineString<f64>>> = Vec::new();
        let mut slot_of = vec![None; rings.len()];

        for (index, (ring, placement)) in rings.iter().zip(placements).enumerate() {
            if placement.role() == MemberRole::Outer {
                slot_of[index] = Some(interiors.len());
                outer_ways.extend(ring.ways.iter().map(|(way_id, _)| *way_id));
                interiors.push(Vec::new());
            }
        }

        for (ring, placement) in rings.into_iter().zip(placements) {
            self.stats.rings += 1;
            let mut line = ring.into_line_string();
            if placement.role() == MemberRole::Outer {
                line.make_ccw_winding();
                exteriors.push(line);
                continue;
            }
            self.stats.inner_rings += 1;
            line.make_cw_winding();
            let slot = placement.parent.and_then(|parent| slot_of[parent]);
            if let Some(holes) = slot.and_then(|slot| interiors.get_mut(slot)) {
                holes.push(line);
            }
        }

        let polygons = exteriors
            .into_iter()
            .zip(interiors)
            .map(|(exterior, holes)| Polygon::new(exterior, holes))
            .collect();
        Built {
            geometry: MultiPolygon::new(polygons),
            outer_ways,
        }
    }

    /// Area id for the job, or a problem when the id cannot be encoded.
    fn area_id(&mut self, job: Job, problems: &mut Vec<ProblemRecord>) -> Option<AreaId> {
        let id = AreaId::encode(job.origin, job.source_id);
        if id.is_none() {
            self.stats.failures += 1;
            problems.push(job.problem(ProblemKind::IdOutOfRange));
        }
        id
    }

    fn fail(&mut self, id: AreaId, tags: Tags, assembly: &mut Assembly) {
        self.stats.failures += 1;
        if self.config.create_empty_areas {
            self.stats.empty_areas += 1;
            assembly.areas.push(Area::empty(id, tags));
        }
    }

    /// Prepare member ways, dropping repeated ones. `None` when any member
    /// lacks locations.
    fn relation_segments(
        &mut self,
        job: Job,
        relation: &ReadyRelation,
        problems: &mut Vec<ProblemRecord>,
    ) -> Option<Vec<Segment>> {
        let mut seen = HashSet::with_capacity(relation.members.len());
        let mut segments = Vec::with_capacity(relation.members.len());
        let mut complete = true;
        for member in &relation.members {
            if !seen.insert(member.way.id) {
                self.stats.duplicate_ways += 1;
                if self.config.debug_level >= 1 {
                    problems.push(job.problem(ProblemKind::DuplicateWay {
                        way_id: member.way.id,
                    }));
                }
                continue;
            }
            match self.prepare(job, &member.way, member.role, problems) {
                Prepared::Segment(segment) => segments.push(segment),
                Prepared::Skipped => {}
                Prepared::MissingLocations => complete = false,
            }
        }
        complete.then_some(segments)
    }
}

/// Tags shared by every outer way, overlaid with the relation's own tags.
fn old_style_tags(relation: &ReadyRelation, outer_ways: &[i64]) -> Tags {
    let mut outer = relation
        .members
        .iter()
        .filter(|member| outer_ways.contains(&member.way.id))
        .map(|member| &member.way.tags);
    let mut tags = outer.next().cloned().unwrap_or_default();
    for way_tags in outer {
        tags.retain(|key, value| way_tags.get(key) == Some(value));
    }
    tags.extend(relation_tags(&relation.tags));
    tags
}

/// Relation tags without the `type` marker.
fn relation_tags(tags: &Tags) -> Tags {
    tags.iter()
        .filter(|(key, _)| key.as_str() != "type")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

impl Assembler for RingAssembler {
    fn assemble_way(&mut self, way: &ResolvedWay) -> Assembly {
        let mut assembly = Assembly::default();
        if !self.config.create_way_polygons {
            self.stats.ways_skipped += 1;
            return assembly;
        }
        let job = Job {
            origin: AreaOrigin::Way,
            source_id: way.id,
        };
        let Some(id) = self.area_id(job, &mut assembly.problems) else {
            return assembly;
        };
        let built = match self.prepare(job, way, MemberRole::Outer, &mut assembly.problems) {
            Prepared::Segment(segment) => self.build(job, vec![segment], &mut assembly.problems),
            Prepared::Skipped | Prepared::MissingLocations => None,
        };
        match built {
            Some(built) => {
                self.stats.from_ways += 1;
                assembly
                    .areas
                    .push(Area::new(id, way.tags.clone(), built.geometry));
            }
            None => self.fail(id, way.tags.clone(), &mut assembly),
        }
        if self.config.debug_level > 0 {
            debug!(
                "Way {}: {} area(s), {} problem(s)",
                way.id,
                assembly.areas.len(),
                assembly.problems.len()
            );
        }
        assembly
    }

    fn assemble_relation(&mut self, relation: &ReadyRelation) -> Assembly {
        let mut assembly = Assembly::default();
        let new_style = carries_area_tags(&relation.tags);
        if new_style && !self.config.create_new_style_polygons {
            self.stats.new_style_skipped += 1;
            return assembly;
        }
        if !new_style && !self.config.create_old_style_polygons {
            self.stats.old_style_skipped += 1;
            return assembly;
        }

        let job = Job {
            origin: AreaOrigin::Relation,
            source_id: relation.id,
        };
        let Some(id) = self.area_id(job, &mut assembly.problems) else {
            return assembly;
        };
        let built = self
            .relation_segments(job, relation, &mut assembly.problems)
            .and_then(|segments| self.build(job, segments, &mut assembly.problems));
        match built {
            Some(built) => {
                self.stats.from_relations += 1;
                let tags = if new_style {
                    relation_tags(&relation.tags)
                } else {
                    old_style_tags(relation, &built.outer_ways)
                };
                assembly.areas.push(Area::new(id, tags, built.geometry));
            }
            None => self.fail(id, relation_tags(&relation.tags), &mut assembly),
        }
        if self.config.debug_level > 0 {
            debug!(
                "Relation {} ({} style): {} area(s), {} problem(s)",
                relation.id,
                if new_style { "new" } else { "old" },
                assembly.areas.len(),
                assembly.problems.len()
            );
        }
        assembly
    }

    fn stats(&self) -> &AssemblyStats {
        &self.stats
    }
}
