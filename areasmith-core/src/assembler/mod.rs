//! Area assembly from resolved ways and ready relations.
//!
//! Two implementations share the [`Assembler`] capability: the
//! [`RingAssembler`] builds polygon geometry, while the
//! [`CollectOnlyAssembler`] records structural statistics and produces
//! nothing. The pipeline picks one at construction time.

use std::fmt;

use crate::area::Area;
use crate::collector::{ReadyRelation, ResolvedWay};
use crate::problem::ProblemRecord;

mod polygon;
mod rings;

pub use polygon::RingAssembler;

/// Tolerances and output toggles for the [`RingAssembler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Verbosity of per-assembly diagnostics. Level 1 and above also
    /// reports duplicate member ways as problems.
    pub debug_level: u8,
    /// Report members whose role contradicts the ring nesting.
    pub check_roles: bool,
    /// Emit an empty placeholder area when assembly fails.
    pub create_empty_areas: bool,
    /// Build areas from standalone closed ways.
    pub create_way_polygons: bool,
    /// Build areas from relations carrying their own area tags.
    pub create_new_style_polygons: bool,
    /// Build areas from relations taking their tags from outer ways.
    pub create_old_style_polygons: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            debug_level: 0,
            check_roles: false,
            create_empty_areas: false,
            create_way_polygons: true,
            create_new_style_polygons: true,
            create_old_style_polygons: true,
        }
    }
}

impl AssemblerConfig {
    /// Disable every kind of area output.
    pub const fn without_areas(self) -> Self {
        Self {
            create_way_polygons: false,
            create_new_style_polygons: false,
            create_old_style_polygons: false,
            ..self
        }
    }
}

/// Output of one assembler call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    /// Areas produced, at most one per call.
    pub areas: Vec<Area>,
    /// Defects found while assembling.
    pub problems: Vec<ProblemRecord>,
}

impl Assembly {
    /// Whether nothing was produced.
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty() && self.problems.is_empty()
    }
}

/// Counters describing what the assembler did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub from_ways: u64,
    pub from_relations: u64,
    pub rings: u64,
    pub inner_rings: u64,
    pub open_rings: u64,
    pub ways_missing_locations: u64,
    pub degenerate_ways: u64,
    pub degenerate_rings: u64,
    pub role_mismatches: u64,
    pub duplicate_ways: u64,
    pub failures: u64,
    pub empty_areas: u64,
    pub new_style_skipped: u64,
    pub old_style_skipped: u64,
    pub ways_skipped: u64,
    /// Relations seen by the collect-only assembler.
    pub relations_collected: u64,
    /// Member ways seen by the collect-only assembler.
    pub member_ways_collected: u64,
    /// Standalone ways seen by the collect-only assembler.
    pub ways_collected: u64,
}

impl fmt::Display for AssemblyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("from_ways", self.from_ways),
            ("from_relations", self.from_relations),
            ("rings", self.rings),
            ("inner_rings", self.inner_rings),
            ("open_rings", self.open_rings),
            ("ways_missing_locations", self.ways_missing_locations),
            ("degenerate_ways", self.degenerate_ways),
            ("degenerate_rings", self.degenerate_rings),
            ("role_mismatches", self.role_mismatches),
            ("duplicate_ways", self.duplicate_ways),
            ("failures", self.failures),
            ("empty_areas", self.empty_areas),
            ("new_style_skipped", self.new_style_skipped),
            ("old_style_skipped", self.old_style_skipped),
            ("ways_skipped", self.ways_skipped),
            ("relations_collected", self.relations_collected),
            ("member_ways_collected", self.member_ways_collected),
            ("ways_collected", self.ways_collected),
        ];
        let mut first = true;
        for (name, value) in fields.into_iter().filter(|(_, value)| *value > 0) {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        if first {
            f.write_str("nothing assembled")?;
        }
        Ok(())
    }
}

/// Builds areas from complete inputs.
pub trait Assembler {
    /// Assemble a standalone closed way.
    fn assemble_way(&mut self, way: &ResolvedWay) -> Assembly;

    /// Assemble a relation whose member ways are all resolved.
    fn assemble_relation(&mut self, relation: &ReadyRelation) -> Assembly;

    /// Counters gathered so far.
    fn stats(&self) -> &AssemblyStats;
}

impl<A: Assembler + ?Sized> Assembler for Box<A> {
    fn assemble_way(&mut self, way: &ResolvedWay) -> Assembly {
        (**self).assemble_way(way)
    }

    fn assemble_relation(&mut self, relation: &ReadyRelation) -> Assembly {
        (**self).assemble_relation(relation)
    }

    fn stats(&self) -> &AssemblyStats {
        (**self).stats()
    }
}

/// Records relation structure without building geometry.
#[derive(Debug, Default, Clone)]
pub struct CollectOnlyAssembler {
    stats: AssemblyStats,
}

impl Assembler for CollectOnlyAssembler {
    fn assemble_way(&mut self, _way: &ResolvedWay) -> Assembly {
        self.stats.ways_collected += 1;
        Assembly::default()
    }

    fn assemble_relation(&mut self, relation: &ReadyRelation) -> Assembly {
        self.stats.relations_collected += 1;
        self.stats.member_ways_collected += relation.members.len() as u64;
        Assembly::default()
    }

    fn stats(&self) -> &AssemblyStats {
        &self.stats
    }
}
