//! Recoverable defects found while assembling areas.
//!
//! Problems never abort a run. They are handed to a [`ProblemReporter`],
//! which may print them, persist them or simply keep them in memory.

use std::fmt;

use log::warn;

use crate::collector::MemberRole;
use crate::entity::EntityKind;
use crate::output::SinkError;

/// What went wrong for one source entity.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProblemKind {
    /// Some node references of a way had no location.
    MissingLocations {
        /// Way with unresolved nodes.
        way_id: i64,
        /// Number of unresolved node references.
        missing: usize,
    },
    /// A way had fewer than two node references.
    DegenerateWay {
        /// Offending way.
        way_id: i64,
    },
    /// Chaining member ways left a ring open.
    RingNotClosed {
        /// Node where the open chain starts.
        start_node: i64,
        /// Node where the open chain ends.
        end_node: i64,
    },
    /// A closed ring had fewer than four positions and was dropped.
    DegenerateRing {
        /// First way contributing to the ring.
        way_id: i64,
    },
    /// A member's role disagreed with the ring's geometric nesting.
    RoleMismatch {
        /// Member way carrying the role.
        way_id: i64,
        /// Role declared in the relation.
        declared: MemberRole,
        /// Role implied by nesting depth.
        actual: MemberRole,
    },
    /// The same way appeared more than once in a relation.
    DuplicateWay {
        /// Repeated member way.
        way_id: i64,
    },
    /// No closed ring could be built at all.
    NoRings,
    /// The source id cannot be turned into an area id.
    IdOutOfRange,
    /// An output sink failed to accept the area.
    SinkFailure {
        /// Name of the failing sink.
        sink: String,
        /// Rendered error chain.
        message: String,
    },
}

impl ProblemKind {
    /// Stable machine-readable name.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingLocations { .. } => "missing_locations",
            Self::DegenerateWay { .. } => "degenerate_way",
            Self::RingNotClosed { .. } => "ring_not_closed",
            Self::DegenerateRing { .. } => "degenerate_ring",
            Self::RoleMismatch { .. } => "role_mismatch",
            Self::DuplicateWay { .. } => "duplicate_way",
            Self::NoRings => "no_rings",
            Self::IdOutOfRange => "id_out_of_range",
            Self::SinkFailure { .. } => "sink_failure",
        }
    }

    /// Human-readable detail, without the code.
    pub fn detail(&self) -> String {
        match self {
            Self::MissingLocations { way_id, missing } => {
                format!("way {way_id} has {missing} node(s) without location")
            }
            Self::DegenerateWay { way_id } => {
                format!("way {way_id} has fewer than two nodes")
            }
            Self::RingNotClosed {
                start_node,
                end_node,
            } => format!("ring from node {start_node} to node {end_node} is not closed"),
            Self::DegenerateRing { way_id } => {
                format!("ring starting with way {way_id} has fewer than four positions")
            }
            Self::RoleMismatch {
                way_id,
                declared,
                actual,
            } => format!("way {way_id} has role '{declared}' but forms an {actual} ring"),
            Self::DuplicateWay { way_id } => format!("way {way_id} is a member more than once"),
            Self::NoRings => String::from("no closed ring could be built"),
            Self::IdOutOfRange => String::from("source id exceeds the area id range"),
            Self::SinkFailure { sink, message } => format!("{sink}: {message}"),
        }
    }
}

/// One defect tied to the entity it was found on.
///
/// # Examples
/// ```
/// use areasmith_core::{EntityKind, ProblemKind, ProblemRecord};
///
/// let problem = ProblemRecord::new(EntityKind::Relation, 4, ProblemKind::NoRings);
/// assert_eq!(
///     problem.to_string(),
///     "no_rings on relation 4: no closed ring could be built"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProblemRecord {
    /// Family of the source entity.
    pub origin: EntityKind,
    /// Id of the source entity.
    pub origin_id: i64,
    /// Cause of the problem.
    pub kind: ProblemKind,
}

impl ProblemRecord {
    /// Construct a problem record.
    pub const fn new(origin: EntityKind, origin_id: i64, kind: ProblemKind) -> Self {
        Self {
            origin,
            origin_id,
            kind,
        }
    }
}

impl fmt::Display for ProblemRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} {}: {}",
            self.kind.code(),
            self.origin,
            self.origin_id,
            self.kind.detail()
        )
    }
}

/// Destination for problem records.
pub trait ProblemReporter {
    /// Record one problem.
    fn report(&mut self, problem: &ProblemRecord) -> Result<(), SinkError>;

    /// Flush buffered output at the end of the run.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Forwards problems to the `log` facade at warning level.
///
/// Used when no explicit problem target was configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProblemReporter for LogReporter {
    fn report(&mut self, problem: &ProblemRecord) -> Result<(), SinkError> {
        warn!("{problem}");
        Ok(())
    }
}

/// Drops every problem; the fan-out still counts them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardReporter;

impl ProblemReporter for DiscardReporter {
    fn report(&mut self, _problem: &ProblemRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps every problem in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingReporter {
    problems: Vec<ProblemRecord>,
}

impl CollectingReporter {
    /// Problems recorded so far.
    pub fn problems(&self) -> &[ProblemRecord] {
        &self.problems
    }

    /// Take ownership of the recorded problems.
    pub fn into_problems(self) -> Vec<ProblemRecord> {
        self.problems
    }
}

impl ProblemReporter for CollectingReporter {
    fn report(&mut self, problem: &ProblemRecord) -> Result<(), SinkError> {
        self.problems.push(problem.clone());
        Ok(())
    }
}
