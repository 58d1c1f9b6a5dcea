//! Core domain for streaming area assembly.
//!
//! Areas are polygons assembled from closed ways and from multipolygon or
//! boundary relations. The input is streamed twice through an
//! [`EntitySource`]: first relations, then nodes and ways. Relations are
//! assembled as soon as their last member way streams past, so only
//! relations still waiting for members are held in memory.
//!
//! Per-entity defects never abort a run; they become [`ProblemRecord`]s or
//! entries in the incomplete-relation list of the [`RunSummary`].

pub mod area;
pub mod assembler;
pub mod collector;
pub mod entity;
pub mod failed;
pub mod location;
pub mod output;
pub mod pipeline;
pub mod problem;
pub mod source;
pub mod test_support;

pub use area::{Area, AreaId, AreaOrigin};
pub use assembler::{
    Assembler, AssemblerConfig, Assembly, AssemblyStats, CollectOnlyAssembler, RingAssembler,
};
pub use collector::{
    AreaPredicate, AssemblyCandidate, AuditReport, DependencyTracker, LocationResolver, MemberRole,
    PendingRelation, PendingRelations, PrefilterStats, ReadyMember, ReadyRelation, RelationAudit,
    RelationIssue, RelationIssueKind, RelationPrefilter, ResolvedWay, ResolverStats,
    TagAreaPredicate, TrackerOutcome, TrackerStats,
};
pub use entity::{Entity, EntityKind, EntityMask, Member, Node, Relation, Tags, Way, collect_tags};
pub use failed::{FailedTagCounts, FailedTagSink};
pub use location::{
    DenseFileArray, DenseMemArray, IndexStrategy, LocationIndex, LocationIndexError, NoLocations,
    SparseMemMap,
};
pub use output::{AreaSink, CheckedArea, CountingSink, FanOut, FanOutConfig, OutputStats, SinkError};
pub use pipeline::{
    Pass, Pipeline, PipelineError, RunSummary, SecondPass, SecondPassOutcome,
    audit_relations,
};
pub use problem::{
    CollectingReporter, DiscardReporter, LogReporter, ProblemKind, ProblemRecord, ProblemReporter,
};
pub use source::EntitySource;
