//! Two-pass relation collection.
//!
//! The first pass runs relations through the [`RelationPrefilter`]. The
//! second pass feeds nodes to the [`LocationResolver`], resolves each way and
//! hands it to the [`DependencyTracker`], which emits
//! [`AssemblyCandidate`]s as soon as they are complete.

mod audit;
mod predicate;
mod prefilter;
mod resolver;
mod tracker;

pub use audit::{AuditReport, RelationAudit, RelationIssue, RelationIssueKind};
pub use predicate::{AreaPredicate, MemberRole, TagAreaPredicate, carries_area_tags};
pub use prefilter::{
    PendingMember, PendingRelation, PendingRelations, PrefilterStats, ReadyMember, ReadyRelation,
    RelationPrefilter,
};
pub use resolver::{LocationResolver, ResolvedWay, ResolverStats};
pub use tracker::{AssemblyCandidate, DependencyTracker, TrackerOutcome, TrackerStats};
