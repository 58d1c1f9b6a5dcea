//! Two-pass driver tying the stages together.
//!
//! Pass one streams relations into the [`RelationPrefilter`]. Pass two
//! streams nodes and ways through an explicit [`SecondPass`] stage list:
//! location resolution, dependency tracking, assembly and output fan-out.
//! The first pass's [`PendingRelations`] are handed to the second pass by
//! value; no state outlives the [`Pipeline::run`] call.

use std::error::Error;
use std::fmt;

use log::{debug, info};
use thiserror::Error;

use crate::assembler::{Assembler, AssemblyStats};
use crate::collector::{
    AreaPredicate, AssemblyCandidate, AuditReport, DependencyTracker, LocationResolver,
    PendingRelations, PrefilterStats, RelationAudit, RelationPrefilter, ResolverStats,
    TagAreaPredicate, TrackerStats,
};
use crate::entity::{Entity, EntityMask};
use crate::location::{IndexStrategy, LocationIndex, LocationIndexError};
use crate::output::{FanOut, OutputStats, SinkError};
use crate::source::EntitySource;

/// Which pass of the run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Relation scan.
    Relations,
    /// Node and way scan.
    NodesAndWays,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relations => f.write_str("relation pass"),
            Self::NodesAndWays => f.write_str("node and way pass"),
        }
    }
}

/// Fatal errors aborting a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The entity source failed to open or decode.
    #[error("entity source failed during the {pass}")]
    Source {
        /// Pass that was streaming.
        pass: Pass,
        /// Source error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The location index could not be created or written.
    #[error(transparent)]
    LocationIndex(#[from] LocationIndexError),
    /// A sink or the problem reporter failed to finish.
    #[error("failed to finish area output")]
    FinishOutput(#[source] SinkError),
}

/// Everything a completed run reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// First-pass counters.
    pub prefilter: PrefilterStats,
    /// Area relations without eligible way members.
    pub trivial: Vec<i64>,
    /// Location resolution counters.
    pub resolver: ResolverStats,
    /// Dependency tracking counters.
    pub tracker: TrackerStats,
    /// Relations never completed, sorted by id.
    pub incomplete: Vec<i64>,
    /// Assembler counters.
    pub assembly: AssemblyStats,
    /// Fan-out counters.
    pub output: OutputStats,
    /// Estimated bytes used by the location index at the end of the run.
    pub index_memory: usize,
}

/// Result of the second pass before output is finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondPassOutcome {
    pub resolver: ResolverStats,
    pub tracker: TrackerStats,
    pub incomplete: Vec<i64>,
    pub index_memory: usize,
}

/// Per-entity stage list of the second pass.
pub struct SecondPass<'a, P, A: ?Sized> {
    resolver: LocationResolver,
    tracker: DependencyTracker<P>,
    assembler: &'a mut A,
    fan_out: &'a mut FanOut,
    error: Option<LocationIndexError>,
}

impl<'a, P: AreaPredicate, A: Assembler + ?Sized> SecondPass<'a, P, A> {
    /// Assemble the stages around an empty location index.
    pub fn new(
        index: Box<dyn LocationIndex>,
        tracker: DependencyTracker<P>,
        assembler: &'a mut A,
        fan_out: &'a mut FanOut,
    ) -> Self {
        Self {
            resolver: LocationResolver::new(index),
            tracker,
            assembler,
            fan_out,
            error: None,
        }
    }

    /// Run one entity through every stage.
    ///
    /// After a location index failure every further entity is ignored and
    /// the failure is returned by [`SecondPass::finish`].
    pub fn handle(&mut self, entity: Entity) {
        if self.error.is_some() {
            return;
        }
        let result = match entity {
            Entity::Node(node) => self.resolver.handle_node(&node),
            Entity::Way(way) => self.handle_way(way),
            Entity::Relation(_) => Ok(()),
        };
        if let Err(err) = result {
            self.error = Some(err);
        }
    }

    fn handle_way(&mut self, way: crate::entity::Way) -> Result<(), LocationIndexError> {
        let resolved = self.resolver.resolve_way(way)?;
        for candidate in self.tracker.handle_way(resolved) {
            let assembly = match &candidate {
                AssemblyCandidate::Way(way) => self.assembler.assemble_way(way),
                AssemblyCandidate::Relation(relation) => self.assembler.assemble_relation(relation),
            };
            self.fan_out.dispatch(assembly);
        }
        Ok(())
    }

    /// End of stream.
    pub fn finish(self) -> Result<SecondPassOutcome, LocationIndexError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let index_memory = self.resolver.index().used_memory();
        let resolver = self.resolver.stats().clone();
        let outcome = self.tracker.finish();
        Ok(SecondPassOutcome {
            resolver,
            tracker: outcome.stats,
            incomplete: outcome.incomplete,
            index_memory,
        })
    }
}

impl<P, A: ?Sized> fmt::Debug for SecondPass<'_, P, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondPass")
            .field("resolver", &self.resolver)
            .field("fan_out", &self.fan_out)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Two-pass area assembly over a replayable entity source.
///
/// # Examples
/// ```
/// use areasmith_core::test_support::{MemorySource, square_way};
/// use areasmith_core::{
///     CollectingReporter, FanOut, FanOutConfig, IndexStrategy, Pipeline, RingAssembler,
/// };
///
/// let source = MemorySource::new(square_way(4, 100, 0.0, 1.0, &[("building", "yes")]));
/// let fan_out = FanOut::new(FanOutConfig::default(), Box::new(CollectingReporter::default()));
/// let summary = Pipeline::new(IndexStrategy::SparseMemMap)
///     .run(&source, RingAssembler::default(), fan_out)
///     .unwrap();
/// assert_eq!(summary.output.areas, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline<P = TagAreaPredicate> {
    strategy: IndexStrategy,
    predicate: P,
    way_areas: bool,
}

impl Pipeline<TagAreaPredicate> {
    /// Pipeline using `strategy` and the default tag predicate.
    pub fn new(strategy: IndexStrategy) -> Self {
        Self {
            strategy,
            predicate: TagAreaPredicate,
            way_areas: true,
        }
    }
}

impl<P: AreaPredicate + Clone> Pipeline<P> {
    /// Replace the area predicate.
    pub fn with_predicate<Q: AreaPredicate + Clone>(self, predicate: Q) -> Pipeline<Q> {
        Pipeline {
            strategy: self.strategy,
            predicate,
            way_areas: self.way_areas,
        }
    }

    /// Enable or disable standalone way candidates.
    #[must_use]
    pub fn with_way_areas(mut self, way_areas: bool) -> Self {
        self.way_areas = way_areas;
        self
    }

    /// Selected location index strategy.
    pub const fn strategy(&self) -> IndexStrategy {
        self.strategy
    }

    /// Stream relations and collect the pending set.
    pub fn first_pass<S: EntitySource>(
        &self,
        source: &S,
    ) -> Result<PendingRelations, PipelineError> {
        let mut prefilter = RelationPrefilter::new(self.predicate.clone());
        source
            .for_each_entity(EntityMask::RELATIONS, &mut |entity| {
                if let Entity::Relation(relation) = entity {
                    prefilter.handle(relation);
                }
            })
            .map_err(|source| PipelineError::Source {
                pass: Pass::Relations,
                source: Box::new(source),
            })?;
        Ok(prefilter.finish())
    }

    /// Stream nodes and ways, assembling areas as soon as they are complete.
    pub fn second_pass<S: EntitySource, A: Assembler + ?Sized>(
        &self,
        source: &S,
        pending: PendingRelations,
        index: Box<dyn LocationIndex>,
        assembler: &mut A,
        fan_out: &mut FanOut,
    ) -> Result<SecondPassOutcome, PipelineError> {
        let tracker = DependencyTracker::new(pending, self.predicate.clone(), self.way_areas);
        let mut stage = SecondPass::new(index, tracker, assembler, fan_out);
        let mask = self.strategy.second_pass_mask();
        debug!("Second pass requests {mask}");
        source
            .for_each_entity(mask, &mut |entity| stage.handle(entity))
            .map_err(|source| PipelineError::Source {
                pass: Pass::NodesAndWays,
                source: Box::new(source),
            })?;
        Ok(stage.finish()?)
    }

    /// Run both passes and finish the output.
    ///
    /// The location index is created before the first pass so an unusable
    /// strategy fails before any input is read.
    pub fn run<S: EntitySource, A: Assembler>(
        &self,
        source: &S,
        mut assembler: A,
        mut fan_out: FanOut,
    ) -> Result<RunSummary, PipelineError> {
        let index = self.strategy.build()?;

        info!("Reading relations");
        let pending = self.first_pass(source)?;
        let prefilter = pending.stats().clone();
        let trivial = pending.trivial().to_vec();
        info!(
            "Collected {} area relation(s) waiting for {} way(s)",
            pending.len(),
            pending.awaited_ways()
        );

        info!("Reading nodes and ways ({} index)", self.strategy);
        let outcome = self.second_pass(source, pending, index, &mut assembler, &mut fan_out)?;
        let assembly = assembler.stats().clone();
        let output = fan_out.finish().map_err(PipelineError::FinishOutput)?;

        Ok(RunSummary {
            prefilter,
            trivial,
            resolver: outcome.resolver,
            tracker: outcome.tracker,
            incomplete: outcome.incomplete,
            assembly,
            output,
            index_memory: outcome.index_memory,
        })
    }
}

/// Stream relations only and report structural issues of area relations.
///
/// # Examples
/// ```
/// use areasmith_core::audit_relations;
/// use areasmith_core::test_support::{MemorySource, relation};
///
/// let source = MemorySource::new(vec![relation(5, "multipolygon", &[(1, "outre")], &[])]);
/// let report = audit_relations(&source).unwrap();
/// assert_eq!(report.issues[0].to_string(), "r5 wrong role 'outre'");
/// ```
pub fn audit_relations<S: EntitySource>(source: &S) -> Result<AuditReport, PipelineError> {
    let mut audit = RelationAudit::default();
    source
        .for_each_entity(EntityMask::RELATIONS, &mut |entity| {
            if let Entity::Relation(relation) = entity {
                audit.handle(&relation);
            }
        })
        .map_err(|source| PipelineError::Source {
            pass: Pass::Relations,
            source: Box::new(source),
        })?;
    let report = audit.finish();
    info!(
        "Checked {} area relation(s), found {} issue(s)",
        report.relations_checked,
        report.issues.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{AssemblerConfig, CollectOnlyAssembler, RingAssembler};
    use crate::output::FanOutConfig;
    use crate::problem::CollectingReporter;
    use crate::entity::EntityKind;
    use crate::problem::{ProblemKind, ProblemRecord};
    use crate::test_support::{
        FailingSource, MemorySource, RecordingSink, SharedReporter, node, relation, square_way,
        way,
    };
    use rstest::rstest;

    fn fan_out() -> FanOut {
        FanOut::new(FanOutConfig::default(), Box::new(CollectingReporter::default()))
    }

    #[rstest]
    fn collect_only_mode_counts_relations_without_output() {
        let mut entities = square_way(10, 100, 0.0, 1.0, &[]);
        entities.push(relation(1, "multipolygon", &[(10, "outer")], &[]));
        let source = MemorySource::new(entities);

        let summary = Pipeline::new(IndexStrategy::SparseMemMap)
            .run(&source, CollectOnlyAssembler::default(), fan_out())
            .expect("run");

        assert_eq!(summary.assembly.relations_collected, 1);
        assert_eq!(summary.output.areas, 0);
        assert!(summary.incomplete.is_empty());
    }

    #[rstest]
    fn passes_request_the_expected_masks() {
        let source = MemorySource::new(Vec::new());
        Pipeline::new(IndexStrategy::DenseMemArray)
            .run(&source, RingAssembler::default(), fan_out())
            .expect("run");
        assert_eq!(
            source.requested_masks(),
            vec![EntityMask::RELATIONS, EntityMask::NODES | EntityMask::WAYS]
        );
    }

    #[rstest]
    fn source_failures_name_the_pass() {
        let err = Pipeline::new(IndexStrategy::SparseMemMap)
            .run(&FailingSource, RingAssembler::default(), fan_out())
            .expect_err("source fails");
        assert!(matches!(
            err,
            PipelineError::Source {
                pass: Pass::Relations,
                ..
            }
        ));
    }

    #[rstest]
    fn unaddressable_nodes_become_missing_locations() {
        let far = (1_i64 << 36) + 5;
        let mut entities = square_way(10, 100, 0.0, 1.0, &[("building", "yes")]);
        entities.push(node(far, 0.5, 0.5));
        entities.push(way(11, &[far, 100, 101, 102, far], &[("building", "yes")]));
        let source = MemorySource::new(entities);
        let reporter = SharedReporter::default();
        let problems = reporter.problems();
        let sink = RecordingSink::default();
        let records = sink.records();

        let summary = Pipeline::new(IndexStrategy::DenseMemArray)
            .run(
                &source,
                RingAssembler::default(),
                FanOut::new(FanOutConfig::default(), Box::new(reporter)).with_sink(Box::new(sink)),
            )
            .expect("out-of-range ids never abort the run");

        let produced: Vec<i64> = records.borrow().iter().map(|area| area.original_id).collect();
        assert_eq!(produced, vec![10]);
        assert_eq!(summary.resolver.nodes_rejected, 1);
        assert_eq!(
            *problems.borrow(),
            vec![ProblemRecord::new(
                EntityKind::Way,
                11,
                ProblemKind::MissingLocations {
                    way_id: 11,
                    missing: 2
                }
            )]
        );
    }

    #[rstest]
    fn way_areas_can_be_disabled_in_the_tracker() {
        let source = MemorySource::new(square_way(10, 100, 0.0, 1.0, &[("building", "yes")]));
        let sink = RecordingSink::default();
        let records = sink.records();
        let summary = Pipeline::new(IndexStrategy::SparseMemMap)
            .with_way_areas(false)
            .run(
                &source,
                RingAssembler::new(AssemblerConfig::default()),
                fan_out().with_sink(Box::new(sink)),
            )
            .expect("run");
        assert!(records.borrow().is_empty());
        assert_eq!(summary.tracker.way_candidates, 0);
    }

    #[rstest]
    fn audit_reads_relations_only() {
        let mut entities = square_way(10, 100, 0.0, 1.0, &[]);
        entities.push(relation(1, "multipolygon", &[(10, "outer"), (11, "edge")], &[]));
        entities.push(relation(2, "route", &[(10, "forward")], &[]));
        let source = MemorySource::new(entities);

        let report = audit_relations(&source).expect("audit");

        assert_eq!(report.relations_checked, 1);
        let issues: Vec<String> = report.issues.iter().map(ToString::to_string).collect();
        assert_eq!(issues, vec![String::from("r1 wrong role 'edge'")]);
        assert_eq!(source.requested_masks(), vec![EntityMask::RELATIONS]);
    }

    #[rstest]
    fn audit_propagates_source_failures() {
        let err = audit_relations(&FailingSource).expect_err("failing source");
        assert!(matches!(
            err,
            PipelineError::Source {
                pass: Pass::Relations,
                ..
            }
        ));
    }
}
