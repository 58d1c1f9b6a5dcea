//! Dependency tracking and assembly triggering for the second pass.

use std::rc::Rc;

use log::debug;

use super::{AreaPredicate, PendingRelations, ReadyRelation, ResolvedWay};

/// Work handed to the assembler.
#[derive(Debug, Clone)]
pub enum AssemblyCandidate {
    /// A closed, area-tagged way.
    Way(Rc<ResolvedWay>),
    /// A relation whose last missing member just arrived.
    Relation(ReadyRelation),
}

/// Counters kept by the [`DependencyTracker`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Ways streamed through the tracker.
    pub ways_seen: u64,
    /// Ways cached because some relation referenced them.
    pub ways_cached: u64,
    /// Standalone ways dispatched as area candidates.
    pub way_candidates: u64,
    /// Relations dispatched once complete.
    pub relations_ready: u64,
}

/// Result of the second pass once the stream is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerOutcome {
    /// Relations still missing members, sorted by id.
    pub incomplete: Vec<i64>,
    /// Counters from the pass.
    pub stats: TrackerStats,
}

/// Caches member ways and promotes relations once every member was seen.
///
/// Dispatch order for a single way: the standalone way candidate first, then
/// the relations it completes in the order they were collected during the
/// first pass. Relations leave the tracker as soon as they are dispatched,
/// so only relations with unresolved members are retained.
#[derive(Debug)]
pub struct DependencyTracker<P> {
    pending: PendingRelations,
    predicate: P,
    way_areas: bool,
    stats: TrackerStats,
}

impl<P: AreaPredicate> DependencyTracker<P> {
    /// Track the relations collected by the first pass.
    ///
    /// `way_areas` enables dispatching standalone area ways.
    pub fn new(pending: PendingRelations, predicate: P, way_areas: bool) -> Self {
        Self {
            pending,
            predicate,
            way_areas,
            stats: TrackerStats::default(),
        }
    }

    /// Feed one resolved way, returning the candidates it makes ready.
    pub fn handle_way(&mut self, way: ResolvedWay) -> Vec<AssemblyCandidate> {
        self.stats.ways_seen += 1;
        let way = Rc::new(way);
        let mut candidates = Vec::new();

        if self.way_areas && self.predicate.is_area_way(&way) {
            self.stats.way_candidates += 1;
            candidates.push(AssemblyCandidate::Way(Rc::clone(&way)));
        }

        let Some(relation_ids) = self.pending.reverse.remove(&way.id) else {
            return candidates;
        };
        self.stats.ways_cached += 1;
        for relation_id in relation_ids {
            let Some(relation) = self.pending.relations.get_mut(&relation_id) else {
                continue;
            };
            if !relation.resolve(Rc::clone(&way)) {
                continue;
            }
            if let Some(ready) = self.pending.relations.remove(&relation_id) {
                debug!("Relation {relation_id} is complete after way {}", way.id);
                self.stats.relations_ready += 1;
                candidates.push(AssemblyCandidate::Relation(ready.into_ready()));
            }
        }
        candidates
    }

    /// Number of relations still waiting.
    pub fn pending_relations(&self) -> usize {
        self.pending.len()
    }

    /// Counters gathered so far.
    pub const fn stats(&self) -> &TrackerStats {
        &self.stats
    }

    /// End of stream: every relation still waiting is incomplete.
    pub fn finish(self) -> TrackerOutcome {
        let mut incomplete: Vec<i64> = self.pending.relations.into_keys().collect();
        incomplete.sort_unstable();
        TrackerOutcome {
            incomplete,
            stats: self.stats,
        }
    }
}
