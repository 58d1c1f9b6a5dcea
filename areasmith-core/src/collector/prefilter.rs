//! First-pass relation scan.
//!
//! Keeps only area relations, records their eligible way members and builds
//! the reverse index from way id to the relations waiting for it.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::debug;

use crate::entity::{EntityKind, Relation, Tags};

use super::{AreaPredicate, MemberRole, ResolvedWay};

/// One eligible way member of a pending relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMember {
    pub way_id: i64,
    pub role: MemberRole,
}

/// An area relation waiting for its member ways.
#[derive(Debug, Clone)]
pub struct PendingRelation {
    id: i64,
    tags: Tags,
    members: Vec<PendingMember>,
    missing: usize,
    resolved: HashMap<i64, Rc<ResolvedWay>>,
}

impl PendingRelation {
    /// Relation id.
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// Relation tags.
    pub const fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Eligible way members in relation order.
    pub fn members(&self) -> &[PendingMember] {
        &self.members
    }

    /// Number of distinct member ways not seen yet.
    pub const fn missing(&self) -> usize {
        self.missing
    }

    /// Whether every member way has been seen.
    pub const fn is_ready(&self) -> bool {
        self.missing == 0
    }

    /// Cache a streamed member way. Returns `true` when this was the last
    /// missing member.
    pub(crate) fn resolve(&mut self, way: Rc<ResolvedWay>) -> bool {
        if self.missing == 0 || self.resolved.contains_key(&way.id) {
            return false;
        }
        if !self.members.iter().any(|member| member.way_id == way.id) {
            return false;
        }
        self.resolved.insert(way.id, way);
        self.missing -= 1;
        self.missing == 0
    }

    /// Hand the cached geometry over for assembly.
    pub(crate) fn into_ready(self) -> ReadyRelation {
        let Self {
            id,
            tags,
            members,
            resolved,
            ..
        } = self;
        let members = members
            .into_iter()
            .filter_map(|member| {
                resolved.get(&member.way_id).map(|way| ReadyMember {
                    role: member.role,
                    way: Rc::clone(way),
                })
            })
            .collect();
        ReadyRelation { id, tags, members }
    }
}

/// A member way with its resolved geometry.
#[derive(Debug, Clone)]
pub struct ReadyMember {
    pub role: MemberRole,
    pub way: Rc<ResolvedWay>,
}

/// A relation whose every member way has streamed past.
///
/// Members keep relation order; a way listed twice appears twice.
#[derive(Debug, Clone)]
pub struct ReadyRelation {
    pub id: i64,
    pub tags: Tags,
    pub members: Vec<ReadyMember>,
}

/// Counters kept by the [`RelationPrefilter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefilterStats {
    /// Relations inspected.
    pub relations_seen: u64,
    /// Relations retained for assembly.
    pub relations_retained: u64,
    /// Area relations without any eligible way member.
    pub relations_trivial: u64,
    /// Way members retained.
    pub member_ways: u64,
    /// Members dropped for being nodes, relations or carrying other roles.
    pub members_ignored: u64,
}

/// Output of the first pass and sole input contract of the second.
#[derive(Debug, Clone, Default)]
pub struct PendingRelations {
    pub(crate) relations: HashMap<i64, PendingRelation>,
    pub(crate) reverse: HashMap<i64, Vec<i64>>,
    trivial: Vec<i64>,
    stats: PrefilterStats,
}

impl PendingRelations {
    /// Number of relations still waiting for members.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Whether no relation is waiting.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Look up a pending relation.
    pub fn relation(&self, id: i64) -> Option<&PendingRelation> {
        self.relations.get(&id)
    }

    /// Relations waiting for `way_id`, in first-pass order.
    pub fn referencing(&self, way_id: i64) -> &[i64] {
        self.reverse.get(&way_id).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct ways still awaited.
    pub fn awaited_ways(&self) -> usize {
        self.reverse.len()
    }

    /// Area relations dropped because no member was an eligible way.
    pub fn trivial(&self) -> &[i64] {
        &self.trivial
    }

    /// Counters from the first pass.
    pub const fn stats(&self) -> &PrefilterStats {
        &self.stats
    }
}

/// Streams relations, retaining the ones that describe areas.
#[derive(Debug)]
pub struct RelationPrefilter<P> {
    predicate: P,
    pending: PendingRelations,
}

impl<P: AreaPredicate> RelationPrefilter<P> {
    /// Create a prefilter using `predicate` to select area relations.
    pub fn new(predicate: P) -> Self {
        Self {
            predicate,
            pending: PendingRelations::default(),
        }
    }

    /// Inspect one relation.
    pub fn handle(&mut self, relation: Relation) {
        let stats = &mut self.pending.stats;
        stats.relations_seen += 1;
        if !self.predicate.is_area_relation(&relation) {
            return;
        }

        let Relation { id, members, tags } = relation;
        let mut eligible = Vec::with_capacity(members.len());
        for member in members {
            let role = (member.kind == EntityKind::Way)
                .then(|| MemberRole::parse(&member.role))
                .flatten();
            match role {
                Some(role) => eligible.push(PendingMember {
                    way_id: member.id,
                    role,
                }),
                None => stats.members_ignored += 1,
            }
        }

        if eligible.is_empty() {
            debug!("Relation {id} has no eligible way members");
            stats.relations_trivial += 1;
            self.pending.trivial.push(id);
            return;
        }

        let mut distinct = HashSet::with_capacity(eligible.len());
        for member in &eligible {
            if distinct.insert(member.way_id) {
                self.pending
                    .reverse
                    .entry(member.way_id)
                    .or_default()
                    .push(id);
            }
        }
        stats.relations_retained += 1;
        stats.member_ways += eligible.len() as u64;
        self.pending.relations.insert(
            id,
            PendingRelation {
                id,
                tags,
                members: eligible,
                missing: distinct.len(),
                resolved: HashMap::new(),
            },
        );
    }

    /// Finish the pass, yielding the pending set and reverse index.
    pub fn finish(self) -> PendingRelations {
        self.pending
    }
}
