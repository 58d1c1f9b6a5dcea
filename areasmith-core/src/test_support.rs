//! In-memory entity sources, sinks and builders used by unit and behaviour
//! tests.

use std::cell::RefCell;
use std::convert::Infallible;
use std::io;
use std::rc::Rc;

use geo::Coord;

use crate::area::{AreaId, AreaOrigin};
use crate::entity::{Entity, EntityKind, EntityMask, Member, Node, Relation, Tags, Way, collect_tags};
use crate::output::{AreaSink, CheckedArea, SinkError};
use crate::problem::{ProblemRecord, ProblemReporter};
use crate::source::EntitySource;

/// Replayable in-memory [`EntitySource`].
///
/// Entities are kept in file order (nodes, then ways, then relations, each
/// sorted by id) and every requested mask is recorded.
#[derive(Debug, Default)]
pub struct MemorySource {
    entities: Vec<Entity>,
    requested: RefCell<Vec<EntityMask>>,
}

impl MemorySource {
    /// Create a source from entities in any order.
    pub fn new(mut entities: Vec<Entity>) -> Self {
        entities.sort_by_key(|entity| (entity.kind(), entity.id()));
        Self {
            entities,
            requested: RefCell::new(Vec::new()),
        }
    }

    /// Masks requested so far, one per pass.
    pub fn requested_masks(&self) -> Vec<EntityMask> {
        self.requested.borrow().clone()
    }

    /// Whether any pass asked for `kind`.
    pub fn was_requested(&self, kind: EntityKind) -> bool {
        self.requested.borrow().iter().any(|mask| mask.contains(kind))
    }

    /// Drop every entity of `kind` with `id`, simulating a clipped extract.
    pub fn without(mut self, kind: EntityKind, id: i64) -> Self {
        self.entities
            .retain(|entity| entity.kind() != kind || entity.id() != id);
        self
    }
}

impl EntitySource for MemorySource {
    type Error = Infallible;

    fn for_each_entity(
        &self,
        mask: EntityMask,
        handler: &mut dyn FnMut(Entity),
    ) -> Result<(), Self::Error> {
        self.requested.borrow_mut().push(mask);
        self.entities
            .iter()
            .filter(|entity| mask.contains(entity.kind()))
            .for_each(|entity| handler(entity.clone()));
        Ok(())
    }
}

/// Source whose every pass fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSource;

impl EntitySource for FailingSource {
    type Error = io::Error;

    fn for_each_entity(
        &self,
        _mask: EntityMask,
        _handler: &mut dyn FnMut(Entity),
    ) -> Result<(), Self::Error> {
        Err(io::Error::other("stream unavailable"))
    }
}

/// Node entity at `(x, y)`.
pub fn node(id: i64, x: f64, y: f64) -> Entity {
    Entity::Node(Node {
        id,
        location: Some(Coord { x, y }),
    })
}

/// Way entity over `node_refs`.
pub fn way(id: i64, node_refs: &[i64], tags: &[(&str, &str)]) -> Entity {
    Entity::Way(Way {
        id,
        node_refs: node_refs.to_vec(),
        tags: collect_tags(tags.iter().copied()),
    })
}

/// Relation entity of `type=kind` with way members given as `(id, role)`.
pub fn relation(id: i64, kind: &str, ways: &[(i64, &str)], tags: &[(&str, &str)]) -> Entity {
    let mut all_tags = collect_tags(tags.iter().copied());
    all_tags.insert(String::from("type"), kind.to_owned());
    Entity::Relation(Relation {
        id,
        members: ways
            .iter()
            .map(|(way_id, role)| Member::new(*way_id, EntityKind::Way, *role))
            .collect(),
        tags: all_tags,
    })
}

/// Four nodes `first_node..first_node + 3` spanning the square
/// `[min, max]²`, followed by a closed way over them.
pub fn square_way(way_id: i64, first_node: i64, min: f64, max: f64, tags: &[(&str, &str)]) -> Vec<Entity> {
    let corners = [(min, min), (max, min), (max, max), (min, max)];
    let mut entities: Vec<Entity> = corners
        .iter()
        .zip(first_node..)
        .map(|((x, y), id)| node(id, *x, *y))
        .collect();
    let refs = [
        first_node,
        first_node + 1,
        first_node + 2,
        first_node + 3,
        first_node,
    ];
    entities.push(way(way_id, &refs, tags));
    entities
}

/// What a [`RecordingSink`] saw for one area.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedArea {
    pub id: AreaId,
    pub origin: AreaOrigin,
    pub original_id: i64,
    pub valid: Option<bool>,
    pub outer_rings: usize,
    pub inner_rings: usize,
    pub tags: Tags,
}

/// Shared handle onto recorded areas.
pub type Recorded = Rc<RefCell<Vec<RecordedArea>>>;

/// Sink recording a summary of every area it receives.
#[derive(Debug)]
pub struct RecordingSink {
    records: Recorded,
    persistent: bool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            records: Rc::default(),
            persistent: true,
        }
    }
}

impl RecordingSink {
    /// A non-persistent recorder, exempt from the invalid-only filter.
    pub fn transient() -> Self {
        Self {
            persistent: false,
            ..Self::default()
        }
    }

    /// Handle that stays readable after the sink moved into a fan-out.
    pub fn records(&self) -> Recorded {
        Rc::clone(&self.records)
    }
}

impl AreaSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_persistent(&self) -> bool {
        self.persistent
    }

    fn write(&mut self, checked: CheckedArea<'_>) -> Result<(), SinkError> {
        let area = checked.area;
        self.records.borrow_mut().push(RecordedArea {
            id: area.id(),
            origin: area.origin(),
            original_id: area.original_id(),
            valid: checked.valid,
            outer_rings: area.outer_ring_count(),
            inner_rings: area.inner_ring_count(),
            tags: area.tags().clone(),
        });
        Ok(())
    }
}

/// Problem reporter whose records stay readable after it moved.
#[derive(Debug, Default, Clone)]
pub struct SharedReporter {
    problems: Rc<RefCell<Vec<ProblemRecord>>>,
}

impl SharedReporter {
    /// Shared handle onto recorded problems.
    pub fn problems(&self) -> Rc<RefCell<Vec<ProblemRecord>>> {
        Rc::clone(&self.problems)
    }
}

impl ProblemReporter for SharedReporter {
    fn report(&mut self, problem: &ProblemRecord) -> Result<(), SinkError> {
        self.problems.borrow_mut().push(problem.clone());
        Ok(())
    }
}
