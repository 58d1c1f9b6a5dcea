//! Behavioural tests for the two-pass assembly pipeline.

use std::cell::RefCell;
use std::str::FromStr;

use areasmith_core::test_support::{
    MemorySource, RecordedArea, RecordingSink, SharedReporter, node, relation, square_way, way,
};
use areasmith_core::{
    AreaOrigin, Entity, EntityKind, FanOut, FanOutConfig, IndexStrategy, Pipeline, ProblemKind,
    ProblemRecord, RingAssembler, RunSummary,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

#[derive(Default)]
struct AssemblyWorld {
    entities: RefCell<Vec<Entity>>,
    missing_ways: RefCell<Vec<i64>>,
    summary: RefCell<Option<RunSummary>>,
    areas: RefCell<Vec<RecordedArea>>,
    problems: RefCell<Vec<ProblemRecord>>,
    nodes_requested: RefCell<Option<bool>>,
}

impl AssemblyWorld {
    fn run(&self, strategy: IndexStrategy, config: FanOutConfig) {
        let mut source = MemorySource::new(self.entities.borrow().clone());
        for way_id in self.missing_ways.borrow().iter() {
            source = source.without(EntityKind::Way, *way_id);
        }
        let sink = RecordingSink::default();
        let records = sink.records();
        let reporter = SharedReporter::default();
        let problems = reporter.problems();
        let fan_out = FanOut::new(config, Box::new(reporter)).with_sink(Box::new(sink));

        let summary = Pipeline::new(strategy)
            .run(&source, RingAssembler::default(), fan_out)
            .expect("pipeline run");

        self.summary.replace(Some(summary));
        self.areas.replace(records.borrow().clone());
        self.problems.replace(problems.borrow().clone());
        self.nodes_requested
            .replace(Some(source.was_requested(EntityKind::Node)));
    }

    fn areas_from(&self, origin: AreaOrigin, id: i64) -> Vec<RecordedArea> {
        self.areas
            .borrow()
            .iter()
            .filter(|area| area.origin == origin && area.original_id == id)
            .cloned()
            .collect()
    }
}

#[fixture]
fn world() -> AssemblyWorld {
    AssemblyWorld::default()
}

#[given("a multipolygon relation {id} with outer way {outer} and inner way {inner}")]
fn given_relation_with_hole(world: &AssemblyWorld, id: i64, outer: i64, inner: i64) {
    let mut entities = world.entities.borrow_mut();
    entities.extend(square_way(outer, 100, 0.0, 10.0, &[]));
    entities.extend(square_way(inner, 200, 2.0, 4.0, &[]));
    entities.push(relation(
        id,
        "multipolygon",
        &[(outer, "outer"), (inner, "inner")],
        &[("landuse", "meadow")],
    ));
}

#[given("a multipolygon relation {id} referencing the missing way {missing}")]
fn given_relation_with_missing_way(world: &AssemblyWorld, id: i64, missing: i64) {
    world
        .entities
        .borrow_mut()
        .extend(square_way(missing, 300, 0.0, 1.0, &[]));
    world.entities.borrow_mut().push(relation(
        id,
        "multipolygon",
        &[(missing, "outer")],
        &[("natural", "water")],
    ));
    world.missing_ways.borrow_mut().push(missing);
}

#[given("a closed way {id} tagged as a building")]
fn given_building_way(world: &AssemblyWorld, id: i64) {
    world
        .entities
        .borrow_mut()
        .extend(square_way(id, 400, 0.0, 1.0, &[("building", "yes")]));
}

#[given("a self-intersecting way {id} tagged as a building")]
fn given_bowtie_way(world: &AssemblyWorld, id: i64) {
    let mut entities = world.entities.borrow_mut();
    entities.extend([
        node(501, 0.0, 0.0),
        node(502, 1.0, 1.0),
        node(503, 1.0, 0.0),
        node(504, 0.0, 1.0),
    ]);
    entities.push(way(id, &[501, 502, 503, 504, 501], &[("building", "yes")]));
}

#[when("the pipeline runs with the {strategy} index")]
fn when_pipeline_runs(world: &AssemblyWorld, strategy: String) {
    let strategy = IndexStrategy::from_str(&strategy).expect("known strategy");
    world.run(strategy, FanOutConfig::default());
}

#[when("the pipeline runs keeping only invalid areas")]
fn when_pipeline_filters(world: &AssemblyWorld) {
    world.run(
        IndexStrategy::SparseMemMap,
        FanOutConfig {
            check: true,
            only_invalid: true,
        },
    );
}

#[then("one area comes from relation {id} with {outer} outer and {inner} inner ring")]
fn then_relation_area(world: &AssemblyWorld, id: i64, outer: usize, inner: usize) {
    let areas = world.areas_from(AreaOrigin::Relation, id);
    assert_eq!(areas.len(), 1, "expected one area, got {areas:?}");
    let area = areas.first().expect("area present");
    assert_eq!(area.outer_rings, outer);
    assert_eq!(area.inner_rings, inner);
}

#[then("no relation is incomplete")]
fn then_nothing_incomplete(world: &AssemblyWorld) {
    let summary = world.summary.borrow();
    let summary = summary.as_ref().expect("pipeline ran");
    assert!(summary.incomplete.is_empty());
}

#[then("relation {id} is reported incomplete")]
fn then_incomplete(world: &AssemblyWorld, id: i64) {
    let summary = world.summary.borrow();
    let summary = summary.as_ref().expect("pipeline ran");
    assert_eq!(summary.incomplete, vec![id]);
}

#[then("no area comes from relation {id}")]
fn then_no_relation_area(world: &AssemblyWorld, id: i64) {
    assert!(world.areas_from(AreaOrigin::Relation, id).is_empty());
}

#[then("exactly one area comes from way {id}")]
fn then_one_way_area(world: &AssemblyWorld, id: i64) {
    assert_eq!(world.areas_from(AreaOrigin::Way, id).len(), 1);
    assert_eq!(world.areas.borrow().len(), 1);
}

#[then("no area comes from way {id}")]
fn then_no_way_area(world: &AssemblyWorld, id: i64) {
    assert!(world.areas_from(AreaOrigin::Way, id).is_empty());
}

#[then("nodes are never requested")]
fn then_nodes_not_requested(world: &AssemblyWorld) {
    assert_eq!(*world.nodes_requested.borrow(), Some(false));
}

#[then("way {id} is reported with missing locations")]
fn then_missing_locations(world: &AssemblyWorld, id: i64) {
    let problems = world.problems.borrow();
    assert!(
        problems.iter().any(|problem| matches!(
            problem.kind,
            ProblemKind::MissingLocations { way_id, missing: 5 } if way_id == id
        )),
        "expected a missing location problem, got {problems:?}"
    );
}

#[then("only way {id} reaches the persistent sink")]
fn then_only_invalid_written(world: &AssemblyWorld, id: i64) {
    let areas = world.areas.borrow();
    assert_eq!(areas.len(), 1, "expected one persisted area, got {areas:?}");
    let area = areas.first().expect("area present");
    assert_eq!(area.original_id, id);
    assert_eq!(area.valid, Some(false));
}

#[then("the summary counts {areas} areas with {invalid} invalid")]
fn then_summary_counts(world: &AssemblyWorld, areas: u64, invalid: u64) {
    let summary = world.summary.borrow();
    let summary = summary.as_ref().expect("pipeline ran");
    assert_eq!(summary.output.areas, areas);
    assert_eq!(summary.output.invalid, invalid);
}

#[scenario(path = "tests/features/area_assembly.feature", index = 0)]
fn relation_with_inner_ring(world: AssemblyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/area_assembly.feature", index = 1)]
fn relation_with_missing_member(world: AssemblyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/area_assembly.feature", index = 2)]
fn standalone_area_way(world: AssemblyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/area_assembly.feature", index = 3)]
fn without_node_locations(world: AssemblyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/area_assembly.feature", index = 4)]
fn keeping_only_invalid_areas(world: AssemblyWorld) {
    let _ = world;
}
