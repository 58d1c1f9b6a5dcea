//! Behaviour-driven step definitions driving the create CLI scenarios.

use super::helpers::{DatasetFiles, LayerOverrides, merge_layers};
use super::*;
use areasmith_core::LocationIndexError;
use create::ARG_INPUT;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

/// Aggregates create CLI scenario state so each step only needs a single
/// world argument.
#[derive(Debug)]
struct CreateWorld {
    dataset_files: DatasetFiles,
    cli_args: RefCell<Vec<String>>,
    cli_result: RefCell<Option<Result<CreateConfig, CliError>>>,
    config_layer: RefCell<Option<LayerOverrides>>,
    env_layer: RefCell<Option<LayerOverrides>>,
}

impl CreateWorld {
    fn new() -> Self {
        Self {
            dataset_files: DatasetFiles::new(),
            cli_args: RefCell::new(Vec::new()),
            cli_result: RefCell::new(None),
            config_layer: RefCell::new(None),
            env_layer: RefCell::new(None),
        }
    }

    fn pass(&self, flags: &[&str]) {
        let mut args = self.cli_args.borrow_mut();
        args.push(self.dataset_files.input().to_string());
        args.extend(flags.iter().map(|flag| (*flag).to_owned()));
    }

    fn config(&self) -> CreateConfig {
        self.cli_result
            .borrow()
            .as_ref()
            .expect("result recorded")
            .as_ref()
            .expect("expected success")
            .clone()
    }
}

#[fixture]
fn world() -> CreateWorld {
    CreateWorld::new()
}

#[given("an input file exists on disk")]
fn input_exists(#[from(world)] world: &CreateWorld) {
    assert!(
        world.dataset_files.input().exists(),
        "expected the input file to exist on disk"
    );
}

#[given("I pass the input path with a dense file index and the only-invalid filter")]
fn cli_dense_only_invalid(#[from(world)] world: &CreateWorld) {
    world.pass(&["--index", "dense_file_array", "--only-invalid"]);
}

#[given("I pass the input path with an unknown index type")]
fn cli_unknown_index(#[from(world)] world: &CreateWorld) {
    world.pass(&["--index", "flex_mem"]);
}

#[given("I omit the input path")]
fn omit_input(#[from(world)] world: &CreateWorld) {
    world.cli_args.borrow_mut().clear();
    *world.config_layer.borrow_mut() = None;
    *world.env_layer.borrow_mut() = None;
}

#[given("the input path and index are provided via a config file")]
fn provided_via_config(#[from(world)] world: &CreateWorld) {
    *world.config_layer.borrow_mut() = Some(LayerOverrides {
        input: Some(world.dataset_files.config_input().to_path_buf()),
        index: Some(String::from("dense_mem_array")),
    });
}

#[given("the index is overridden via environment variables")]
fn index_overridden_by_env(#[from(world)] world: &CreateWorld) {
    *world.env_layer.borrow_mut() = Some(LayerOverrides {
        index: Some(String::from("none")),
        ..LayerOverrides::default()
    });
}

#[when("I configure the create command")]
fn configure_create(#[from(world)] world: &CreateWorld) {
    let mut invocation = vec![String::from("areasmith"), String::from("create")];
    invocation.extend(world.cli_args.borrow().iter().cloned());
    let file_layer = world.config_layer.borrow().clone();
    let env_layer = world.env_layer.borrow().clone();
    let outcome = Cli::try_parse_from(invocation)
        .map_err(CliError::ArgumentParsing)
        .and_then(|cli| match cli.command {
            Command::Create(args) => merge_layers(args, file_layer, env_layer),
            other => panic!("expected create, found {other:?}"),
        });
    world.cli_result.replace(Some(outcome));
}

#[then("the plan uses the dense_file_array index")]
fn plan_uses_dense_file_array(#[from(world)] world: &CreateWorld) {
    let config = world.config();
    assert_eq!(config.strategy, IndexStrategy::DenseFileArray);
    assert_eq!(config.input.as_path(), world.dataset_files.input());
}

#[then("validity checks are enabled")]
fn checks_enabled(#[from(world)] world: &CreateWorld) {
    assert!(world.config().fan_out.validates());
}

#[then("only invalid areas reach the database")]
fn only_invalid(#[from(world)] world: &CreateWorld) {
    assert!(world.config().fan_out.only_invalid);
}

#[then("the CLI reports that the \"input\" argument is missing")]
fn reports_missing_input(#[from(world)] world: &CreateWorld) {
    let borrowed = world.cli_result.borrow();
    let error = borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect_err("expected error");
    match error {
        CliError::MissingArgument { field, .. } => assert_eq!(*field, ARG_INPUT),
        other => panic!("unexpected error {other:?}"),
    }
}

#[then("the CLI reports an unknown index type")]
fn reports_unknown_index(#[from(world)] world: &CreateWorld) {
    let borrowed = world.cli_result.borrow();
    let error = borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect_err("expected error");
    match error {
        CliError::IndexType(LocationIndexError::UnknownStrategy { name, available }) => {
            assert_eq!(name, "flex_mem");
            assert!(available.contains("sparse_mem_map"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[then("the plan uses the config file input and the environment index")]
fn precedence_holds(#[from(world)] world: &CreateWorld) {
    let config = world.config();
    assert_eq!(config.input.as_path(), world.dataset_files.config_input());
    assert_eq!(config.strategy, IndexStrategy::None);
}

macro_rules! register_create_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/create_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: CreateWorld) {
            let _ = world;
        }
    };
}

register_create_scenario!(cli_flag_translation, "translating CLI flags into typed options");
register_create_scenario!(rejecting_missing_input, "rejecting a missing input");
register_create_scenario!(rejecting_unknown_index, "rejecting an unknown index type");
register_create_scenario!(
    layering_cli_config_env,
    "layering CLI, config file, and environment values"
);
