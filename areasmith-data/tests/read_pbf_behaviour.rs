//! Behavioural tests for PBF input errors.

use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;

use areasmith_core::{EntityMask, EntitySource};
use areasmith_data::{OsmReadError, PbfSource};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::{NamedTempFile, TempDir};

enum InputTarget {
    Existing(NamedTempFile),
    Missing(TempDir, PathBuf),
}

impl InputTarget {
    fn path(&self) -> PathBuf {
        match self {
            Self::Existing(file) => file.path().to_path_buf(),
            Self::Missing(_, path) => path.clone(),
        }
    }
}

#[fixture]
fn input() -> RefCell<Option<InputTarget>> {
    RefCell::new(None)
}

#[fixture]
fn outcome() -> RefCell<Option<Result<usize, OsmReadError>>> {
    RefCell::new(None)
}

#[given("a path to a missing PBF file")]
fn missing_file(#[from(input)] input: &RefCell<Option<InputTarget>>) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("missing.osm.pbf");
    *input.borrow_mut() = Some(InputTarget::Missing(dir, path));
}

#[given("a file containing invalid PBF data")]
fn invalid_file(#[from(input)] input: &RefCell<Option<InputTarget>>) {
    let mut file = tempfile::Builder::new()
        .prefix("invalid")
        .suffix(".osm.pbf")
        .tempfile()
        .expect("create temp file");
    file.write_all(&[0, 0, 0, 16, 0xff, 0xfe, 0xfd, 0xfc, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12])
        .expect("write invalid data");
    file.flush().expect("flush invalid data");
    *input.borrow_mut() = Some(InputTarget::Existing(file));
}

#[when("the relations are streamed")]
fn stream_relations(
    #[from(input)] input: &RefCell<Option<InputTarget>>,
    #[from(outcome)] outcome: &RefCell<Option<Result<usize, OsmReadError>>>,
) {
    let path = input.borrow().as_ref().expect("input prepared").path();
    let source = PbfSource::new(path);
    let mut relations = 0;
    let result = source
        .for_each_entity(EntityMask::RELATIONS, &mut |_| relations += 1)
        .map(|()| relations);
    *outcome.borrow_mut() = Some(result);
}

#[then("an open error is returned")]
fn open_error(#[from(outcome)] outcome: &RefCell<Option<Result<usize, OsmReadError>>>) {
    let borrowed = outcome.borrow();
    match borrowed.as_ref().expect("streaming was attempted") {
        Err(OsmReadError::Open { path, .. }) => {
            assert!(path.ends_with("missing.osm.pbf"), "unexpected path in error: {path:?}");
        }
        other => panic!("expected an open error, got {other:?}"),
    }
}

#[then("a decode error is returned")]
fn decode_error(#[from(outcome)] outcome: &RefCell<Option<Result<usize, OsmReadError>>>) {
    let borrowed = outcome.borrow();
    match borrowed.as_ref().expect("streaming was attempted") {
        Err(OsmReadError::Decode { source, path }) => {
            let extension = path.extension().and_then(|ext| ext.to_str());
            assert_eq!(extension, Some("pbf"), "unexpected path in error: {path:?}");
            assert!(!source.to_string().is_empty());
        }
        other => panic!("expected a decode error, got {other:?}"),
    }
}

#[scenario(path = "tests/features/read_pbf.feature", index = 0)]
fn reporting_missing_files(
    input: RefCell<Option<InputTarget>>,
    outcome: RefCell<Option<Result<usize, OsmReadError>>>,
) {
    let _ = (input, outcome);
}

#[scenario(path = "tests/features/read_pbf.feature", index = 1)]
fn rejecting_invalid_payloads(
    input: RefCell<Option<InputTarget>>,
    outcome: RefCell<Option<Result<usize, OsmReadError>>>,
) {
    let _ = (input, outcome);
}
