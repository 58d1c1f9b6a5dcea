//! Input and output adapters for area assembly.
//!
//! Responsibilities:
//! - Stream OSM PBF files as an [`areasmith_core::EntitySource`].
//! - Persist areas and problems to SQLite.
//! - Write text dumps and problem reports to files or standard output.
//!
//! Boundaries:
//! - Do not encode assembly rules (they live in `areasmith-core`).

mod dump;
mod pbf;
mod problems;
mod sqlite;
mod target;

pub use dump::DumpSink;
pub use pbf::{OsmReadError, PassCounts, PbfSource};
pub use problems::StreamProblemReporter;
pub use sqlite::{
    SqliteAreaSink, SqliteOutput, SqliteOutputError, SqliteProblemReporter, SqliteWriteError,
};
pub use target::{OutputTarget, SharedBuffer, TargetError, TargetSpec};
