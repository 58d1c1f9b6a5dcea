//! SQLite persistence for assembled areas and problem records.
//!
//! One database holds an `areas` table and a `problems` table. The whole run
//! is a single transaction which is committed when the first of the sink or
//! the reporter finishes; dropping the output without finishing rolls back.
#![forbid(unsafe_code)]

use std::cell::Cell;
use std::rc::Rc;

use areasmith_core::{AreaSink, CheckedArea, ProblemRecord, ProblemReporter, SinkError};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use rusqlite::{Connection, Error as SqliteError};
use thiserror::Error;

const SCHEMA: &str = "
CREATE TABLE areas (
    id INTEGER PRIMARY KEY,
    valid INTEGER NULL,
    source TEXT NOT NULL CHECK (source IN ('w', 'r')),
    orig_id INTEGER NOT NULL,
    tags TEXT NOT NULL,
    geometry TEXT NOT NULL
);
CREATE TABLE problems (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    object_type TEXT,
    object_id INTEGER,
    problem TEXT,
    detail TEXT
);
";

/// Errors raised while preparing or committing the output database.
#[derive(Debug, Error)]
pub enum SqliteOutputError {
    /// The database exists and overwriting was not requested.
    #[error("output database {path} already exists")]
    AlreadyExists {
        /// Destination database path.
        path: Utf8PathBuf,
    },
    /// Removing a previous database failed.
    #[error("failed to remove existing database {path}")]
    Overwrite {
        /// Destination database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Creating the parent directory failed.
    #[error("failed to create parent directory for {path}")]
    CreateDirectory {
        /// Destination database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}")]
    Open {
        /// Destination database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Creating the tables failed.
    #[error("failed to create output schema")]
    CreateSchema {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Beginning the run transaction failed.
    #[error("failed to begin output transaction")]
    BeginTransaction {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Committing the run transaction failed.
    #[error("failed to commit output transaction")]
    Commit {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// Errors raised while writing one row.
#[derive(Debug, Error)]
pub enum SqliteWriteError {
    /// Serializing tags or geometry to JSON failed.
    #[error("failed to serialize {what} for area {area_id}")]
    Serialize {
        /// Which column was being serialized.
        what: &'static str,
        /// Area being written.
        area_id: i64,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// The insert statement failed.
    #[error("failed to insert row")]
    Insert {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

#[derive(Debug)]
struct Shared {
    path: Utf8PathBuf,
    connection: Connection,
    committed: Cell<bool>,
    rows: Cell<u64>,
    problems: Cell<u64>,
}

impl Shared {
    fn commit_once(&self) -> Result<(), SqliteOutputError> {
        if self.committed.replace(true) {
            return Ok(());
        }
        self.connection
            .execute_batch("COMMIT")
            .map_err(|source| SqliteOutputError::Commit { source })?;
        info!(
            "Committed {} areas and {} problems to {}",
            self.rows.get(),
            self.problems.get(),
            self.path
        );
        Ok(())
    }
}

/// An open output database with its transaction already started.
///
/// # Examples
/// ```no_run
/// use areasmith_data::SqliteOutput;
/// use camino::Utf8Path;
///
/// # fn main() -> Result<(), areasmith_data::SqliteOutputError> {
/// let output = SqliteOutput::create(Utf8Path::new("areas.db"), true)?;
/// let sink = output.area_sink();
/// let reporter = output.problem_reporter();
/// # let _ = (sink, reporter);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteOutput {
    shared: Rc<Shared>,
}

impl SqliteOutput {
    /// Create the database at `path`, creating parent directories.
    ///
    /// An existing file is removed when `overwrite` is set and rejected
    /// otherwise.
    pub fn create(path: &Utf8Path, overwrite: bool) -> Result<Self, SqliteOutputError> {
        if overwrite {
            let removed = areasmith_fs::remove_file_if_exists(path).map_err(|source| {
                SqliteOutputError::Overwrite {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            if removed {
                debug!("Removed previous database {path}");
            }
        } else if areasmith_fs::file_is_file(path).unwrap_or(false) {
            return Err(SqliteOutputError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        areasmith_fs::ensure_parent_dir(path).map_err(|source| {
            SqliteOutputError::CreateDirectory {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let connection =
            Connection::open(path.as_std_path()).map_err(|source| SqliteOutputError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        connection
            .pragma_update(None, "synchronous", "OFF")
            .map_err(|source| SqliteOutputError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        connection
            .execute_batch("BEGIN")
            .map_err(|source| SqliteOutputError::BeginTransaction { source })?;
        connection
            .execute_batch(SCHEMA)
            .map_err(|source| SqliteOutputError::CreateSchema { source })?;

        Ok(Self {
            shared: Rc::new(Shared {
                path: path.to_path_buf(),
                connection,
                committed: Cell::new(false),
                rows: Cell::new(0),
                problems: Cell::new(0),
            }),
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Utf8Path {
        &self.shared.path
    }

    /// Sink writing rows into `areas`.
    pub fn area_sink(&self) -> SqliteAreaSink {
        SqliteAreaSink {
            shared: Rc::clone(&self.shared),
        }
    }

    /// Reporter writing rows into `problems`.
    pub fn problem_reporter(&self) -> SqliteProblemReporter {
        SqliteProblemReporter {
            shared: Rc::clone(&self.shared),
        }
    }

    /// Commit the run transaction unless a sink already did.
    pub fn commit(&self) -> Result<(), SqliteOutputError> {
        self.shared.commit_once()
    }
}

/// [`AreaSink`] persisting areas as JSON-encoded rows.
#[derive(Debug)]
pub struct SqliteAreaSink {
    shared: Rc<Shared>,
}

impl SqliteAreaSink {
    fn insert(&self, checked: CheckedArea<'_>) -> Result<(), SqliteWriteError> {
        let area = checked.area;
        let area_id = area.id().get();
        let tags = serde_json::to_string(area.tags()).map_err(|source| {
            SqliteWriteError::Serialize {
                what: "tags",
                area_id,
                source,
            }
        })?;
        let geometry = serde_json::to_string(area.geometry()).map_err(|source| {
            SqliteWriteError::Serialize {
                what: "geometry",
                area_id,
                source,
            }
        })?;
        let mut statement = self
            .shared
            .connection
            .prepare_cached(
                "INSERT INTO areas (id, valid, source, orig_id, tags, geometry)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(|source| SqliteWriteError::Insert { source })?;
        statement
            .execute((
                area_id,
                checked.valid,
                area.origin().as_char().to_string(),
                area.original_id(),
                tags,
                geometry,
            ))
            .map_err(|source| SqliteWriteError::Insert { source })?;
        self.shared.rows.set(self.shared.rows.get() + 1);
        Ok(())
    }
}

impl AreaSink for SqliteAreaSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn write(&mut self, area: CheckedArea<'_>) -> Result<(), SinkError> {
        self.insert(area)
            .map_err(|err| SinkError::new(self.name(), err))
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.shared
            .commit_once()
            .map_err(|err| SinkError::new(self.name(), err))
    }
}

/// [`ProblemReporter`] writing into the `problems` table.
#[derive(Debug)]
pub struct SqliteProblemReporter {
    shared: Rc<Shared>,
}

impl SqliteProblemReporter {
    fn insert(&self, problem: &ProblemRecord) -> Result<(), SqliteWriteError> {
        let mut statement = self
            .shared
            .connection
            .prepare_cached(
                "INSERT INTO problems (object_type, object_id, problem, detail)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(|source| SqliteWriteError::Insert { source })?;
        statement
            .execute((
                problem.origin.to_string(),
                problem.origin_id,
                problem.kind.code(),
                problem.kind.detail(),
            ))
            .map_err(|source| SqliteWriteError::Insert { source })?;
        self.shared.problems.set(self.shared.problems.get() + 1);
        Ok(())
    }
}

impl ProblemReporter for SqliteProblemReporter {
    fn report(&mut self, problem: &ProblemRecord) -> Result<(), SinkError> {
        self.insert(problem)
            .map_err(|err| SinkError::new("sqlite problems", err))
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.shared
            .commit_once()
            .map_err(|err| SinkError::new("sqlite problems", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use areasmith_core::{Area, AreaId, AreaOrigin, EntityKind, ProblemKind, Tags};
    use geo::{MultiPolygon, polygon};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn temp_dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    fn db_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("utf-8 path")
    }

    fn square_area(origin: AreaOrigin, source_id: i64) -> Area {
        let id = AreaId::encode(origin, source_id).expect("id");
        let tags = Tags::from([("building".into(), "yes".into())]);
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        Area::new(id, tags, MultiPolygon::new(vec![square]))
    }

    fn count(path: &Utf8Path, table: &str) -> i64 {
        let conn = Connection::open(path.as_std_path()).expect("open database");
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .expect("count rows")
    }

    #[rstest]
    fn persists_areas_and_problems(temp_dir: TempDir) {
        let path = db_path(&temp_dir, "areas.db");
        let output = SqliteOutput::create(&path, false).expect("create output");
        let mut sink = output.area_sink();
        let mut reporter = output.problem_reporter();
        let area = square_area(AreaOrigin::Relation, 8);

        sink.write(CheckedArea {
            area: &area,
            valid: Some(true),
        })
        .expect("write area");
        reporter
            .report(&ProblemRecord::new(EntityKind::Relation, 9, ProblemKind::NoRings))
            .expect("write problem");
        sink.finish().expect("commit");
        reporter.finish().expect("second finish is a no-op");
        drop((sink, reporter, output));

        let conn = Connection::open(path.as_std_path()).expect("open database");
        let row: (i64, Option<bool>, String, i64, String) = conn
            .query_row(
                "SELECT id, valid, source, orig_id, tags FROM areas",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .expect("read area");
        assert_eq!(row, (17, Some(true), "r".into(), 8, r#"{"building":"yes"}"#.into()));

        let problem: (String, i64, String) = conn
            .query_row(
                "SELECT object_type, object_id, problem FROM problems",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .expect("read problem");
        assert_eq!(problem, ("relation".into(), 9, "no_rings".into()));
    }

    #[rstest]
    fn unchecked_validity_is_null(temp_dir: TempDir) {
        let path = db_path(&temp_dir, "areas.db");
        let output = SqliteOutput::create(&path, false).expect("create output");
        let mut sink = output.area_sink();
        let area = square_area(AreaOrigin::Way, 3);
        sink.write(CheckedArea {
            area: &area,
            valid: None,
        })
        .expect("write area");
        output.commit().expect("commit");
        drop((sink, output));

        let conn = Connection::open(path.as_std_path()).expect("open database");
        let valid: Option<i64> = conn
            .query_row("SELECT valid FROM areas WHERE id = 6", [], |row| row.get(0))
            .expect("read validity");
        assert_eq!(valid, None);
    }

    #[rstest]
    fn geometry_round_trips_through_json(temp_dir: TempDir) {
        let path = db_path(&temp_dir, "areas.db");
        let output = SqliteOutput::create(&path, false).expect("create output");
        let mut sink = output.area_sink();
        let area = square_area(AreaOrigin::Way, 5);
        sink.write(CheckedArea {
            area: &area,
            valid: None,
        })
        .expect("write area");
        sink.finish().expect("commit");
        drop((sink, output));

        let conn = Connection::open(path.as_std_path()).expect("open database");
        let json: String = conn
            .query_row("SELECT geometry FROM areas", [], |row| row.get(0))
            .expect("read geometry");
        let geometry: MultiPolygon<f64> = serde_json::from_str(&json).expect("decode geometry");
        assert_eq!(&geometry, area.geometry());
    }

    #[rstest]
    fn dropping_without_finish_rolls_back(temp_dir: TempDir) {
        let path = db_path(&temp_dir, "areas.db");
        let output = SqliteOutput::create(&path, false).expect("create output");
        let mut sink = output.area_sink();
        let area = square_area(AreaOrigin::Way, 1);
        sink.write(CheckedArea {
            area: &area,
            valid: None,
        })
        .expect("write area");
        drop((sink, output));

        let conn = Connection::open(path.as_std_path()).expect("open database");
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'areas'",
                [],
                |row| row.get(0),
            )
            .expect("inspect schema");
        assert_eq!(tables, 0, "schema creation should have rolled back");
    }

    #[rstest]
    fn duplicate_area_ids_fail_per_row(temp_dir: TempDir) {
        let path = db_path(&temp_dir, "areas.db");
        let output = SqliteOutput::create(&path, false).expect("create output");
        let mut sink = output.area_sink();
        let area = square_area(AreaOrigin::Way, 1);
        let checked = CheckedArea {
            area: &area,
            valid: None,
        };
        sink.write(checked).expect("first write");
        let err = sink.write(checked).expect_err("duplicate id");
        assert_eq!(err.sink, "sqlite");
        sink.finish().expect("commit");
        drop((sink, output));
        assert_eq!(count(&path, "areas"), 1);
    }

    #[rstest]
    #[case(false, true)]
    #[case(true, false)]
    fn existing_database_requires_overwrite(
        temp_dir: TempDir,
        #[case] overwrite: bool,
        #[case] rejected: bool,
    ) {
        let path = db_path(&temp_dir, "areas.db");
        let first = SqliteOutput::create(&path, false).expect("create output");
        first.commit().expect("commit");
        drop(first);

        let outcome = SqliteOutput::create(&path, overwrite);
        assert_eq!(
            matches!(outcome, Err(SqliteOutputError::AlreadyExists { .. })),
            rejected
        );
        if let Ok(output) = outcome {
            output.commit().expect("commit");
            drop(output);
            assert_eq!(count(&path, "areas"), 0);
        }
    }

    #[rstest]
    fn creates_parent_directory(temp_dir: TempDir) {
        let path = db_path(&temp_dir, "nested/out/areas.db");
        let output = SqliteOutput::create(&path, false).expect("create nested output");
        output.commit().expect("commit");
        assert!(path.exists(), "database should be created at nested path");
    }
}
