//! Error types emitted by the areasmith CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>`.

use std::sync::Arc;

use areasmith_core::{LocationIndexError, PipelineError};
use areasmith_data::{SqliteOutputError, TargetError};
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors emitted by the areasmith CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (pass it on the command line or set {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A referenced input path does not exist on disk or is not a file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The location index name is not recognised.
    #[error(transparent)]
    IndexType(LocationIndexError),
    /// Preparing the output database failed.
    #[error(transparent)]
    OpenDatabase(#[from] SqliteOutputError),
    /// Opening a dump or report target failed.
    #[error(transparent)]
    OpenTarget(#[from] TargetError),
    /// The run aborted.
    #[error("area assembly failed")]
    Pipeline(#[from] PipelineError),
    /// Writing a listing or report to its target failed.
    #[error("failed to write {what}")]
    WriteReport {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },
    /// The relation audit found issues.
    #[error("found {count} relation problem(s)")]
    ProblemsFound { count: usize },
}

impl CliError {
    /// Process exit status for this error: 2 for command-line mistakes,
    /// 1 for everything else.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ArgumentParsing(_) | Self::MissingArgument { .. } | Self::IndexType(_) => 2,
            _ => 1,
        }
    }
}
