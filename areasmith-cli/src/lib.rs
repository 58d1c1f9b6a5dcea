//! Command-line interface for building areas from OSM files.
#![forbid(unsafe_code)]

use std::io::Write;
use std::str::FromStr;

use areasmith_core::IndexStrategy;
use camino::Utf8Path;
use clap::{Parser, Subcommand};

mod create;
mod error;
mod failed_area_tags;
mod find_problems;

pub use create::{CreateArgs, CreateConfig, execute_create};
pub use error::CliError;
pub use failed_area_tags::{FailedAreaTagsArgs, execute_failed_area_tags};
pub use find_problems::{FindProblemsArgs, execute_find_problems};

/// Run the areasmith CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Create(args) => {
            create::run_create(args)?;
        }
        Command::FindProblems(args) => {
            find_problems::run_find_problems(args)?;
        }
        Command::FailedAreaTags(args) => {
            failed_area_tags::run_failed_area_tags(args)?;
        }
        Command::IndexTypes => {
            let mut out = std::io::stdout().lock();
            write_index_types(&mut out).map_err(|source| CliError::WriteReport {
                what: "index types",
                source,
            })?;
        }
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "areasmith",
    about = "Assemble areas from OpenStreetMap ways and multipolygon relations",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build areas and write them to a database, a dump or nowhere.
    Create(CreateArgs),
    /// Check the member structure of area relations.
    FindProblems(FindProblemsArgs),
    /// Count the tags of areas that failed to assemble.
    FailedAreaTags(FailedAreaTagsArgs),
    /// Show available location index types.
    IndexTypes,
}

/// List every location index strategy, marking the default.
fn write_index_types(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Available index types:")?;
    for strategy in IndexStrategy::ALL {
        if strategy == IndexStrategy::default() {
            writeln!(out, "  {strategy} (default)")?;
        } else {
            writeln!(out, "  {strategy}")?;
        }
    }
    out.flush()
}

/// Named index strategy, or the default when none is given.
fn parse_strategy(name: Option<&str>) -> Result<IndexStrategy, CliError> {
    name.map_or_else(
        || Ok(IndexStrategy::default()),
        |name| IndexStrategy::from_str(name).map_err(CliError::IndexType),
    )
}

fn require_file(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match areasmith_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::MissingSourceFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests;
