//! The `find-problems` command: audit relation structure.

use std::io::{self, Write};

use areasmith_core::{AuditReport, EntitySource, audit_relations};
use areasmith_data::{PbfSource, TargetSpec};
use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::CliError;
use crate::create::ARG_INPUT;

pub(crate) const ENV_FIND_PROBLEMS_INPUT: &str = "AREASMITH_CMDS_FIND_PROBLEMS_INPUT";

/// CLI arguments for the `find-problems` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    about = "Report multipolygon and boundary relations with suspicious members",
    long_about = "Read only the relations of an OSM file and report way \
                 members with roles other than outer, inner or empty, and \
                 non-way members of multipolygon relations. Exits with a \
                 failure status when any relation has a problem."
)]
#[ortho_config(prefix = "AREASMITH")]
pub struct FindProblemsArgs {
    /// Path to the OpenStreetMap PBF file.
    #[arg(value_name = "OSMFILE")]
    #[serde(default)]
    pub input: Option<Utf8PathBuf>,
    /// Write the offending relations to FILE, one JSON record per line.
    #[arg(short = 'o', long, value_name = "FILE")]
    #[serde(default)]
    pub output: Option<Utf8PathBuf>,
}

pub(crate) fn run_find_problems(args: FindProblemsArgs) -> Result<AuditReport, CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let input = merged.input.ok_or(CliError::MissingArgument {
        field: ARG_INPUT,
        env: ENV_FIND_PROBLEMS_INPUT,
    })?;
    crate::require_file(&input, ARG_INPUT)?;
    let mut relations = merged.output.map(TargetSpec::File).unwrap_or_default().open()?;
    let mut out = io::stdout().lock();
    execute_find_problems(
        &PbfSource::new(input.as_std_path()),
        &mut out,
        relations.as_mut().map(|target| target as &mut dyn Write),
    )
}

/// Audit `source`, writing one line per issue to `out` and every offending
/// relation to `relations` when given.
///
/// # Errors
/// Returns [`CliError::ProblemsFound`] once everything is written if any
/// relation has an issue.
pub fn execute_find_problems<S: EntitySource>(
    source: &S,
    out: &mut impl Write,
    relations: Option<&mut dyn Write>,
) -> Result<AuditReport, CliError> {
    let report = audit_relations(source)?;
    report
        .issues
        .iter()
        .try_for_each(|issue| writeln!(out, "{issue}"))
        .and_then(|()| out.flush())
        .map_err(|source| CliError::WriteReport {
            what: "relation problems",
            source,
        })?;
    if let Some(relations) = relations {
        write_relations(relations, &report).map_err(|source| CliError::WriteReport {
            what: "offending relations",
            source,
        })?;
    }
    info!("Found {} errors", report.issues.len());
    if report.issues.is_empty() {
        Ok(report)
    } else {
        Err(CliError::ProblemsFound {
            count: report.issues.len(),
        })
    }
}

fn write_relations(out: &mut dyn Write, report: &AuditReport) -> io::Result<()> {
    for relation in &report.offending {
        serde_json::to_writer(&mut *out, relation)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}
