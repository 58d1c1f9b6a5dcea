//! The `create` command: assemble areas from an OSM file.

use std::io::Write;
use std::str::FromStr;

use areasmith_core::{
    Assembler, AssemblerConfig, CollectOnlyAssembler, CountingSink, EntitySource, FanOut,
    FanOutConfig, IndexStrategy, LogReporter, Pipeline, ProblemReporter, RingAssembler,
    RunSummary,
};
use areasmith_data::{DumpSink, PbfSource, SqliteOutput, StreamProblemReporter, TargetSpec};
use camino::Utf8PathBuf;
use clap::Parser;
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::CliError;

pub(crate) const ARG_INPUT: &str = "input";
pub(crate) const ENV_CREATE_INPUT: &str = "AREASMITH_CMDS_CREATE_INPUT";

/// CLI arguments for the `create` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read an OSM PBF file twice and build areas from closed \
                 ways and multipolygon relations. Options can come from CLI \
                 flags, configuration files, or environment variables.",
    about = "Build areas from an OSM file"
)]
#[ortho_config(prefix = "AREASMITH")]
pub struct CreateArgs {
    /// Path to the OpenStreetMap PBF file.
    #[arg(value_name = "OSMFILE")]
    #[serde(default)]
    pub input: Option<Utf8PathBuf>,
    /// Check geometries.
    #[arg(short = 'c', long)]
    #[serde(default)]
    pub check: bool,
    /// Only collect relation structure, don't assemble areas.
    #[arg(short = 'C', long)]
    #[serde(default)]
    pub collect_only: bool,
    /// Keep only invalid geometries in the database (implies --check).
    #[arg(short = 'f', long)]
    #[serde(default)]
    pub only_invalid: bool,
    /// Assembler debug level.
    #[arg(
        short = 'd',
        long,
        value_name = "LEVEL",
        num_args = 0..=1,
        default_missing_value = "1",
        require_equals = true
    )]
    #[serde(default)]
    pub debug: Option<u8>,
    /// Dump areas to FILE, or to standard output without a value.
    #[arg(
        short = 'D',
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "-",
        require_equals = true
    )]
    #[serde(default)]
    pub dump_areas: Option<String>,
    /// Create empty areas for broken geometries.
    #[arg(short = 'e', long)]
    #[serde(default)]
    pub empty_areas: bool,
    /// Location index type (see `index-types`).
    #[arg(short = 'i', long, value_name = "INDEX_TYPE")]
    #[serde(default)]
    pub index: Option<String>,
    /// SQLite database receiving areas and problems.
    #[arg(short = 'o', long, value_name = "DBNAME")]
    #[serde(default)]
    pub output: Option<Utf8PathBuf>,
    /// Overwrite an existing database.
    #[arg(short = 'O', long)]
    #[serde(default)]
    pub overwrite: bool,
    /// Report problems to FILE, or to standard output without a value.
    #[arg(
        short = 'p',
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "-",
        require_equals = true
    )]
    #[serde(default)]
    pub report_problems: Option<String>,
    /// List relations that never received all member ways.
    #[arg(short = 'r', long)]
    #[serde(default)]
    pub show_incomplete: bool,
    /// Check member roles against ring nesting.
    #[arg(short = 'R', long)]
    #[serde(default)]
    pub check_roles: bool,
    /// Do not output new-style multipolygons.
    #[arg(short = 's', long)]
    #[serde(default)]
    pub no_new_style: bool,
    /// Do not output old-style multipolygons.
    #[arg(short = 'S', long)]
    #[serde(default)]
    pub no_old_style: bool,
    /// Do not output areas created from ways.
    #[arg(short = 'w', long)]
    #[serde(default)]
    pub no_way_polygons: bool,
    /// Do not output areas (same as -s -S -w).
    #[arg(short = 'x', long)]
    #[serde(default)]
    pub no_areas: bool,
}

impl CreateArgs {
    pub(crate) fn into_config(self) -> Result<CreateConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        CreateConfig::try_from(merged)
    }
}

/// Typed options for one `create` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateConfig {
    pub input: Utf8PathBuf,
    pub strategy: IndexStrategy,
    pub collect_only: bool,
    pub assembler: AssemblerConfig,
    pub fan_out: FanOutConfig,
    pub dump_areas: TargetSpec,
    pub report_problems: TargetSpec,
    pub output: Option<Utf8PathBuf>,
    pub overwrite: bool,
    pub show_incomplete: bool,
}

impl TryFrom<CreateArgs> for CreateConfig {
    type Error = CliError;

    fn try_from(args: CreateArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_CREATE_INPUT,
        })?;
        let strategy = crate::parse_strategy(args.index.as_deref())?;
        let mut assembler = AssemblerConfig {
            debug_level: args.debug.unwrap_or(0),
            check_roles: args.check_roles,
            create_empty_areas: args.empty_areas,
            create_way_polygons: !args.no_way_polygons,
            create_new_style_polygons: !args.no_new_style,
            create_old_style_polygons: !args.no_old_style,
        };
        if args.no_areas {
            assembler = assembler.without_areas();
        }
        let fan_out = FanOutConfig {
            check: args.check || args.only_invalid,
            only_invalid: args.only_invalid,
        };
        Ok(Self {
            input,
            strategy,
            collect_only: args.collect_only,
            assembler,
            fan_out,
            dump_areas: parse_target(args.dump_areas.as_deref()),
            report_problems: parse_target(args.report_problems.as_deref()),
            output: args.output,
            overwrite: args.overwrite,
            show_incomplete: args.show_incomplete,
        })
    }
}

fn parse_target(raw: Option<&str>) -> TargetSpec {
    match raw {
        Some(raw) => match TargetSpec::from_str(raw) {
            Ok(spec) => spec,
            Err(never) => match never {},
        },
        None => TargetSpec::Disabled,
    }
}

impl CreateConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        crate::require_file(&self.input, ARG_INPUT)
    }
}

pub(crate) fn run_create(args: CreateArgs) -> Result<RunSummary, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let source = PbfSource::new(config.input.as_std_path());
    let summary = execute_create(&config, &source)?;
    log_summary(&summary);
    if config.show_incomplete {
        let mut out = std::io::stdout().lock();
        write_incomplete(&mut out, &summary.incomplete).map_err(|source| {
            CliError::WriteReport {
                what: "incomplete relations",
                source,
            }
        })?;
    }
    Ok(summary)
}

/// Open every output, then run both passes over `source`.
///
/// Outputs are opened before the first pass so setup failures abort before
/// any input is read.
pub fn execute_create<S: EntitySource>(
    config: &CreateConfig,
    source: &S,
) -> Result<RunSummary, CliError> {
    let (fan_out, assembler) = prepare_run(config)?;
    let pipeline =
        Pipeline::new(config.strategy).with_way_areas(config.assembler.create_way_polygons);
    Ok(pipeline.run(source, assembler, fan_out)?)
}

fn prepare_run(config: &CreateConfig) -> Result<(FanOut, Box<dyn Assembler>), CliError> {
    if config.collect_only {
        info!("Collecting relation structure only");
        let fan_out = FanOut::new(config.fan_out, problem_reporter(config, None)?)
            .with_sink(Box::new(CountingSink::default()));
        return Ok((fan_out, Box::new(CollectOnlyAssembler::default())));
    }

    let database = config
        .output
        .as_deref()
        .map(|path| SqliteOutput::create(path, config.overwrite))
        .transpose()?;
    let mut fan_out = FanOut::new(config.fan_out, problem_reporter(config, database.as_ref())?);
    let mut has_sink = false;
    if let Some(database) = &database {
        info!("Writing areas to {}", database.path());
        fan_out.add_sink(Box::new(database.area_sink()));
        has_sink = true;
    }
    if let Some(target) = config.dump_areas.open()? {
        info!("Dumping areas to {}", target.label());
        fan_out.add_sink(Box::new(DumpSink::new(target)));
        has_sink = true;
    }
    if !has_sink {
        fan_out.add_sink(Box::new(CountingSink::default()));
    }
    Ok((fan_out, Box::new(RingAssembler::new(config.assembler))))
}

/// Problems go to the explicit target, else the database, else the log.
fn problem_reporter(
    config: &CreateConfig,
    database: Option<&SqliteOutput>,
) -> Result<Box<dyn ProblemReporter>, CliError> {
    if let Some(target) = config.report_problems.open()? {
        return Ok(Box::new(StreamProblemReporter::new(target)));
    }
    Ok(match database {
        Some(database) => Box::new(database.problem_reporter()),
        None => Box::new(LogReporter),
    })
}

fn log_summary(summary: &RunSummary) {
    let prefilter = &summary.prefilter;
    info!(
        "Relations: {} seen, {} retained, {} trivial",
        prefilter.relations_seen, prefilter.relations_retained, prefilter.relations_trivial
    );
    let output = &summary.output;
    info!(
        "Areas: {} produced, {} invalid, {} written; {} problem(s)",
        output.areas, output.invalid, output.persisted, output.problems
    );
    info!("Assembler: {}", summary.assembly);
    info!("Incomplete relations: {}", summary.incomplete.len());
    if summary.resolver.nodes_rejected > 0 {
        warn!(
            "{} node(s) could not be stored by the location index",
            summary.resolver.nodes_rejected
        );
    }
    info!(
        "Estimated memory usage of the location index: {} kB",
        summary.index_memory / 1024
    );
}

/// List incomplete relation ids, one per line.
pub(crate) fn write_incomplete(out: &mut impl Write, incomplete: &[i64]) -> std::io::Result<()> {
    if incomplete.is_empty() {
        return Ok(());
    }
    writeln!(out, "Member ways missing for these relations:")?;
    for id in incomplete {
        writeln!(out, "  r{id}")?;
    }
    out.flush()
}
