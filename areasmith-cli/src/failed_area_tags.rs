//! The `failed-area-tags` command: tag statistics of broken areas.

use std::io::Write;

use areasmith_core::{
    AssemblerConfig, DiscardReporter, EntitySource, FailedTagCounts, FailedTagSink, FanOut,
    FanOutConfig, IndexStrategy, Pipeline, RingAssembler,
};
use areasmith_data::PbfSource;
use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::CliError;
use crate::create::ARG_INPUT;

pub(crate) const ENV_FAILED_AREA_TAGS_INPUT: &str = "AREASMITH_CMDS_FAILED_AREA_TAGS_INPUT";

/// CLI arguments for the `failed-area-tags` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    about = "Count the tags of areas that could not be assembled",
    long_about = "Assemble every area of an OSM file, keeping placeholders \
                 for broken geometries, and count those placeholders by \
                 their main tag."
)]
#[ortho_config(prefix = "AREASMITH")]
pub struct FailedAreaTagsArgs {
    /// Path to the OpenStreetMap PBF file.
    #[arg(value_name = "OSMFILE")]
    #[serde(default)]
    pub input: Option<Utf8PathBuf>,
    /// Location index type (see `index-types`).
    #[arg(short = 'i', long, value_name = "INDEX_TYPE")]
    #[serde(default)]
    pub index: Option<String>,
}

pub(crate) fn run_failed_area_tags(args: FailedAreaTagsArgs) -> Result<FailedTagCounts, CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let input = merged.input.ok_or(CliError::MissingArgument {
        field: ARG_INPUT,
        env: ENV_FAILED_AREA_TAGS_INPUT,
    })?;
    let strategy = crate::parse_strategy(merged.index.as_deref())?;
    crate::require_file(&input, ARG_INPUT)?;
    let counts = execute_failed_area_tags(&PbfSource::new(input.as_std_path()), strategy)?;
    let mut out = std::io::stdout().lock();
    write!(out, "{counts}")
        .and_then(|()| out.flush())
        .map_err(|source| CliError::WriteReport {
            what: "failed area tags",
            source,
        })?;
    Ok(counts)
}

/// Assemble `source` with empty placeholders and count their tags.
pub fn execute_failed_area_tags<S: EntitySource>(
    source: &S,
    strategy: IndexStrategy,
) -> Result<FailedTagCounts, CliError> {
    let config = AssemblerConfig {
        create_empty_areas: true,
        ..AssemblerConfig::default()
    };
    let sink = FailedTagSink::default();
    let tally = sink.counts();
    let fan_out =
        FanOut::new(FanOutConfig::default(), Box::new(DiscardReporter)).with_sink(Box::new(sink));
    let summary = Pipeline::new(strategy).run(source, RingAssembler::new(config), fan_out)?;
    let counts = *tally.borrow();
    info!(
        "{} of {} area(s) failed to assemble",
        counts.total(),
        summary.output.areas
    );
    Ok(counts)
}
