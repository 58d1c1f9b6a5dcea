//! Test helpers for composing create CLI datasets and layered overrides.

use super::*;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Clone, Default)]
pub(super) struct LayerOverrides {
    pub(super) input: Option<Utf8PathBuf>,
    pub(super) index: Option<String>,
}

#[derive(Debug)]
pub(super) struct DatasetFiles {
    dir: TempDir,
    cli_input: Utf8PathBuf,
    config_input: Utf8PathBuf,
}

impl DatasetFiles {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let cli_input = root.join("cli.osm.pbf");
        let config_input = root.join("config.osm.pbf");
        for path in [&cli_input, &config_input] {
            fs::write(path, b"dataset contents").expect("write dataset file");
        }
        Self {
            dir,
            cli_input,
            config_input,
        }
    }

    pub(super) fn input(&self) -> &Utf8Path {
        &self.cli_input
    }

    pub(super) fn config_input(&self) -> &Utf8Path {
        &self.config_input
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join(name)).expect("utf-8 path")
    }
}

pub(super) fn merge_layers(
    mut cli_args: CreateArgs,
    file_layer: Option<LayerOverrides>,
    env_layer: Option<LayerOverrides>,
) -> Result<CreateConfig, CliError> {
    merge_field(
        &mut cli_args.input,
        extract_field(&env_layer, |layer| &layer.input),
        extract_field(&file_layer, |layer| &layer.input),
    );
    merge_field(
        &mut cli_args.index,
        extract_field(&env_layer, |layer| &layer.index),
        extract_field(&file_layer, |layer| &layer.index),
    );
    let config = CreateConfig::try_from(cli_args)?;
    config.validate_sources()?;
    Ok(config)
}

fn merge_field<T: Clone>(target: &mut Option<T>, env_value: Option<T>, file_value: Option<T>) {
    if target.is_none()
        && let Some(value) = env_value.or(file_value)
    {
        *target = Some(value);
    }
}

fn extract_field<T: Clone>(
    layer: &Option<LayerOverrides>,
    accessor: fn(&LayerOverrides) -> &Option<T>,
) -> Option<T> {
    layer.as_ref().and_then(|entry| accessor(entry).clone())
}
