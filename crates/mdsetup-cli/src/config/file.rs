use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRecipeConfig {
    pub initial_temperature: Option<f64>,
    pub final_temperature: Option<f64>,
    pub force_constant: Option<f64>,
    pub decay_factor: Option<f64>,
    pub selection: Option<String>,
    pub minimization_steps: Option<u64>,
    pub stage_picoseconds: Option<f64>,
    pub timestep_fs: Option<f64>,
    pub pressure: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileProductionConfig {
    pub picoseconds: Option<f64>,
    pub segments: Option<u32>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileAmberConfig {
    pub home: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileCharmmConfig {
    pub toppar: Option<PathBuf>,
    pub force_field: Option<u32>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub engine: Option<String>,
    pub prefix: Option<String>,
    pub outdir: Option<PathBuf>,
    pub executable: Option<String>,
    pub output: Option<String>,
    pub recipe: Option<FileRecipeConfig>,
    pub production: Option<FileProductionConfig>,
    pub amber: Option<FileAmberConfig>,
    pub charmm: Option<FileCharmmConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
