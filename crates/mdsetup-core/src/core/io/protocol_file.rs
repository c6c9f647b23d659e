use crate::core::models::protocol::{
    ProtocolModel, ValidationError, build_custom_protocol_with_default,
};
use crate::core::models::selection::{AtomSelection, SelectionParseError};
use crate::core::models::stage::{
    DEFAULT_TIMESTEP_FS, PressureCoupling, Restraint, Stage, StageDuration, StageKind,
    TemperatureControl,
};
use crate::core::schedule::{ConfigurationError, RestraintSchedule};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProtocolLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Stage {ordinal}: {reason}")]
    Stage { ordinal: usize, reason: String },
    #[error("Stage {ordinal}: {source}")]
    Selection {
        ordinal: usize,
        source: SelectionParseError,
    },
    #[error("{0}")]
    DefaultSelection(SelectionParseError),
    #[error(
        "{count} restrained stage(s) omit `force-constant` but no [restraint-decay] table is given"
    )]
    MissingDecay { count: usize },
    #[error("Invalid restraint decay: {0}")]
    Schedule(#[from] ConfigurationError),
    #[error("Invalid protocol: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum FileStageKind {
    Minimization,
    HeatingRamp,
    ConstantPressureRelax,
    RestrainedEquilibration,
    UnrestrainedEquilibration,
}

impl From<FileStageKind> for StageKind {
    fn from(kind: FileStageKind) -> Self {
        match kind {
            FileStageKind::Minimization => StageKind::Minimization,
            FileStageKind::HeatingRamp => StageKind::HeatingRamp,
            FileStageKind::ConstantPressureRelax => StageKind::ConstantPressureRelax,
            FileStageKind::RestrainedEquilibration => StageKind::RestrainedEquilibration,
            FileStageKind::UnrestrainedEquilibration => StageKind::UnrestrainedEquilibration,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(untagged)]
enum FileTemperature {
    Constant(f64),
    Ramp { start: f64, end: f64 },
}

impl From<FileTemperature> for TemperatureControl {
    fn from(t: FileTemperature) -> Self {
        match t {
            FileTemperature::Constant(k) => TemperatureControl::Constant(k),
            FileTemperature::Ramp { start, end } => TemperatureControl::Ramp { start, end },
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileRestraint {
    force_constant: Option<f64>,
    selection: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileStage {
    ordinal: usize,
    kind: FileStageKind,
    steps: Option<u64>,
    convergence_threshold: Option<f64>,
    picoseconds: Option<f64>,
    timestep_fs: Option<f64>,
    temperature: Option<FileTemperature>,
    pressure: Option<f64>,
    restraint: Option<FileRestraint>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(deny_unknown_fields)]
struct FileDecay {
    initial: f64,
    factor: f64,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileProtocol {
    default_selection: Option<String>,
    restraint_decay: Option<FileDecay>,
    #[serde(default)]
    stages: Vec<FileStage>,
}

/// Loads and validates a protocol override file.
pub fn load(path: &Path) -> Result<ProtocolModel, ProtocolLoadError> {
    debug!("Loading protocol override from {:?}", path);
    let content = std::fs::read_to_string(path).map_err(|e| ProtocolLoadError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    parse(&content, &path.to_string_lossy())
}

/// Parses and validates a protocol from TOML text; `origin` names the source in errors.
///
/// Restraints that omit `force-constant` draw successive values from the
/// `[restraint-decay]` schedule, one cycle per such stage, in stage order.
pub fn parse(content: &str, origin: &str) -> Result<ProtocolModel, ProtocolLoadError> {
    let file: FileProtocol = toml::from_str(content).map_err(|e| ProtocolLoadError::Toml {
        path: origin.to_string(),
        source: e,
    })?;

    let default_selection = match &file.default_selection {
        Some(text) => text
            .parse::<AtomSelection>()
            .map_err(ProtocolLoadError::DefaultSelection)?,
        None => AtomSelection::default(),
    };

    let decaying = file
        .stages
        .iter()
        .filter(|s| s.restraint.as_ref().is_some_and(|r| r.force_constant.is_none()))
        .count();
    let mut schedule = if decaying > 0 {
        let decay = file
            .restraint_decay
            .ok_or(ProtocolLoadError::MissingDecay { count: decaying })?;
        RestraintSchedule::generate(decay.initial, decay.factor, decaying)?
            .into_values()
            .into_iter()
    } else {
        Vec::new().into_iter()
    };

    let mut stages = Vec::with_capacity(file.stages.len());
    for raw in file.stages {
        let restraint = match &raw.restraint {
            Some(r) => {
                let applies_to = match &r.selection {
                    Some(text) => {
                        text.parse::<AtomSelection>()
                            .map_err(|source| ProtocolLoadError::Selection {
                                ordinal: raw.ordinal,
                                source,
                            })?
                    }
                    None => default_selection,
                };
                let force_constant = match r.force_constant {
                    Some(k) => k,
                    None => schedule.next().ok_or_else(|| ProtocolLoadError::Stage {
                        ordinal: raw.ordinal,
                        reason: "restraint decay schedule exhausted".to_string(),
                    })?,
                };
                Some(Restraint {
                    applies_to,
                    force_constant,
                })
            }
            None => None,
        };
        stages.push(convert_stage(raw, restraint)?);
    }

    Ok(build_custom_protocol_with_default(stages, default_selection)?)
}

fn convert_stage(
    raw: FileStage,
    restraint: Option<Restraint>,
) -> Result<Stage, ProtocolLoadError> {
    let kind = StageKind::from(raw.kind);
    let invalid = |reason: &str| ProtocolLoadError::Stage {
        ordinal: raw.ordinal,
        reason: reason.to_string(),
    };

    let duration = if kind.is_dynamics() {
        if raw.steps.is_some() {
            return Err(invalid("dynamics stages take `picoseconds`, not `steps`"));
        }
        StageDuration::Simulated {
            picoseconds: raw
                .picoseconds
                .ok_or_else(|| invalid("`picoseconds` is required for dynamics stages"))?,
            timestep_fs: raw.timestep_fs.unwrap_or(DEFAULT_TIMESTEP_FS),
        }
    } else {
        if raw.picoseconds.is_some() || raw.timestep_fs.is_some() {
            return Err(invalid("minimization stages take `steps`, not a simulated time"));
        }
        StageDuration::Steps(
            raw.steps
                .ok_or_else(|| invalid("`steps` is required for minimization stages"))?,
        )
    };

    Ok(Stage {
        ordinal: raw.ordinal,
        kind,
        duration,
        convergence_threshold: raw.convergence_threshold,
        temperature: raw.temperature.map(Into::into),
        pressure: raw.pressure.map(|target_bar| PressureCoupling { target_bar }),
        restraint,
    })
}
