use super::selection::AtomSelection;
use super::stage::{
    DEFAULT_TIMESTEP_FS, Stage, StageDuration, StageKind, TemperatureControl,
};
use crate::core::schedule::{ConfigurationError, RestraintSchedule};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ValidationError {
    #[error("Protocol contains no stages")]
    Empty,

    #[error("Stage ordinal {ordinal} is out of sequence: expected {expected}")]
    NonContiguousOrdinal { ordinal: usize, expected: usize },

    #[error("Stage {ordinal} ({kind}) has a duration that does not match its kind")]
    DurationMismatch { ordinal: usize, kind: StageKind },

    #[error("Stage {ordinal} ({kind}) is a dynamics stage and cannot carry a convergence threshold")]
    UnexpectedConvergenceThreshold { ordinal: usize, kind: StageKind },

    #[error("Stage {ordinal} is a restrained minimization without a convergence threshold")]
    MissingConvergenceThreshold { ordinal: usize },

    #[error("Stage {ordinal} ({kind}) requires temperature control")]
    MissingTemperature { ordinal: usize, kind: StageKind },

    #[error("Stage {ordinal} ({kind}) has the wrong form of temperature control")]
    TemperatureMismatch { ordinal: usize, kind: StageKind },

    #[error("Stage {ordinal} ({kind}) requires pressure coupling")]
    MissingPressure { ordinal: usize, kind: StageKind },

    #[error("Stage {ordinal} ({kind}) requires a positional restraint")]
    MissingRestraint { ordinal: usize, kind: StageKind },

    #[error("Stage {ordinal} ({kind}) must not carry a positional restraint")]
    UnexpectedRestraint { ordinal: usize, kind: StageKind },

    #[error("Stage {ordinal} has an invalid {field}: {value}")]
    InvalidValue {
        ordinal: usize,
        field: &'static str,
        value: f64,
    },

    #[error(
        "Stage {ordinal} restraint force constant {current} does not decrease from the previous restrained stage ({previous})"
    )]
    NonDecreasingRestraint {
        ordinal: usize,
        previous: f64,
        current: f64,
    },

    #[error("Final stage {ordinal} must be unrestrained")]
    RestrainedFinalStage { ordinal: usize },

    #[error(
        "Stage {ordinal} ({kind}) continues from a restart but does not follow a dynamics stage"
    )]
    MissingVelocitySource { ordinal: usize, kind: StageKind },

    #[error("Stage {ordinal} is a production stage; production runs follow the protocol")]
    ProductionInProtocol { ordinal: usize },
}

impl ValidationError {
    /// Ordinal of the offending stage, when the error concerns a single stage.
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            ValidationError::Empty => None,
            ValidationError::NonContiguousOrdinal { ordinal, .. }
            | ValidationError::DurationMismatch { ordinal, .. }
            | ValidationError::UnexpectedConvergenceThreshold { ordinal, .. }
            | ValidationError::MissingConvergenceThreshold { ordinal }
            | ValidationError::MissingTemperature { ordinal, .. }
            | ValidationError::TemperatureMismatch { ordinal, .. }
            | ValidationError::MissingPressure { ordinal, .. }
            | ValidationError::MissingRestraint { ordinal, .. }
            | ValidationError::UnexpectedRestraint { ordinal, .. }
            | ValidationError::InvalidValue { ordinal, .. }
            | ValidationError::NonDecreasingRestraint { ordinal, .. }
            | ValidationError::RestrainedFinalStage { ordinal }
            | ValidationError::MissingVelocitySource { ordinal, .. }
            | ValidationError::ProductionInProtocol { ordinal } => Some(*ordinal),
        }
    }
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ProtocolError {
    #[error("Invalid protocol: {0}")]
    Validation(#[from] ValidationError),
    #[error("Invalid restraint schedule: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// A validated, immutable equilibration schedule.
///
/// Stage order is execution order. Instances only come out of [`build_default_protocol`],
/// [`build_protocol`] or [`build_custom_protocol`], so every instance satisfies the
/// ordering and restraint-decay invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolModel {
    stages: Vec<Stage>,
    global_temperature: f64,
    atom_selection_default: AtomSelection,
}

impl ProtocolModel {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn global_temperature(&self) -> f64 {
        self.global_temperature
    }

    pub fn atom_selection_default(&self) -> AtomSelection {
        self.atom_selection_default
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Force constants of the restrained stages, in execution order.
    pub fn restraint_constants(&self) -> Vec<f64> {
        self.stages
            .iter()
            .filter_map(|s| s.restraint.map(|r| r.force_constant))
            .collect()
    }
}

/// Numeric recipe of the built-in six-stage protocol.
///
/// The [`Default`] values reproduce the reference recipe; every field can be overridden.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultProtocolParameters {
    pub global_temperature: f64,
    pub initial_temperature: f64,
    pub atom_selection: AtomSelection,
    pub minimization_steps: u64,
    /// Gradient cutoff of the restrained, water-only minimization.
    pub restrained_gradient: f64,
    /// Gradient cutoff of the unrestrained whole-system minimization.
    pub full_gradient: f64,
    pub stage_picoseconds: f64,
    pub timestep_fs: f64,
    pub pressure_bar: f64,
    pub initial_force_constant: f64,
    pub decay_factor: f64,
}

impl Default for DefaultProtocolParameters {
    fn default() -> Self {
        Self {
            global_temperature: 300.0,
            initial_temperature: 100.0,
            atom_selection: AtomSelection::default(),
            minimization_steps: 500,
            restrained_gradient: 0.25,
            full_gradient: 0.001,
            stage_picoseconds: 25.0,
            timestep_fs: DEFAULT_TIMESTEP_FS,
            pressure_bar: 1.0,
            initial_force_constant: 100.0,
            decay_factor: 0.5,
        }
    }
}

const DEFAULT_RESTRAINED_STAGES: usize = 4;

/// Builds the reference protocol for the given terminal temperature and restraint selection.
pub fn build_default_protocol(
    global_temperature: f64,
    atom_selection: AtomSelection,
) -> Result<ProtocolModel, ProtocolError> {
    build_protocol(&DefaultProtocolParameters {
        global_temperature,
        atom_selection,
        ..Default::default()
    })
}

/// Builds the six-stage recipe from explicit parameters.
///
/// 0. water/ion minimization with the solute restrained
/// 1. unrestrained whole-system minimization
/// 2. restrained heating ramp
/// 3. restrained constant-pressure relaxation
/// 4. restrained equilibration at the lowest force constant
/// 5. unrestrained constant-temperature, constant-pressure equilibration
pub fn build_protocol(params: &DefaultProtocolParameters) -> Result<ProtocolModel, ProtocolError> {
    let constants = RestraintSchedule::generate(
        params.initial_force_constant,
        params.decay_factor,
        DEFAULT_RESTRAINED_STAGES,
    )?;
    let k = constants.values();
    let selection = params.atom_selection;
    let target = params.global_temperature;
    let duration = StageDuration::Simulated {
        picoseconds: params.stage_picoseconds,
        timestep_fs: params.timestep_fs,
    };

    let stages = vec![
        Stage::minimization(
            0,
            params.minimization_steps,
            Some(params.restrained_gradient),
        )
        .with_restraint(selection, k[0]),
        Stage::minimization(1, params.minimization_steps, Some(params.full_gradient)),
        Stage::dynamics(
            2,
            StageKind::HeatingRamp,
            duration,
            TemperatureControl::Ramp {
                start: params.initial_temperature,
                end: target,
            },
        )
        .with_restraint(selection, k[1]),
        Stage::dynamics(
            3,
            StageKind::ConstantPressureRelax,
            duration,
            TemperatureControl::Constant(target),
        )
        .with_pressure(params.pressure_bar)
        .with_restraint(selection, k[2]),
        Stage::dynamics(
            4,
            StageKind::RestrainedEquilibration,
            duration,
            TemperatureControl::Constant(target),
        )
        .with_pressure(params.pressure_bar)
        .with_restraint(selection, k[3]),
        Stage::dynamics(
            5,
            StageKind::UnrestrainedEquilibration,
            duration,
            TemperatureControl::Constant(target),
        )
        .with_pressure(params.pressure_bar),
    ];

    Ok(build_custom_protocol_with_default(stages, selection)?)
}

/// Validates a caller-supplied stage list.
///
/// The default restraint selection is taken from the first restrained stage.
pub fn build_custom_protocol(stage_list: Vec<Stage>) -> Result<ProtocolModel, ValidationError> {
    let selection = stage_list
        .iter()
        .find_map(|s| s.restraint.map(|r| r.applies_to))
        .unwrap_or_default();
    build_custom_protocol_with_default(stage_list, selection)
}

/// Validates a caller-supplied stage list with an explicit default restraint selection.
///
/// Checks run stage by stage in list order and the first violation is returned.
pub fn build_custom_protocol_with_default(
    stage_list: Vec<Stage>,
    atom_selection_default: AtomSelection,
) -> Result<ProtocolModel, ValidationError> {
    if stage_list.is_empty() {
        return Err(ValidationError::Empty);
    }

    let mut previous_constant: Option<f64> = None;
    let mut previous_kind: Option<StageKind> = None;

    for (position, stage) in stage_list.iter().enumerate() {
        if stage.ordinal != position {
            return Err(ValidationError::NonContiguousOrdinal {
                ordinal: stage.ordinal,
                expected: position,
            });
        }
        if stage.kind == StageKind::Production {
            return Err(ValidationError::ProductionInProtocol {
                ordinal: stage.ordinal,
            });
        }
        validate_stage(stage)?;

        if stage.continues_dynamics() && !previous_kind.is_some_and(|k| k.is_dynamics()) {
            return Err(ValidationError::MissingVelocitySource {
                ordinal: stage.ordinal,
                kind: stage.kind,
            });
        }

        if let Some(restraint) = &stage.restraint {
            if let Some(previous) = previous_constant {
                if restraint.force_constant >= previous {
                    return Err(ValidationError::NonDecreasingRestraint {
                        ordinal: stage.ordinal,
                        previous,
                        current: restraint.force_constant,
                    });
                }
            }
            previous_constant = Some(restraint.force_constant);
        }
        previous_kind = Some(stage.kind);
    }

    let last = &stage_list[stage_list.len() - 1];
    if last.restraint.is_some() {
        return Err(ValidationError::RestrainedFinalStage {
            ordinal: last.ordinal,
        });
    }

    let global_temperature = stage_list
        .iter()
        .rev()
        .find_map(|s| s.temperature.map(|t| t.target()))
        .unwrap_or(0.0);

    Ok(ProtocolModel {
        stages: stage_list,
        global_temperature,
        atom_selection_default,
    })
}

pub(crate) fn validate_stage(stage: &Stage) -> Result<(), ValidationError> {
    let ordinal = stage.ordinal;
    let kind = stage.kind;
    let positive = |field: &'static str, value: f64| {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(ValidationError::InvalidValue {
                ordinal,
                field,
                value,
            })
        }
    };

    match (kind.is_dynamics(), stage.duration) {
        (false, StageDuration::Steps(steps)) => positive("step count", steps as f64)?,
        (
            true,
            StageDuration::Simulated {
                picoseconds,
                timestep_fs,
            },
        ) => {
            positive("duration", picoseconds)?;
            positive("timestep", timestep_fs)?;
            if stage.duration.steps() == 0 {
                return Err(ValidationError::InvalidValue {
                    ordinal,
                    field: "duration",
                    value: picoseconds,
                });
            }
        }
        _ => return Err(ValidationError::DurationMismatch { ordinal, kind }),
    }

    if kind.is_dynamics() {
        if stage.convergence_threshold.is_some() {
            return Err(ValidationError::UnexpectedConvergenceThreshold { ordinal, kind });
        }
        let temperature = stage
            .temperature
            .ok_or(ValidationError::MissingTemperature { ordinal, kind })?;
        if temperature.is_ramp() != (kind == StageKind::HeatingRamp) {
            return Err(ValidationError::TemperatureMismatch { ordinal, kind });
        }
        positive("start temperature", temperature.initial())?;
        positive("target temperature", temperature.target())?;
    } else {
        if stage.restraint.is_some() && stage.convergence_threshold.is_none() {
            return Err(ValidationError::MissingConvergenceThreshold { ordinal });
        }
        if let Some(threshold) = stage.convergence_threshold {
            positive("convergence threshold", threshold)?;
        }
    }

    match stage.pressure {
        Some(pressure) => positive("target pressure", pressure.target_bar)?,
        None if kind == StageKind::ConstantPressureRelax => {
            return Err(ValidationError::MissingPressure { ordinal, kind });
        }
        None => {}
    }

    match (&stage.restraint, kind) {
        (None, StageKind::RestrainedEquilibration) => {
            return Err(ValidationError::MissingRestraint { ordinal, kind });
        }
        (Some(_), StageKind::UnrestrainedEquilibration | StageKind::Production) => {
            return Err(ValidationError::UnexpectedRestraint { ordinal, kind });
        }
        (Some(restraint), _) => positive("restraint force constant", restraint.force_constant)?,
        (None, _) => {}
    }

    Ok(())
}
