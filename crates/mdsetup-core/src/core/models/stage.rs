use super::selection::AtomSelection;
use crate::core::units::FS_PER_PS;
use std::fmt;

pub const DEFAULT_TIMESTEP_FS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Minimization,
    HeatingRamp,
    ConstantPressureRelax,
    RestrainedEquilibration,
    UnrestrainedEquilibration,
    /// Unrestrained NPT continuation run after equilibration.
    Production,
}

impl StageKind {
    /// The snake-case token used in emitted file names.
    pub fn slug(&self) -> &'static str {
        match self {
            StageKind::Minimization => "minimization",
            StageKind::HeatingRamp => "heating_ramp",
            StageKind::ConstantPressureRelax => "constant_pressure_relax",
            StageKind::RestrainedEquilibration => "restrained_equilibration",
            StageKind::UnrestrainedEquilibration => "unrestrained_equilibration",
            StageKind::Production => "production",
        }
    }

    pub fn is_dynamics(&self) -> bool {
        !matches!(self, StageKind::Minimization)
    }

    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Minimization => "Energy minimization",
            StageKind::HeatingRamp => "Restrained heating",
            StageKind::ConstantPressureRelax => "Constant-pressure relaxation",
            StageKind::RestrainedEquilibration => "Restrained equilibration",
            StageKind::UnrestrainedEquilibration => "Unrestrained equilibration",
            StageKind::Production => "Production",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageDuration {
    /// Number of minimization cycles.
    Steps(u64),
    /// Simulated time of a dynamics segment.
    Simulated { picoseconds: f64, timestep_fs: f64 },
}

impl StageDuration {
    pub fn picoseconds(picoseconds: f64) -> Self {
        StageDuration::Simulated {
            picoseconds,
            timestep_fs: DEFAULT_TIMESTEP_FS,
        }
    }

    /// Integration timestep; minimization has none.
    pub fn timestep_fs(&self) -> Option<f64> {
        match *self {
            StageDuration::Steps(_) => None,
            StageDuration::Simulated { timestep_fs, .. } => Some(timestep_fs),
        }
    }

    pub fn picoseconds_total(&self) -> Option<f64> {
        match *self {
            StageDuration::Steps(_) => None,
            StageDuration::Simulated { picoseconds, .. } => Some(picoseconds),
        }
    }

    /// Number of integration (or minimization) steps the duration corresponds to.
    pub fn steps(&self) -> u64 {
        match *self {
            StageDuration::Steps(n) => n,
            StageDuration::Simulated {
                picoseconds,
                timestep_fs,
            } => (picoseconds * FS_PER_PS / timestep_fs).round() as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemperatureControl {
    Constant(f64),
    Ramp { start: f64, end: f64 },
}

impl TemperatureControl {
    /// Temperature the thermostat holds at the end of the stage.
    pub fn target(&self) -> f64 {
        match *self {
            TemperatureControl::Constant(t) => t,
            TemperatureControl::Ramp { end, .. } => end,
        }
    }

    /// Temperature the stage starts from.
    pub fn initial(&self) -> f64 {
        match *self {
            TemperatureControl::Constant(t) => t,
            TemperatureControl::Ramp { start, .. } => start,
        }
    }

    pub fn is_ramp(&self) -> bool {
        matches!(self, TemperatureControl::Ramp { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureCoupling {
    pub target_bar: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Restraint {
    pub applies_to: AtomSelection,
    /// Harmonic force constant in kcal/mol/Å².
    pub force_constant: f64,
}

/// One step of an equilibration protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub ordinal: usize,
    pub kind: StageKind,
    pub duration: StageDuration,
    /// RMS gradient cutoff in kcal/mol/Å; minimization only.
    pub convergence_threshold: Option<f64>,
    pub temperature: Option<TemperatureControl>,
    pub pressure: Option<PressureCoupling>,
    pub restraint: Option<Restraint>,
}

impl Stage {
    pub fn minimization(ordinal: usize, steps: u64, convergence_threshold: Option<f64>) -> Self {
        Self {
            ordinal,
            kind: StageKind::Minimization,
            duration: StageDuration::Steps(steps),
            convergence_threshold,
            temperature: None,
            pressure: None,
            restraint: None,
        }
    }

    pub fn dynamics(
        ordinal: usize,
        kind: StageKind,
        duration: StageDuration,
        temperature: TemperatureControl,
    ) -> Self {
        Self {
            ordinal,
            kind,
            duration,
            convergence_threshold: None,
            temperature: Some(temperature),
            pressure: None,
            restraint: None,
        }
    }

    pub fn with_pressure(mut self, target_bar: f64) -> Self {
        self.pressure = Some(PressureCoupling { target_bar });
        self
    }

    pub fn with_restraint(mut self, applies_to: AtomSelection, force_constant: f64) -> Self {
        self.restraint = Some(Restraint {
            applies_to,
            force_constant,
        });
        self
    }

    /// Whether the stage draws fresh velocities instead of continuing from a restart.
    ///
    /// Only ramped dynamics stages generate velocities; every other dynamics stage
    /// continues from the previous stage's restart.
    pub fn generates_velocities(&self) -> bool {
        self.temperature.is_some_and(|t| t.is_ramp())
    }

    pub fn continues_dynamics(&self) -> bool {
        self.kind.is_dynamics() && !self.generates_velocities()
    }

    /// File stem used by the `{ordinal:02}_{kind}` naming convention.
    pub fn file_stem(&self) -> String {
        format!("{:02}_{}", self.ordinal, self.kind.slug())
    }

    pub fn title(&self) -> String {
        let mut title = format!("Stage {:02}: {}", self.ordinal, self.kind.label());
        if let Some(restraint) = &self.restraint {
            title.push_str(&format!(
                " ({} restrained at {} kcal/mol/A^2)",
                restraint.applies_to,
                restraint.force_constant
            ));
        }
        title
    }
}
