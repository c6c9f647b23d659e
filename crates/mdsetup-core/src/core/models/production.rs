use super::protocol::{ProtocolModel, ValidationError, validate_stage};
use super::stage::{DEFAULT_TIMESTEP_FS, Stage, StageDuration, StageKind, TemperatureControl};

pub const DEFAULT_SEGMENT_PICOSECONDS: f64 = 1000.0;
pub const DEFAULT_SEGMENT_COUNT: u32 = 10;
const DEFAULT_PRESSURE_BAR: f64 = 1.0;

/// Unrestrained constant-pressure run that continues from the last equilibration stage.
///
/// One input deck is shared by every segment; the driver chains the segments through
/// restart files.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionRun {
    /// Ordinal of the production deck, one past the last protocol stage.
    pub ordinal: usize,
    pub segment_picoseconds: f64,
    pub timestep_fs: f64,
    pub temperature: f64,
    pub pressure_bar: f64,
    pub segments: u32,
}

impl ProductionRun {
    /// Production settings continuing `protocol` at its final temperature and pressure.
    pub fn following(protocol: &ProtocolModel) -> Self {
        let last = protocol.stages().last();
        Self {
            ordinal: protocol.len(),
            segment_picoseconds: DEFAULT_SEGMENT_PICOSECONDS,
            timestep_fs: last
                .and_then(|s| s.duration.timestep_fs())
                .unwrap_or(DEFAULT_TIMESTEP_FS),
            temperature: protocol.global_temperature(),
            pressure_bar: last
                .and_then(|s| s.pressure)
                .map_or(DEFAULT_PRESSURE_BAR, |p| p.target_bar),
            segments: DEFAULT_SEGMENT_COUNT,
        }
    }

    /// The stage every production segment runs.
    pub fn stage(&self) -> Stage {
        Stage::dynamics(
            self.ordinal,
            StageKind::Production,
            StageDuration::Simulated {
                picoseconds: self.segment_picoseconds,
                timestep_fs: self.timestep_fs,
            },
            TemperatureControl::Constant(self.temperature),
        )
        .with_pressure(self.pressure_bar)
    }

    pub fn total_picoseconds(&self) -> f64 {
        self.segment_picoseconds * f64::from(self.segments)
    }

    /// Checks the run itself and that `protocol` ends with dynamics it can continue from.
    pub fn validate_after(&self, protocol: &ProtocolModel) -> Result<(), ValidationError> {
        if !protocol.stages().last().is_some_and(|s| s.kind.is_dynamics()) {
            return Err(ValidationError::MissingVelocitySource {
                ordinal: self.ordinal,
                kind: StageKind::Production,
            });
        }
        validate_stage(&self.stage())?;
        if self.segments == 0 {
            return Err(ValidationError::InvalidValue {
                ordinal: self.ordinal,
                field: "segment count",
                value: 0.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::protocol::{build_custom_protocol, build_default_protocol};
    use crate::core::models::selection::AtomSelection;

    #[test]
    fn following_continues_default_protocol() {
        let protocol = build_default_protocol(310.0, AtomSelection::Backbone).unwrap();
        let run = ProductionRun::following(&protocol);
        assert_eq!(run.ordinal, 6);
        assert_eq!(run.temperature, 310.0);
        assert_eq!(run.pressure_bar, 1.0);
        assert_eq!(run.timestep_fs, 2.0);
        assert_eq!(run.segments, DEFAULT_SEGMENT_COUNT);
        assert_eq!(run.total_picoseconds(), 10_000.0);
        assert!(run.validate_after(&protocol).is_ok());
    }

    #[test]
    fn stage_is_unrestrained_npt_continuation() {
        let protocol = build_default_protocol(300.0, AtomSelection::Backbone).unwrap();
        let stage = ProductionRun::following(&protocol).stage();
        assert_eq!(stage.kind, StageKind::Production);
        assert_eq!(stage.file_stem(), "06_production");
        assert_eq!(stage.duration.steps(), 500_000);
        assert!(stage.restraint.is_none());
        assert!(stage.pressure.is_some());
        assert!(stage.continues_dynamics());
    }

    #[test]
    fn invalid_values_are_rejected_with_ordinal() {
        let protocol = build_default_protocol(300.0, AtomSelection::Backbone).unwrap();
        let mut run = ProductionRun::following(&protocol);
        run.segments = 0;
        assert!(matches!(
            run.validate_after(&protocol),
            Err(ValidationError::InvalidValue {
                ordinal: 6,
                field: "segment count",
                ..
            })
        ));

        run.segments = 2;
        run.segment_picoseconds = -5.0;
        assert!(matches!(
            run.validate_after(&protocol),
            Err(ValidationError::InvalidValue {
                ordinal: 6,
                field: "duration",
                ..
            })
        ));
    }

    #[test]
    fn minimization_only_protocol_cannot_be_continued() {
        let protocol = build_custom_protocol(vec![Stage::minimization(0, 100, Some(0.1))]).unwrap();
        let run = ProductionRun::following(&protocol);
        assert_eq!(run.ordinal, 1);
        assert_eq!(
            run.validate_after(&protocol),
            Err(ValidationError::MissingVelocitySource {
                ordinal: 1,
                kind: StageKind::Production,
            })
        );
    }
}
