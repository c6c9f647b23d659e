use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigurationError {
    #[error("Initial force constant must be positive and finite, got {0}")]
    InvalidInitialConstant(f64),

    #[error("Decay factor must lie strictly between 0 and 1, got {0}")]
    DecayFactorOutOfRange(f64),

    #[error("Restraint schedule needs at least one cycle, got {0}")]
    NonPositiveCycles(usize),

    #[error("Force constant underflowed to zero at cycle {cycle}")]
    Underflow { cycle: usize },
}

/// A geometric sequence of restraint force constants (kcal/mol/Å²).
///
/// Element `i` is `initial_constant * decay_factor^i`, built by repeated multiplication.
/// The sequence is strictly decreasing and never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RestraintSchedule {
    values: Vec<f64>,
}

impl RestraintSchedule {
    /// Generates `cycles` force constants starting at `initial_constant`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if `initial_constant` is not positive and finite,
    /// if `decay_factor` is outside the open interval (0, 1), if `cycles` is zero, or if
    /// the sequence decays to zero before `cycles` values are produced.
    pub fn generate(
        initial_constant: f64,
        decay_factor: f64,
        cycles: usize,
    ) -> Result<Self, ConfigurationError> {
        if !(initial_constant.is_finite() && initial_constant > 0.0) {
            return Err(ConfigurationError::InvalidInitialConstant(initial_constant));
        }
        if !(decay_factor > 0.0 && decay_factor < 1.0) {
            return Err(ConfigurationError::DecayFactorOutOfRange(decay_factor));
        }
        if cycles < 1 {
            return Err(ConfigurationError::NonPositiveCycles(cycles));
        }

        let mut values = Vec::with_capacity(cycles);
        let mut current = initial_constant;
        for cycle in 0..cycles {
            if cycle > 0 {
                current *= decay_factor;
            }
            if current <= 0.0 || values.last().is_some_and(|&prev| current >= prev) {
                return Err(ConfigurationError::Underflow { cycle });
            }
            values.push(current);
        }

        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// Convenience wrapper returning the bare force-constant sequence.
pub fn generate(
    initial_constant: f64,
    decay_factor: f64,
    cycles: usize,
) -> Result<Vec<f64>, ConfigurationError> {
    RestraintSchedule::generate(initial_constant, decay_factor, cycles)
        .map(RestraintSchedule::into_values)
}
