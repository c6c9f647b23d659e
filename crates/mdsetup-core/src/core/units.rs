//! Unit conversions between the protocol's canonical units and engine-native units.
//!
//! Protocol values are expressed in kcal/mol, Å, K, bar, ps and fs. Temperatures are
//! never converted.

pub const KJ_PER_KCAL: f64 = 4.184;
pub const NM_PER_ANGSTROM: f64 = 0.1;
pub const BAR_PER_ATM: f64 = 1.01325;
pub const FS_PER_PS: f64 = 1000.0;

/// Converts a gradient (kcal/mol/Å) to kJ/mol/nm.
pub fn gradient_to_kj_per_nm(kcal_per_angstrom: f64) -> f64 {
    kcal_per_angstrom * KJ_PER_KCAL / NM_PER_ANGSTROM
}

/// Converts a harmonic force constant (kcal/mol/Å²) to kJ/mol/nm².
pub fn force_constant_to_kj_per_nm2(kcal_per_angstrom2: f64) -> f64 {
    kcal_per_angstrom2 * KJ_PER_KCAL / (NM_PER_ANGSTROM * NM_PER_ANGSTROM)
}

/// Converts a restraint constant for E = k·Δx² (kcal/mol/Å²) into the Gromacs
/// position-restraint constant for E = ½·k·Δx² (kJ/mol/nm²).
pub fn restraint_constant_to_gromacs_posre(kcal_per_angstrom2: f64) -> f64 {
    2.0 * force_constant_to_kj_per_nm2(kcal_per_angstrom2)
}

pub fn bar_to_atm(bar: f64) -> f64 {
    bar / BAR_PER_ATM
}

pub fn angstrom_to_nm(angstrom: f64) -> f64 {
    angstrom * NM_PER_ANGSTROM
}

pub fn fs_to_ps(fs: f64) -> f64 {
    fs / FS_PER_PS
}
