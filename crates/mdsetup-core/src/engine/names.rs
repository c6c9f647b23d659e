use super::kind::Engine;
use phf::{Map, phf_map};

static AMBER_WATER_RESIDUES: Map<&'static str, &'static str> = phf_map! {
    "tip3p" => "WAT",
    "tip3pfb" => "WAT",
    "tip4p" => "WAT",
    "tip4pew" => "WAT",
    "tip4pfb" => "WAT",
    "tip5p" => "WAT",
    "spce" => "WAT",
    "opc" => "WAT",
    "opc3" => "WAT",
};

static CHARMM_WATER_RESIDUES: Map<&'static str, &'static str> = phf_map! {
    "tip3p" => "TIP3",
};

static GROMACS_WATER_RESIDUES: Map<&'static str, &'static str> = phf_map! {
    "tip3p" => "SOL",
    "tip4p" => "SOL",
    "tip4pew" => "SOL",
    "tip5p" => "SOL",
    "spc" => "SOL",
    "spce" => "SOL",
    "opc" => "SOL",
};

// Keys are the lowercase species names written by the solvation step.
static AMBER_ION_RESIDUES: Map<&'static str, &'static str> = phf_map! {
    "na+" => "Na+",
    "na" => "Na+",
    "sod" => "Na+",
    "k+" => "K+",
    "k" => "K+",
    "pot" => "K+",
    "cl-" => "Cl-",
    "cl" => "Cl-",
    "cla" => "Cl-",
    "li+" => "Li+",
    "mg2+" => "MG",
    "mg" => "MG",
    "ca2+" => "CA",
    "ca" => "CA",
    "zn2+" => "ZN",
    "zn" => "ZN",
};

static CHARMM_ION_RESIDUES: Map<&'static str, &'static str> = phf_map! {
    "na+" => "SOD",
    "na" => "SOD",
    "sod" => "SOD",
    "k+" => "POT",
    "k" => "POT",
    "pot" => "POT",
    "cl-" => "CLA",
    "cl" => "CLA",
    "cla" => "CLA",
    "li+" => "LIT",
    "mg2+" => "MG",
    "mg" => "MG",
    "ca2+" => "CAL",
    "ca" => "CAL",
    "zn2+" => "ZN2",
    "zn" => "ZN2",
};

static GROMACS_ION_RESIDUES: Map<&'static str, &'static str> = phf_map! {
    "na+" => "NA",
    "na" => "NA",
    "sod" => "NA",
    "k+" => "K",
    "k" => "K",
    "pot" => "K",
    "cl-" => "CL",
    "cl" => "CL",
    "cla" => "CL",
    "li+" => "LI",
    "mg2+" => "MG",
    "mg" => "MG",
    "ca2+" => "CA",
    "ca" => "CA",
    "zn2+" => "ZN",
    "zn" => "ZN",
};

/// Residue name an engine uses for the given water model, if it knows the model.
pub fn water_residue(engine: Engine, water_model: &str) -> Option<&'static str> {
    let table = match engine {
        Engine::Amber => &AMBER_WATER_RESIDUES,
        Engine::Charmm => &CHARMM_WATER_RESIDUES,
        Engine::Gromacs => &GROMACS_WATER_RESIDUES,
    };
    table
        .get(water_model.trim().to_ascii_lowercase().as_str())
        .copied()
}

/// Residue name an engine uses for the given ion species, if it knows the species.
pub fn ion_residue(engine: Engine, species: &str) -> Option<&'static str> {
    let table = match engine {
        Engine::Amber => &AMBER_ION_RESIDUES,
        Engine::Charmm => &CHARMM_ION_RESIDUES,
        Engine::Gromacs => &GROMACS_ION_RESIDUES,
    };
    table
        .get(species.trim().to_ascii_lowercase().as_str())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_residue_names_differ_per_engine() {
        assert_eq!(water_residue(Engine::Amber, "TIP3P"), Some("WAT"));
        assert_eq!(water_residue(Engine::Charmm, "tip3p"), Some("TIP3"));
        assert_eq!(water_residue(Engine::Gromacs, "tip3p"), Some("SOL"));
    }

    #[test]
    fn charmm_only_knows_tip3p() {
        assert_eq!(water_residue(Engine::Charmm, "opc"), None);
    }

    #[test]
    fn ion_aliases_resolve_to_native_names() {
        assert_eq!(ion_residue(Engine::Amber, "SOD"), Some("Na+"));
        assert_eq!(ion_residue(Engine::Charmm, "Na+"), Some("SOD"));
        assert_eq!(ion_residue(Engine::Charmm, "Cl-"), Some("CLA"));
        assert_eq!(ion_residue(Engine::Gromacs, "K+"), Some("K"));
        assert_eq!(ion_residue(Engine::Amber, "Xe"), None);
    }
}
