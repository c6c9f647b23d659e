use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An engine-independent description of the atoms a positional restraint applies to.
///
/// Adapters translate this into native mask or selection syntax and report an
/// unsupported-selection error when the target engine cannot express it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AtomSelection {
    /// Every atom that is neither water nor an added ion.
    Solute,
    /// Solute atoms excluding hydrogens.
    #[default]
    SoluteHeavyAtoms,
    /// Protein backbone atoms (N, CA, C, O).
    Backbone,
    /// An inclusive range of residue numbers, 1-based.
    Residues { first: u32, last: u32 },
    /// Water molecules only.
    Solvent,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SelectionParseError {
    #[error("Unknown atom selection '{0}'")]
    Unknown(String),
    #[error("Invalid residue range '{0}': expected 'residues:FIRST-LAST' with 1 <= FIRST <= LAST")]
    InvalidRange(String),
}

impl AtomSelection {
    /// Whether the selection is defined relative to the solvent and ion residues, so that
    /// rendering it needs the engine-native names for the water model and ion species.
    pub fn depends_on_solvent_names(&self) -> bool {
        matches!(
            self,
            AtomSelection::Solute | AtomSelection::SoluteHeavyAtoms | AtomSelection::Solvent
        )
    }
}

impl fmt::Display for AtomSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomSelection::Solute => write!(f, "solute"),
            AtomSelection::SoluteHeavyAtoms => write!(f, "solute-heavy"),
            AtomSelection::Backbone => write!(f, "backbone"),
            AtomSelection::Residues { first, last } => write!(f, "residues:{}-{}", first, last),
            AtomSelection::Solvent => write!(f, "solvent"),
        }
    }
}

impl FromStr for AtomSelection {
    type Err = SelectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "solute" => return Ok(AtomSelection::Solute),
            "solute-heavy" | "heavy" => return Ok(AtomSelection::SoluteHeavyAtoms),
            "backbone" => return Ok(AtomSelection::Backbone),
            "solvent" | "water" => return Ok(AtomSelection::Solvent),
            _ => {}
        }

        let Some(range) = trimmed.strip_prefix("residues:") else {
            return Err(SelectionParseError::Unknown(trimmed.to_string()));
        };
        let invalid = || SelectionParseError::InvalidRange(trimmed.to_string());
        let (first, last) = range.split_once('-').ok_or_else(invalid)?;
        let first: u32 = first.trim().parse().map_err(|_| invalid())?;
        let last: u32 = last.trim().parse().map_err(|_| invalid())?;
        if first == 0 || first > last {
            return Err(invalid());
        }
        Ok(AtomSelection::Residues { first, last })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_selections_case_insensitively() {
        assert_eq!("solute".parse(), Ok(AtomSelection::Solute));
        assert_eq!(" Solute-Heavy ".parse(), Ok(AtomSelection::SoluteHeavyAtoms));
        assert_eq!("BACKBONE".parse(), Ok(AtomSelection::Backbone));
        assert_eq!("water".parse(), Ok(AtomSelection::Solvent));
    }

    #[test]
    fn parses_residue_ranges() {
        assert_eq!(
            "residues:1-124".parse(),
            Ok(AtomSelection::Residues {
                first: 1,
                last: 124
            })
        );
        assert_eq!(
            "residues:7-7".parse(),
            Ok(AtomSelection::Residues { first: 7, last: 7 })
        );
    }

    #[test]
    fn rejects_malformed_residue_ranges() {
        for bad in ["residues:10-2", "residues:0-5", "residues:a-b", "residues:12"] {
            assert!(
                matches!(
                    bad.parse::<AtomSelection>(),
                    Err(SelectionParseError::InvalidRange(_))
                ),
                "'{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            "ligand".parse::<AtomSelection>(),
            Err(SelectionParseError::Unknown("ligand".to_string()))
        );
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let selections = [
            AtomSelection::Solute,
            AtomSelection::SoluteHeavyAtoms,
            AtomSelection::Backbone,
            AtomSelection::Residues { first: 3, last: 9 },
            AtomSelection::Solvent,
        ];
        for selection in selections {
            assert_eq!(selection.to_string().parse(), Ok(selection));
        }
    }

    #[test]
    fn default_selection_is_solute_heavy_atoms() {
        assert_eq!(AtomSelection::default(), AtomSelection::SoluteHeavyAtoms);
    }
}
