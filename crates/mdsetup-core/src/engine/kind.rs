use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Unsupported engine '{name}': expected one of amber, charmm, gromacs")]
pub struct UnsupportedEngineError {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    Amber,
    Charmm,
    Gromacs,
}

impl Engine {
    pub const ALL: [Engine; 3] = [Engine::Amber, Engine::Charmm, Engine::Gromacs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Amber => "amber",
            Engine::Charmm => "charmm",
            Engine::Gromacs => "gromacs",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = UnsupportedEngineError;

    /// Parses an engine identifier case-insensitively; `gmx` is accepted for Gromacs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amber" => Ok(Engine::Amber),
            "charmm" => Ok(Engine::Charmm),
            "gromacs" | "gmx" => Ok(Engine::Gromacs),
            _ => Err(UnsupportedEngineError {
                name: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_identifiers() {
        assert_eq!("amber".parse(), Ok(Engine::Amber));
        assert_eq!("CHARMM".parse(), Ok(Engine::Charmm));
        assert_eq!("gromacs".parse(), Ok(Engine::Gromacs));
        assert_eq!("gmx".parse(), Ok(Engine::Gromacs));
    }

    #[test]
    fn unknown_identifier_is_named_in_error() {
        let err = "vasp".parse::<Engine>().unwrap_err();
        assert_eq!(err.name, "vasp");
        assert!(err.to_string().contains("'vasp'"));
    }

    #[test]
    fn display_matches_canonical_identifier() {
        for engine in Engine::ALL {
            assert_eq!(engine.to_string().parse(), Ok(engine));
        }
    }
}
