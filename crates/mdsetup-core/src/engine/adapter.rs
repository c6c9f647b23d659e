use super::amber::AmberAdapter;
use super::charmm::CharmmAdapter;
use super::error::RenderError;
use super::gromacs::GromacsAdapter;
use super::kind::Engine;
use super::names;
use crate::core::models::metadata::{MetadataKey, SolvationMetadata};
use crate::core::models::production::ProductionRun;
use crate::core::models::protocol::ProtocolModel;
use crate::core::models::selection::AtomSelection;
use crate::core::models::stage::Stage;
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};

pub const DRIVER_FILE_NAME: &str = "run_equil.sh";
pub const PRODUCTION_DRIVER_FILE_NAME: &str = "run_prod.sh";
pub const DEFAULT_CHARMM_TOPPAR: &str = "/opt/local/charmm/toppar";
pub const DEFAULT_CHARMM_FORCE_FIELD: u32 = 36;

/// Engine-facing options that are not part of the protocol itself.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Title written into the header of every generated file.
    pub prefix: String,
    /// Overrides the engine's default executable.
    pub executable: Option<String>,
    /// Amber installation; the driver falls back to `$AMBERHOME` at run time.
    pub amber_home: Option<PathBuf>,
    pub charmm_toppar: PathBuf,
    pub charmm_force_field: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            prefix: "mdsetup".to_string(),
            executable: None,
            amber_home: None,
            charmm_toppar: PathBuf::from(DEFAULT_CHARMM_TOPPAR),
            charmm_force_field: DEFAULT_CHARMM_FORCE_FIELD,
        }
    }
}

/// Translates protocol stages into one engine's native input text.
///
/// Implementations never touch the filesystem; the returned text is handed to a
/// [`ProjectLayout`](crate::workflows::layout::ProjectLayout) by the emitter.
pub trait EngineAdapter: Send + Sync {
    fn engine(&self) -> Engine;

    fn file_extension(&self) -> &'static str;

    fn required_metadata_keys(&self) -> &'static [MetadataKey];

    fn driver_file_name(&self) -> &'static str {
        DRIVER_FILE_NAME
    }

    fn production_driver_file_name(&self) -> &'static str {
        PRODUCTION_DRIVER_FILE_NAME
    }

    /// Emitted file name of a stage: `{ordinal:02}_{kind}.{ext}`.
    fn stage_file_name(&self, stage: &Stage) -> String {
        format!("{}.{}", stage.file_stem(), self.file_extension())
    }

    /// Fails with the first required key absent from `metadata`.
    fn check_metadata(&self, metadata: &SolvationMetadata) -> Result<(), RenderError> {
        match self
            .required_metadata_keys()
            .iter()
            .find(|key| !metadata.has(**key))
        {
            Some(&key) => Err(RenderError::MissingMetadata {
                key,
                engine: self.engine(),
            }),
            None => Ok(()),
        }
    }

    fn render_stage(&self, stage: &Stage, metadata: &SolvationMetadata)
    -> Result<String, RenderError>;

    /// Renders the script that runs every stage file in order.
    ///
    /// `stage_file_names` must hold one emitted name per protocol stage, in ordinal order.
    fn render_driver(
        &self,
        protocol: &ProtocolModel,
        metadata: &SolvationMetadata,
        stage_file_names: &[String],
    ) -> Result<String, RenderError>;

    /// Renders the script that runs every production segment from one deck.
    ///
    /// `equilibrated` is the output stem of the last equilibration stage, relative to the
    /// directory the production deck is written to.
    fn render_production_driver(
        &self,
        run: &ProductionRun,
        metadata: &SolvationMetadata,
        production_file_name: &str,
        equilibrated: &Path,
    ) -> Result<String, RenderError>;
}

pub fn adapter_for(engine: Engine, settings: &EngineSettings) -> Box<dyn EngineAdapter> {
    match engine {
        Engine::Amber => Box::new(AmberAdapter::new(settings.clone())),
        Engine::Charmm => Box::new(CharmmAdapter::new(settings.clone())),
        Engine::Gromacs => Box::new(GromacsAdapter::new(settings.clone())),
    }
}

/// Engine-native residue names of the solvent and the added ions.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SolventNames {
    pub water: &'static str,
    pub ions: Vec<&'static str>,
}

impl SolventNames {
    pub fn all(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.water).chain(self.ions.iter().copied())
    }
}

/// Resolves the native solvent and ion residue names a selection depends on.
pub(crate) fn solvent_names(
    engine: Engine,
    selection: AtomSelection,
    metadata: &SolvationMetadata,
) -> Result<SolventNames, RenderError> {
    let water_model = metadata
        .water_model
        .as_deref()
        .ok_or(RenderError::MissingMetadata {
            key: MetadataKey::WaterModel,
            engine,
        })?;
    let water = names::water_residue(engine, water_model).ok_or_else(|| {
        RenderError::UnsupportedSelection {
            selection,
            engine,
            reason: format!("water model '{}' has no {} residue name", water_model, engine),
        }
    })?;

    let mut ions: Vec<&'static str> = Vec::new();
    for species in metadata.ion_species() {
        let native = names::ion_residue(engine, species).ok_or_else(|| {
            RenderError::UnsupportedSelection {
                selection,
                engine,
                reason: format!("ion species '{}' has no {} residue name", species, engine),
            }
        })?;
        if !ions.contains(&native) {
            ions.push(native);
        }
    }

    Ok(SolventNames { water, ions })
}

pub(crate) fn check_stage_count(
    protocol: &ProtocolModel,
    stage_file_names: &[String],
) -> Result<(), RenderError> {
    if protocol.len() != stage_file_names.len() {
        return Err(RenderError::StageCountMismatch {
            expected: protocol.len(),
            found: stage_file_names.len(),
        });
    }
    Ok(())
}

/// Writes a real with at least one decimal so engines never read it as an integer.
pub(crate) fn format_real(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Rounds away floating-point noise left by unit conversions.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

pub(crate) fn file_stem(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem)
}

/// Single-quotes a path for a POSIX shell.
pub(crate) fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

pub(crate) fn driver_header(prefix: &str, engine: Engine) -> String {
    format!(
        "#!/usr/bin/env bash\n\
         # {prefix}: {engine} driver generated by mdsetup\n\
         set -euo pipefail\n\
         cd \"$(dirname \"$0\")\"\n\n"
    )
}

/// Opens the bash loop over production segments; `${name}` is the segment's output stem
/// and `${PREVIOUS}` the stem it continues from.
pub(crate) fn write_segment_loop_start(
    out: &mut String,
    run: &ProductionRun,
    production_file_name: &str,
    equilibrated: &Path,
) -> fmt::Result {
    writeln!(out, "PREVIOUS={}", shell_quote(equilibrated))?;
    writeln!(out, "for segment in $(seq 1 {}); do", run.segments)?;
    writeln!(
        out,
        "    name=\"$(printf '%s_%03d' '{}' \"${{segment}}\")\"",
        file_stem(production_file_name)
    )?;
    writeln!(
        out,
        "    echo \"{}, segment ${{segment}} of {}\"",
        run.stage().title(),
        run.segments
    )
}

pub(crate) fn write_segment_loop_end(out: &mut String) -> fmt::Result {
    writeln!(out, "    PREVIOUS=\"${{name}}\"")?;
    writeln!(out, "done")
}
