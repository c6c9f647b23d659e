//! Gromacs adapter: a `.mdp` parameter file per stage and a driver that preprocesses
//! (`grompp`) and then runs (`mdrun`) every stage.
//!
//! Position restraints live in the topology's `posre` includes, so only the restraint
//! groups toggled by `POSRES_FC_BB` and `POSRES_FC_SC` can be selected.

use super::adapter::{
    EngineAdapter, EngineSettings, check_stage_count, driver_header, file_stem, format_real,
    round_to, shell_quote, write_segment_loop_end, write_segment_loop_start,
};
use super::error::RenderError;
use super::kind::Engine;
use crate::core::models::metadata::{BoxDimensions, MetadataKey, SolvationMetadata};
use crate::core::models::production::ProductionRun;
use crate::core::models::protocol::ProtocolModel;
use crate::core::models::selection::AtomSelection;
use crate::core::models::stage::{DEFAULT_TIMESTEP_FS, Restraint, Stage, TemperatureControl};
use crate::core::units::{
    angstrom_to_nm, fs_to_ps, gradient_to_kj_per_nm, restraint_constant_to_gromacs_posre,
};
use std::fmt::{self, Write};
use std::path::Path;
use tracing::debug;

const DEFAULT_EXECUTABLE: &str = "gmx";
const REQUIRED_KEYS: &[MetadataKey] = &[
    MetadataKey::TopologyPath,
    MetadataKey::CoordinatePath,
    MetadataKey::WaterModel,
    MetadataKey::Ions,
    MetadataKey::BoxDimensions,
];
const COMPRESSED_OUTPUT_FREQUENCY: u64 = 5000;
const ENERGY_OUTPUT_FREQUENCY: u64 = 500;

#[derive(Debug, Clone)]
pub struct GromacsAdapter {
    settings: EngineSettings,
}

fn param(out: &mut String, key: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(out, "{:<24} = {}", key, value)
}

impl GromacsAdapter {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Preprocessor defines that switch on the requested position restraints.
    ///
    /// `posre` includes apply `½·k·Δx²`, so the constant is doubled on top of the
    /// unit conversion.
    pub fn restraint_defines(&self, restraint: &Restraint) -> Result<String, RenderError> {
        let k = format_real(round_to(
            restraint_constant_to_gromacs_posre(restraint.force_constant),
            6,
        ));
        let (backbone, side_chain) = match restraint.applies_to {
            AtomSelection::SoluteHeavyAtoms => (k.clone(), k),
            AtomSelection::Backbone => (k, format_real(0.0)),
            other => {
                return Err(RenderError::UnsupportedSelection {
                    selection: other,
                    engine: Engine::Gromacs,
                    reason: "only solute-heavy and backbone restraint groups are available \
                             through POSRES defines"
                        .to_string(),
                });
            }
        };
        Ok(format!(
            "-DPOSRES -DPOSRES_FC_BB={} -DPOSRES_FC_SC={}",
            backbone, side_chain
        ))
    }

    fn write_header(&self, out: &mut String, stage: &Stage, cell: &BoxDimensions) -> fmt::Result {
        let [a, b, c] = cell.lengths.map(angstrom_to_nm);
        let [alpha, beta, gamma] = cell.angles;
        writeln!(out, "; {}: {}", self.settings.prefix, stage.title())?;
        writeln!(
            out,
            "; box {:.3} x {:.3} x {:.3} nm, angles {:.2} {:.2} {:.2}",
            a, b, c, alpha, beta, gamma
        )?;
        out.push('\n');
        Ok(())
    }

    fn write_nonbonded(&self, out: &mut String) -> fmt::Result {
        param(out, "cutoff-scheme", "Verlet")?;
        param(out, "nstlist", 20)?;
        param(out, "pbc", "xyz")?;
        param(out, "coulombtype", "PME")?;
        param(out, "rcoulomb", "1.0")?;
        param(out, "vdwtype", "Cut-off")?;
        param(out, "rvdw", "1.0")?;
        param(out, "DispCorr", "EnerPres")
    }

    fn write_minimization(&self, out: &mut String, stage: &Stage) -> fmt::Result {
        param(out, "integrator", "steep")?;
        param(out, "nsteps", stage.duration.steps())?;
        if let Some(threshold) = stage.convergence_threshold {
            // steep stops on the largest force component, not on the RMS gradient.
            writeln!(
                out,
                "; emtol is a maximum-force criterion, converted from an RMS gradient of {} kcal/mol/A",
                format_real(threshold)
            )?;
            param(
                out,
                "emtol",
                format_real(round_to(gradient_to_kj_per_nm(threshold), 6)),
            )?;
        }
        param(out, "emstep", "0.01")
    }

    fn write_dynamics(&self, out: &mut String, stage: &Stage) -> fmt::Result {
        let timestep_ps = fs_to_ps(stage.duration.timestep_fs().unwrap_or(DEFAULT_TIMESTEP_FS));
        let temperature = stage
            .temperature
            .unwrap_or(TemperatureControl::Constant(0.0));

        param(out, "integrator", "md")?;
        param(out, "dt", format_real(timestep_ps))?;
        param(out, "nsteps", stage.duration.steps())?;
        param(out, "nstxout-compressed", COMPRESSED_OUTPUT_FREQUENCY)?;
        param(out, "nstenergy", ENERGY_OUTPUT_FREQUENCY)?;
        param(out, "nstlog", ENERGY_OUTPUT_FREQUENCY)?;
        param(
            out,
            "continuation",
            if stage.continues_dynamics() { "yes" } else { "no" },
        )?;
        param(out, "constraints", "h-bonds")?;
        param(out, "constraint-algorithm", "lincs")?;
        out.push('\n');

        param(out, "tcoupl", "V-rescale")?;
        param(out, "tc-grps", "System")?;
        param(out, "tau-t", "0.1")?;
        param(out, "ref-t", format_real(temperature.target()))?;
        if stage.generates_velocities() {
            param(out, "gen-vel", "yes")?;
            param(out, "gen-temp", format_real(temperature.initial()))?;
            param(out, "gen-seed", -1)?;
        } else {
            param(out, "gen-vel", "no")?;
        }
        if let TemperatureControl::Ramp { start, end } = temperature {
            let span = stage.duration.picoseconds_total().unwrap_or(0.0);
            param(out, "annealing", "single")?;
            param(out, "annealing-npoints", 2)?;
            param(
                out,
                "annealing-time",
                format!("{} {}", format_real(0.0), format_real(span)),
            )?;
            param(
                out,
                "annealing-temp",
                format!("{} {}", format_real(start), format_real(end)),
            )?;
        }
        out.push('\n');

        match &stage.pressure {
            Some(pressure) => {
                param(out, "pcoupl", "C-rescale")?;
                param(out, "pcoupltype", "isotropic")?;
                param(out, "tau-p", "2.0")?;
                param(out, "ref-p", format_real(pressure.target_bar))?;
                param(out, "compressibility", "4.5e-5")?;
                if stage.restraint.is_some() {
                    param(out, "refcoord-scaling", "com")?;
                }
                Ok(())
            }
            None => param(out, "pcoupl", "no"),
        }
    }

    fn write_driver_preamble(
        &self,
        out: &mut String,
        metadata: &SolvationMetadata,
    ) -> Result<(), RenderError> {
        let (Some(topology), Some(coordinates)) = (metadata.topology(), metadata.coordinates())
        else {
            return Err(RenderError::MissingMetadata {
                key: MetadataKey::TopologyPath,
                engine: Engine::Gromacs,
            });
        };
        let executable = self
            .settings
            .executable
            .as_deref()
            .unwrap_or(DEFAULT_EXECUTABLE);

        writeln!(out, "GMX={}", shell_quote(Path::new(executable)))?;
        writeln!(out, "TOPOLOGY={}", shell_quote(topology))?;
        writeln!(out, "REFERENCE={}", shell_quote(coordinates))?;
        out.push('\n');
        Ok(())
    }
}

impl EngineAdapter for GromacsAdapter {
    fn engine(&self) -> Engine {
        Engine::Gromacs
    }

    fn file_extension(&self) -> &'static str {
        "mdp"
    }

    fn required_metadata_keys(&self) -> &'static [MetadataKey] {
        REQUIRED_KEYS
    }

    fn render_stage(
        &self,
        stage: &Stage,
        metadata: &SolvationMetadata,
    ) -> Result<String, RenderError> {
        self.check_metadata(metadata)?;
        let cell = metadata.box_dimensions.ok_or(RenderError::MissingMetadata {
            key: MetadataKey::BoxDimensions,
            engine: Engine::Gromacs,
        })?;
        debug!("Rendering Gromacs parameters for stage {}", stage.ordinal);

        let mut out = String::new();
        self.write_header(&mut out, stage, &cell)?;
        if let Some(restraint) = &stage.restraint {
            param(&mut out, "define", self.restraint_defines(restraint)?)?;
        }
        if stage.kind.is_dynamics() {
            self.write_dynamics(&mut out, stage)?;
        } else {
            self.write_minimization(&mut out, stage)?;
        }
        out.push('\n');
        self.write_nonbonded(&mut out)?;
        Ok(out)
    }

    fn render_driver(
        &self,
        protocol: &ProtocolModel,
        metadata: &SolvationMetadata,
        stage_file_names: &[String],
    ) -> Result<String, RenderError> {
        self.check_metadata(metadata)?;
        check_stage_count(protocol, stage_file_names)?;

        let mut out = driver_header(&self.settings.prefix, Engine::Gromacs);
        self.write_driver_preamble(&mut out, metadata)?;

        let mut previous: Option<&str> = None;
        for (stage, file_name) in protocol.stages().iter().zip(stage_file_names) {
            let stem = file_stem(file_name);
            let input = previous.map_or_else(
                || "\"${REFERENCE}\"".to_string(),
                |prev| format!("{prev}.gro"),
            );
            let mut grompp = format!("\"${{GMX}}\" grompp -f {file_name} -c {input}");
            if stage.restraint.is_some() {
                grompp.push_str(" -r \"${REFERENCE}\"");
            }
            if stage.continues_dynamics() {
                if let Some(prev) = previous {
                    grompp.push_str(&format!(" -t {prev}.cpt"));
                }
            }
            grompp.push_str(&format!(" -p \"${{TOPOLOGY}}\" -o {stem}.tpr"));

            writeln!(out, "echo \"{}\"", stage.title())?;
            writeln!(out, "{}", grompp)?;
            writeln!(out, "\"${{GMX}}\" mdrun -deffnm {stem}")?;
            previous = Some(stem);
        }
        Ok(out)
    }

    fn render_production_driver(
        &self,
        run: &ProductionRun,
        metadata: &SolvationMetadata,
        production_file_name: &str,
        equilibrated: &Path,
    ) -> Result<String, RenderError> {
        self.check_metadata(metadata)?;

        let mut out = driver_header(&self.settings.prefix, Engine::Gromacs);
        self.write_driver_preamble(&mut out, metadata)?;
        write_segment_loop_start(&mut out, run, production_file_name, equilibrated)?;
        writeln!(
            out,
            "    \"${{GMX}}\" grompp -f {production_file_name} -c \"${{PREVIOUS}}.gro\" -t \"${{PREVIOUS}}.cpt\" -p \"${{TOPOLOGY}}\" -o \"${{name}}.tpr\""
        )?;
        writeln!(out, "    \"${{GMX}}\" mdrun -deffnm \"${{name}}\"")?;
        write_segment_loop_end(&mut out)?;
        Ok(out)
    }
}
