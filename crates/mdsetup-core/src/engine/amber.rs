//! Amber (`pmemd`) adapter: one `&cntrl` namelist per stage and a sequential driver
//! that hands each stage's restart file to the next.

use super::adapter::{
    EngineAdapter, EngineSettings, SolventNames, check_stage_count, driver_header, file_stem,
    format_real, shell_quote, solvent_names, write_segment_loop_end, write_segment_loop_start,
};
use super::error::RenderError;
use super::kind::Engine;
use crate::core::models::metadata::{MetadataKey, SolvationMetadata};
use crate::core::models::production::ProductionRun;
use crate::core::models::protocol::ProtocolModel;
use crate::core::models::selection::AtomSelection;
use crate::core::models::stage::{DEFAULT_TIMESTEP_FS, Stage, TemperatureControl};
use crate::core::units::fs_to_ps;
use std::fmt::Write;
use std::path::Path;
use tracing::debug;

const DEFAULT_EXECUTABLE: &str = "pmemd.cuda";
const REQUIRED_KEYS: &[MetadataKey] = &[
    MetadataKey::TopologyPath,
    MetadataKey::CoordinatePath,
    MetadataKey::WaterModel,
    MetadataKey::Ions,
];
const NONBONDED_CUTOFF: f64 = 10.0;
const LANGEVIN_COLLISION_FREQUENCY: f64 = 2.0;
const PRINT_FREQUENCY: u64 = 500;

#[derive(Debug, Clone)]
pub struct AmberAdapter {
    settings: EngineSettings,
}

impl AmberAdapter {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Translates an abstract selection into an Amber mask.
    pub fn mask(
        &self,
        selection: AtomSelection,
        metadata: &SolvationMetadata,
    ) -> Result<String, RenderError> {
        let residue_list = |names: &SolventNames| names.all().collect::<Vec<_>>().join(",");
        let mask = match selection {
            AtomSelection::Solute => {
                let names = solvent_names(Engine::Amber, selection, metadata)?;
                format!("!:{}", residue_list(&names))
            }
            AtomSelection::SoluteHeavyAtoms => {
                let names = solvent_names(Engine::Amber, selection, metadata)?;
                format!("!:{} & !@H=", residue_list(&names))
            }
            AtomSelection::Backbone => "@N,CA,C,O".to_string(),
            AtomSelection::Residues { first, last } => format!(":{}-{}", first, last),
            AtomSelection::Solvent => {
                let names = solvent_names(Engine::Amber, selection, metadata)?;
                format!(":{}", names.water)
            }
        };
        Ok(mask)
    }

    fn executable(&self) -> String {
        let name = self
            .settings
            .executable
            .as_deref()
            .unwrap_or(DEFAULT_EXECUTABLE);
        if name.contains('/') {
            shell_quote(Path::new(name))
        } else {
            format!("\"${{AMBERHOME}}/bin/{}\"", name)
        }
    }

    fn write_restraint(
        &self,
        out: &mut String,
        stage: &Stage,
        metadata: &SolvationMetadata,
    ) -> Result<(), RenderError> {
        if let Some(restraint) = &stage.restraint {
            let mask = self.mask(restraint.applies_to, metadata)?;
            writeln!(out, "  ntr = 1,")?;
            writeln!(
                out,
                "  restraint_wt = {},",
                format_real(restraint.force_constant)
            )?;
            writeln!(out, "  restraintmask = '{}',", mask)?;
        }
        Ok(())
    }

    fn render_minimization(
        &self,
        stage: &Stage,
        metadata: &SolvationMetadata,
    ) -> Result<String, RenderError> {
        let steps = stage.duration.steps();
        let mut out = String::new();
        writeln!(out, "{}: {}", self.settings.prefix, stage.title())?;
        writeln!(out, " &cntrl")?;
        writeln!(out, "  imin = 1,")?;
        writeln!(out, "  maxcyc = {},", steps)?;
        writeln!(out, "  ncyc = {},", steps / 2)?;
        if let Some(threshold) = stage.convergence_threshold {
            writeln!(out, "  drms = {},", format_real(threshold))?;
        }
        writeln!(out, "  ntb = 1,")?;
        writeln!(out, "  cut = {},", format_real(NONBONDED_CUTOFF))?;
        writeln!(out, "  ntpr = 50,")?;
        self.write_restraint(&mut out, stage, metadata)?;
        writeln!(out, " /")?;
        Ok(out)
    }

    fn render_dynamics(
        &self,
        stage: &Stage,
        metadata: &SolvationMetadata,
    ) -> Result<String, RenderError> {
        let steps = stage.duration.steps();
        let timestep_ps = fs_to_ps(stage.duration.timestep_fs().unwrap_or(DEFAULT_TIMESTEP_FS));
        let temperature = stage
            .temperature
            .unwrap_or(TemperatureControl::Constant(0.0));
        let (irest, ntx) = if stage.generates_velocities() {
            (0, 1)
        } else {
            (1, 5)
        };

        let mut out = String::new();
        writeln!(out, "{}: {}", self.settings.prefix, stage.title())?;
        writeln!(out, " &cntrl")?;
        writeln!(out, "  imin = 0,")?;
        writeln!(out, "  irest = {}, ntx = {},", irest, ntx)?;
        writeln!(out, "  nstlim = {}, dt = {},", steps, format_real(timestep_ps))?;
        writeln!(out, "  ntc = 2, ntf = 2,")?;
        writeln!(out, "  cut = {},", format_real(NONBONDED_CUTOFF))?;
        match &stage.pressure {
            Some(pressure) => {
                writeln!(out, "  ntb = 2, ntp = 1, barostat = 2,")?;
                writeln!(
                    out,
                    "  pres0 = {}, taup = 2.0,",
                    format_real(pressure.target_bar)
                )?;
            }
            None => writeln!(out, "  ntb = 1,")?,
        }
        writeln!(
            out,
            "  ntt = 3, gamma_ln = {}, ig = -1,",
            format_real(LANGEVIN_COLLISION_FREQUENCY)
        )?;
        if stage.generates_velocities() {
            writeln!(out, "  tempi = {},", format_real(temperature.initial()))?;
        }
        writeln!(out, "  temp0 = {},", format_real(temperature.target()))?;
        writeln!(
            out,
            "  ntpr = {}, ntwx = {}, ntwr = {},",
            PRINT_FREQUENCY, PRINT_FREQUENCY, PRINT_FREQUENCY
        )?;
        writeln!(out, "  iwrap = 1,")?;
        if temperature.is_ramp() {
            writeln!(out, "  nmropt = 1,")?;
        }
        self.write_restraint(&mut out, stage, metadata)?;
        writeln!(out, " /")?;

        if let TemperatureControl::Ramp { start, end } = temperature {
            writeln!(
                out,
                " &wt type = 'TEMP0', istep1 = 0, istep2 = {}, value1 = {}, value2 = {}, /",
                steps,
                format_real(start),
                format_real(end)
            )?;
            writeln!(out, " &wt type = 'END', /")?;
        }
        Ok(out)
    }

    /// Shell variables shared by the equilibration and production drivers.
    fn write_driver_preamble(
        &self,
        out: &mut String,
        metadata: &SolvationMetadata,
    ) -> Result<(), RenderError> {
        let (Some(topology), Some(coordinates)) = (metadata.topology(), metadata.coordinates())
        else {
            return Err(RenderError::MissingMetadata {
                key: MetadataKey::TopologyPath,
                engine: Engine::Amber,
            });
        };
        match &self.settings.amber_home {
            Some(home) => writeln!(out, "export AMBERHOME={}", shell_quote(home))?,
            None => writeln!(
                out,
                "export AMBERHOME=\"${{AMBERHOME:?AMBERHOME must be set}}\""
            )?,
        }
        writeln!(out, "PMEMD={}", self.executable())?;
        writeln!(out, "TOPOLOGY={}", shell_quote(topology))?;
        writeln!(out, "REFERENCE={}", shell_quote(coordinates))?;
        out.push('\n');
        Ok(())
    }
}

impl EngineAdapter for AmberAdapter {
    fn engine(&self) -> Engine {
        Engine::Amber
    }

    fn file_extension(&self) -> &'static str {
        "in"
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
        debug!("Rendering Amber input for stage {}", stage.ordinal);
        if stage.kind.is_dynamics() {
            self.render_dynamics(stage, metadata)
        } else {
            self.render_minimization(stage, metadata)
        }
    }

    fn render_driver(
        &self,
        protocol: &ProtocolModel,
        metadata: &SolvationMetadata,
        stage_file_names: &[String],
    ) -> Result<String, RenderError> {
        self.check_metadata(metadata)?;
        check_stage_count(protocol, stage_file_names)?;

        let mut out = driver_header(&self.settings.prefix, Engine::Amber);
        self.write_driver_preamble(&mut out, metadata)?;

        let mut previous_restart: Option<String> = None;
        for (stage, file_name) in protocol.stages().iter().zip(stage_file_names) {
            let stem = file_stem(file_name);
            let input_coordinates = previous_restart
                .as_deref()
                .map_or_else(|| "\"${REFERENCE}\"".to_string(), str::to_string);
            writeln!(out, "echo \"{}\"", stage.title())?;
            let mut command = format!(
                "\"${{PMEMD}}\" -O -i {file_name} -o {stem}.out -p \"${{TOPOLOGY}}\" -c {input_coordinates} -r {stem}.rst7 -inf {stem}.mdinfo"
            );
            if stage.kind.is_dynamics() {
                command.push_str(&format!(" -x {stem}.nc"));
            }
            if stage.restraint.is_some() {
                command.push_str(" -ref \"${REFERENCE}\"");
            }
            writeln!(out, "{}", command)?;
            previous_restart = Some(format!("{stem}.rst7"));
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

        let mut out = driver_header(&self.settings.prefix, Engine::Amber);
        self.write_driver_preamble(&mut out, metadata)?;
        write_segment_loop_start(&mut out, run, production_file_name, equilibrated)?;
        writeln!(
            out,
            "    \"${{PMEMD}}\" -O -i {production_file_name} -o \"${{name}}.out\" -p \"${{TOPOLOGY}}\" -c \"${{PREVIOUS}}.rst7\" -r \"${{name}}.rst7\" -x \"${{name}}.nc\" -inf \"${{name}}.mdinfo\""
        )?;
        write_segment_loop_end(&mut out)?;
        Ok(out)
    }
}
