//! CHARMM adapter: a command stream per stage with stage-to-stage handoff through
//! command-line variables (`incrd`, `inrst`, `refcrd`, `out`).

use super::adapter::{
    EngineAdapter, EngineSettings, check_stage_count, driver_header, file_stem, format_real,
    round_to, shell_quote, solvent_names, write_segment_loop_end, write_segment_loop_start,
};
use super::error::RenderError;
use super::kind::Engine;
use crate::core::models::metadata::{BoxDimensions, CellShape, MetadataKey, SolvationMetadata};
use crate::core::models::production::ProductionRun;
use crate::core::models::protocol::ProtocolModel;
use crate::core::models::selection::AtomSelection;
use crate::core::models::stage::{DEFAULT_TIMESTEP_FS, Stage, TemperatureControl};
use crate::core::units::{bar_to_atm, fs_to_ps};
use std::fmt::{self, Write};
use std::path::Path;
use tracing::debug;

const DEFAULT_EXECUTABLE: &str = "charmm";
const REQUIRED_KEYS: &[MetadataKey] = &[
    MetadataKey::TopologyPath,
    MetadataKey::CoordinatePath,
    MetadataKey::WaterModel,
    MetadataKey::Ions,
    MetadataKey::BoxDimensions,
];
const HEATING_INTERVAL: u64 = 500;
const SAVE_FREQUENCY: u64 = 500;
const WATER_IONS_STREAM: &str = "toppar_water_ions.str";

#[derive(Debug, Clone)]
pub struct CharmmAdapter {
    settings: EngineSettings,
}

impl CharmmAdapter {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Protein topology and parameter files for the configured force-field generation.
    pub fn force_field_files(&self) -> (&'static str, &'static str) {
        if self.settings.charmm_force_field >= 36 {
            ("top_all36_prot.rtf", "par_all36m_prot.prm")
        } else {
            ("top_all22_prot.rtf", "par_all22_prot.prm")
        }
    }

    /// Translates an abstract selection into a CHARMM `sele ... end` body.
    pub fn selection(
        &self,
        selection: AtomSelection,
        metadata: &SolvationMetadata,
    ) -> Result<String, RenderError> {
        let solvent_clause = |names: &[&str]| {
            names
                .iter()
                .map(|n| format!("resname {}", n))
                .collect::<Vec<_>>()
                .join(" .or. ")
        };
        let text = match selection {
            AtomSelection::Solute => {
                let names = solvent_names(Engine::Charmm, selection, metadata)?;
                format!(
                    ".not. ( {} )",
                    solvent_clause(&names.all().collect::<Vec<_>>())
                )
            }
            AtomSelection::SoluteHeavyAtoms => {
                let names = solvent_names(Engine::Charmm, selection, metadata)?;
                format!(
                    ".not. ( {} ) .and. .not. hydrogen",
                    solvent_clause(&names.all().collect::<Vec<_>>())
                )
            }
            AtomSelection::Backbone => "type N .or. type CA .or. type C .or. type O".to_string(),
            AtomSelection::Residues { first, last } => format!("resid {}:{}", first, last),
            AtomSelection::Solvent => {
                let names = solvent_names(Engine::Charmm, selection, metadata)?;
                format!("resname {}", names.water)
            }
        };
        Ok(text)
    }

    fn write_header(
        &self,
        out: &mut String,
        stage: &Stage,
        metadata: &SolvationMetadata,
    ) -> fmt::Result {
        let toppar = self.settings.charmm_toppar.to_string_lossy();
        let (rtf, prm) = self.force_field_files();
        writeln!(out, "* {}: {}", self.settings.prefix, stage.title())?;
        writeln!(out, "*")?;
        out.push('\n');
        writeln!(out, "bomlev -2")?;
        writeln!(out, "prnlev 5")?;
        out.push('\n');
        writeln!(out, "! Force field")?;
        writeln!(out, "read rtf card name \"{}/{}\"", toppar, rtf)?;
        writeln!(out, "read param card flex name \"{}/{}\"", toppar, prm)?;
        writeln!(out, "stream \"{}/{}\"", toppar, WATER_IONS_STREAM)?;
        out.push('\n');
        writeln!(out, "! System")?;
        if let Some(topology) = metadata.topology() {
            writeln!(out, "read psf card name \"{}\"", topology.to_string_lossy())?;
        }
        writeln!(out, "read coor card name @incrd")?;
        out.push('\n');
        Ok(())
    }

    fn write_periodic_boundary(&self, out: &mut String, cell: &BoxDimensions) -> fmt::Result {
        let shape = match cell.shape() {
            CellShape::Cubic => "cubic",
            CellShape::Orthorhombic => "orthorhombic",
            CellShape::Triclinic => "triclinic",
        };
        let [a, b, c] = cell.lengths;
        let [alpha, beta, gamma] = cell.angles;
        writeln!(out, "! Periodic boundary conditions")?;
        writeln!(
            out,
            "crystal define {} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4}",
            shape, a, b, c, alpha, beta, gamma
        )?;
        writeln!(out, "crystal build cutoff 14.0 noper 0")?;
        writeln!(out, "image byres xcen 0.0 ycen 0.0 zcen 0.0 sele all end")?;
        out.push('\n');
        writeln!(out, "nbonds atom vatom cdie eps 1.0 -")?;
        writeln!(out, "    elec ewald pmewald kappa 0.34 spline order 6 -")?;
        writeln!(
            out,
            "    fftx {} ffty {} fftz {} -",
            fft_grid_size(a),
            fft_grid_size(b),
            fft_grid_size(c)
        )?;
        writeln!(
            out,
            "    vdw vswitch cutnb 14.0 cutim 14.0 ctofnb 12.0 ctonnb 10.0"
        )?;
        out.push('\n');
        Ok(())
    }

    /// Restrains against the comparison set, loaded from the solvated coordinates.
    fn write_restraint(
        &self,
        out: &mut String,
        stage: &Stage,
        metadata: &SolvationMetadata,
    ) -> Result<(), RenderError> {
        if let Some(restraint) = &stage.restraint {
            let selection = self.selection(restraint.applies_to, metadata)?;
            writeln!(out, "! Positional restraint")?;
            writeln!(out, "read coor comp card name @refcrd")?;
            writeln!(
                out,
                "cons harm force {} comp sele {} end",
                format_real(restraint.force_constant),
                selection
            )?;
            out.push('\n');
        }
        Ok(())
    }

    fn write_minimization(&self, out: &mut String, stage: &Stage) -> fmt::Result {
        writeln!(out, "! Minimization")?;
        let mut command = format!("mini sd nstep {} nprint 50", stage.duration.steps());
        if let Some(threshold) = stage.convergence_threshold {
            command.push_str(&format!(" tolgrd {}", format_real(threshold)));
        }
        writeln!(out, "{}", command)?;
        out.push('\n');
        Ok(())
    }

    fn write_dynamics(&self, out: &mut String, stage: &Stage) -> fmt::Result {
        let steps = stage.duration.steps();
        let timestep_ps = fs_to_ps(stage.duration.timestep_fs().unwrap_or(DEFAULT_TIMESTEP_FS));
        let temperature = stage
            .temperature
            .unwrap_or(TemperatureControl::Constant(0.0));
        let start = stage.generates_velocities();

        writeln!(out, "! Dynamics")?;
        writeln!(out, "shake bonh param fast")?;
        if !start {
            writeln!(out, "open read card unit 30 name @inrst")?;
        }
        writeln!(out, "open write card unit 31 name @out.rst")?;
        writeln!(out, "open write file unit 32 name @out.dcd")?;
        out.push('\n');

        let coupled = stage.pressure.is_some() || !start;
        let mut options = vec![format!(
            "dyna {}leap {} nstep {} timestep {}",
            if coupled { "cpt " } else { "" },
            if start { "start" } else { "restart" },
            steps,
            format_real(timestep_ps)
        )];
        let restart_units = if start { "" } else { "iunrea 30 " };
        options.push(format!(
            "{}iunwri 31 iuncrd 32 nsavc {} nprint {} iprfrq {}",
            restart_units, SAVE_FREQUENCY, SAVE_FREQUENCY, steps
        ));

        if let TemperatureControl::Ramp { start: first, end } = temperature {
            let interval = HEATING_INTERVAL.min(steps).max(1);
            let increments = (steps / interval).max(1);
            let teminc = (end - first) / increments as f64;
            options.push(format!(
                "firstt {} finalt {} teminc {} ihtfrq {} ieqfrq 0",
                format_real(first),
                format_real(end),
                format_real(teminc),
                interval
            ));
            options.push("iasors 1 iasvel 1 iscvel 0 ichecw 0".to_string());
        } else {
            let target = format_real(temperature.target());
            options.push(format!("hoover reft {} tmass 1000.0 tbath {}", target, target));
        }

        if let Some(pressure) = &stage.pressure {
            options.push(format!(
                "pconst pref {} pmass 500.0 pgamma 20.0",
                format_real(round_to(bar_to_atm(pressure.target_bar), 6))
            ));
        }

        writeln!(out, "{}", options.join(" -\n    "))?;
        out.push('\n');
        Ok(())
    }

    fn executable(&self) -> &str {
        self.settings
            .executable
            .as_deref()
            .unwrap_or(DEFAULT_EXECUTABLE)
    }

    fn write_driver_preamble(
        &self,
        out: &mut String,
        metadata: &SolvationMetadata,
    ) -> Result<(), RenderError> {
        let coordinates = metadata.coordinates().ok_or(RenderError::MissingMetadata {
            key: MetadataKey::CoordinatePath,
            engine: Engine::Charmm,
        })?;
        writeln!(out, "CHARMM={}", shell_quote(Path::new(self.executable())))?;
        writeln!(out, "REFERENCE={}", shell_quote(coordinates))?;
        out.push('\n');
        Ok(())
    }
}

impl EngineAdapter for CharmmAdapter {
    fn engine(&self) -> Engine {
        Engine::Charmm
    }

    fn file_extension(&self) -> &'static str {
        "inp"
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
            engine: Engine::Charmm,
        })?;
        debug!("Rendering CHARMM input for stage {}", stage.ordinal);

        let mut out = String::new();
        self.write_header(&mut out, stage, metadata)?;
        self.write_periodic_boundary(&mut out, &cell)?;
        self.write_restraint(&mut out, stage, metadata)?;
        if stage.kind.is_dynamics() {
            self.write_dynamics(&mut out, stage)?;
        } else {
            self.write_minimization(&mut out, stage)?;
        }

        writeln!(out, "write coor card name @out.crd")?;
        writeln!(out, "* {}", stage.title())?;
        writeln!(out, "*")?;
        out.push('\n');
        writeln!(out, "stop")?;
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

        let mut out = driver_header(&self.settings.prefix, Engine::Charmm);
        self.write_driver_preamble(&mut out, metadata)?;

        let mut previous: Option<&str> = None;
        for (stage, file_name) in protocol.stages().iter().zip(stage_file_names) {
            let stem = file_stem(file_name);
            let incrd = previous.map_or_else(
                || "\"${REFERENCE}\"".to_string(),
                |prev| format!("{prev}.crd"),
            );
            let mut command =
                format!("\"${{CHARMM}}\" -i {file_name} -o {stem}.out incrd:{incrd}");
            if stage.continues_dynamics() {
                if let Some(prev) = previous {
                    command.push_str(&format!(" inrst:{prev}.rst"));
                }
            }
            if stage.restraint.is_some() {
                command.push_str(" refcrd:\"${REFERENCE}\"");
            }
            command.push_str(&format!(" out:{stem}"));
            writeln!(out, "echo \"{}\"", stage.title())?;
            writeln!(out, "{}", command)?;
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

        let mut out = driver_header(&self.settings.prefix, Engine::Charmm);
        self.write_driver_preamble(&mut out, metadata)?;
        write_segment_loop_start(&mut out, run, production_file_name, equilibrated)?;
        writeln!(
            out,
            "    \"${{CHARMM}}\" -i {production_file_name} -o \"${{name}}.out\" incrd:\"${{PREVIOUS}}.crd\" inrst:\"${{PREVIOUS}}.rst\" out:\"${{name}}\""
        )?;
        write_segment_loop_end(&mut out)?;
        Ok(out)
    }
}

/// Smallest PME grid dimension at 1 Å spacing whose prime factors are 2, 3 and 5.
fn fft_grid_size(length: f64) -> u32 {
    let mut n = length.ceil().max(1.0) as u32;
    loop {
        let mut m = n;
        for p in [2, 3, 5] {
            while m % p == 0 {
                m /= p;
            }
        }
        if m == 1 {
            return n;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::protocol::build_default_protocol;
    use crate::core::models::stage::{StageDuration, StageKind};
    use crate::engine::adapter::test_support::{complete_metadata, equilibrated};

    fn adapter() -> CharmmAdapter {
        CharmmAdapter::new(EngineSettings {
            prefix: "lysozyme".to_string(),
            ..Default::default()
        })
    }

    fn default_protocol() -> ProtocolModel {
        build_default_protocol(300.0, AtomSelection::SoluteHeavyAtoms).unwrap()
    }

    #[test]
    fn force_field_generation_selects_files() {
        assert_eq!(
            adapter().force_field_files(),
            ("top_all36_prot.rtf", "par_all36m_prot.prm")
        );
        let older = CharmmAdapter::new(EngineSettings {
            charmm_force_field: 27,
            ..Default::default()
        });
        assert_eq!(
            older.force_field_files(),
            ("top_all22_prot.rtf", "par_all22_prot.prm")
        );
    }

    #[test]
    fn selections_use_charmm_residue_names() {
        let metadata = complete_metadata();
        let charmm = adapter();
        assert_eq!(
            charmm
                .selection(AtomSelection::SoluteHeavyAtoms, &metadata)
                .unwrap(),
            ".not. ( resname TIP3 .or. resname CLA .or. resname SOD ) .and. .not. hydrogen"
        );
        assert_eq!(
            charmm
                .selection(AtomSelection::Residues { first: 3, last: 10 }, &metadata)
                .unwrap(),
            "resid 3:10"
        );
        assert_eq!(
            charmm.selection(AtomSelection::Solvent, &metadata).unwrap(),
            "resname TIP3"
        );
    }

    #[test]
    fn non_tip3p_water_cannot_be_selected() {
        let metadata = SolvationMetadata {
            water_model: Some("opc".to_string()),
            ..complete_metadata()
        };
        let err = adapter()
            .selection(AtomSelection::Solute, &metadata)
            .unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedSelection { .. }));
        // Backbone does not depend on solvent names.
        assert!(adapter().selection(AtomSelection::Backbone, &metadata).is_ok());
    }

    #[test]
    fn minimization_stage_contains_restraint_and_tolgrd() {
        let protocol = default_protocol();
        let text = adapter()
            .render_stage(&protocol.stages()[0], &complete_metadata())
            .unwrap();
        assert!(text.starts_with("* lysozyme: Stage 00: Energy minimization"));
        assert!(text.contains("read rtf card name \"/opt/local/charmm/toppar/top_all36_prot.rtf\""));
        assert!(text.contains("read psf card name \"/data/system.top\""));
        assert!(text.contains("crystal define cubic 64.0000 64.0000 64.0000 90.0000 90.0000 90.0000"));
        assert!(text.contains("fftx 64 ffty 64 fftz 64"));
        assert!(text.contains("cons harm force 100.0 comp sele .not. ( resname TIP3"));
        assert!(text.contains("mini sd nstep 500 nprint 50 tolgrd 0.25"));
        assert!(text.contains("write coor card name @out.crd"));
        assert!(text.trim_end().ends_with("stop"));
    }

    #[test]
    fn heating_stage_starts_dynamics_with_temperature_increments() {
        let protocol = default_protocol();
        let text = adapter()
            .render_stage(&protocol.stages()[2], &complete_metadata())
            .unwrap();
        assert!(text.contains("dyna leap start nstep 12500 timestep 0.002"));
        assert!(text.contains("firstt 100.0 finalt 300.0 teminc 8.0 ihtfrq 500 ieqfrq 0"));
        assert!(!text.contains("@inrst"));
        assert!(!text.contains("pconst"));
    }

    #[test]
    fn pressure_stage_restarts_with_pressure_in_atmospheres() {
        let protocol = default_protocol();
        let text = adapter()
            .render_stage(&protocol.stages()[3], &complete_metadata())
            .unwrap();
        assert!(text.contains("open read card unit 30 name @inrst"));
        assert!(text.contains("dyna cpt leap restart nstep 12500"));
        assert!(text.contains("hoover reft 300.0 tmass 1000.0 tbath 300.0"));
        assert!(text.contains("pconst pref 0.986923 pmass 500.0 pgamma 20.0"));
    }

    #[test]
    fn triclinic_box_is_defined_with_all_angles() {
        let mut metadata = complete_metadata();
        metadata.box_dimensions = Some(BoxDimensions {
            lengths: [80.0, 80.0, 80.0],
            angles: [109.4712, 109.4712, 109.4712],
        });
        let stage = Stage::dynamics(
            0,
            StageKind::HeatingRamp,
            StageDuration::picoseconds(10.0),
            TemperatureControl::Ramp {
                start: 0.0,
                end: 300.0,
            },
        );
        let text = adapter().render_stage(&stage, &metadata).unwrap();
        assert!(text.contains("crystal define triclinic 80.0000 80.0000 80.0000 109.4712"));
        assert!(text.contains("fftx 80 ffty 80 fftz 80"));
    }

    #[test]
    fn missing_box_is_reported() {
        let protocol = default_protocol();
        let metadata = SolvationMetadata {
            box_dimensions: None,
            ..complete_metadata()
        };
        assert_eq!(
            adapter().render_stage(&protocol.stages()[0], &metadata),
            Err(RenderError::MissingMetadata {
                key: MetadataKey::BoxDimensions,
                engine: Engine::Charmm,
            })
        );
    }

    #[test]
    fn driver_passes_coordinates_and_restarts_between_stages() {
        let protocol = default_protocol();
        let charmm = adapter();
        let names: Vec<String> = protocol
            .stages()
            .iter()
            .map(|s| charmm.stage_file_name(s))
            .collect();
        let driver = charmm
            .render_driver(&protocol, &complete_metadata(), &names)
            .unwrap();
        assert!(driver.contains("CHARMM='charmm'"));
        assert!(driver.contains(
            "\"${CHARMM}\" -i 00_minimization.inp -o 00_minimization.out incrd:\"${REFERENCE}\" refcrd:\"${REFERENCE}\" out:00_minimization"
        ));
        assert!(driver.contains(
            "-i 02_heating_ramp.inp -o 02_heating_ramp.out incrd:01_minimization.crd refcrd:\"${REFERENCE}\" out:02_heating_ramp"
        ));
        assert!(driver.contains(
            "incrd:02_heating_ramp.crd inrst:02_heating_ramp.rst refcrd:\"${REFERENCE}\" out:03_constant_pressure_relax"
        ));
        let positions: Vec<usize> = names
            .iter()
            .map(|n| driver.find(&format!("-i {}", n)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn restraints_target_the_solvated_reference_coordinates() {
        let protocol = default_protocol();
        let charmm = adapter();
        let metadata = complete_metadata();

        let restrained = charmm.render_stage(&protocol.stages()[0], &metadata).unwrap();
        let read_comp = restrained.find("read coor comp card name @refcrd").unwrap();
        let cons = restrained.find("cons harm force 100.0 comp sele").unwrap();
        assert!(restrained.find("read coor card name @incrd").unwrap() < read_comp);
        assert!(read_comp < cons);

        let free = charmm.render_stage(&protocol.stages()[1], &metadata).unwrap();
        assert!(!free.contains("@refcrd"));
        assert!(!free.contains("cons harm"));

        let names: Vec<String> = protocol
            .stages()
            .iter()
            .map(|s| charmm.stage_file_name(s))
            .collect();
        let driver = charmm.render_driver(&protocol, &metadata, &names).unwrap();
        let line_for = |name: &str| {
            driver
                .lines()
                .find(|l| l.contains(&format!("-i {}", name)))
                .unwrap()
                .to_string()
        };
        assert!(line_for("04_restrained_equilibration.inp").contains("refcrd:\"${REFERENCE}\""));
        assert!(!line_for("01_minimization.inp").contains("refcrd:"));
        assert!(!line_for("05_unrestrained_equilibration.inp").contains("refcrd:"));
    }

    #[test]
    fn production_driver_restarts_each_segment_from_the_previous_one() {
        let protocol = default_protocol();
        let run = ProductionRun::following(&protocol);
        let charmm = adapter();
        let deck = charmm.render_stage(&run.stage(), &complete_metadata()).unwrap();
        assert!(deck.contains("dyna cpt leap restart nstep 500000"));
        assert!(!deck.contains("cons harm"));

        let driver = charmm
            .render_production_driver(&run, &complete_metadata(), "06_production.inp", equilibrated())
            .unwrap();
        assert!(driver.contains("PREVIOUS='../Equil/05_unrestrained_equilibration'"));
        assert!(driver.contains(
            "-i 06_production.inp -o \"${name}.out\" incrd:\"${PREVIOUS}.crd\" inrst:\"${PREVIOUS}.rst\" out:\"${name}\""
        ));
        assert!(driver.contains("for segment in $(seq 1 10); do"));
    }

    #[test]
    fn fft_grid_size_rounds_up_to_smooth_numbers() {
        assert_eq!(fft_grid_size(64.0), 64);
        assert_eq!(fft_grid_size(62.3), 64);
        assert_eq!(fft_grid_size(77.0), 80);
        assert_eq!(fft_grid_size(97.0), 100);
    }
}
