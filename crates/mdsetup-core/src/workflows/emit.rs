use super::layout::{FileRole, ProjectLayout, WriteFailure, WrittenFile};
use crate::core::models::metadata::SolvationMetadata;
use crate::core::models::production::ProductionRun;
use crate::core::models::protocol::{ProtocolModel, ValidationError};
use crate::core::models::stage::{Stage, StageKind};
use crate::engine::adapter::{EngineAdapter, EngineSettings, adapter_for};
use crate::engine::error::RenderError;
use crate::engine::kind::{Engine, UnsupportedEngineError};
use crate::engine::progress::{Progress, ProgressReporter};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    UnsupportedEngine(#[from] UnsupportedEngineError),

    #[error(transparent)]
    Metadata(RenderError),

    #[error("Invalid production run: {0}")]
    Production(#[source] ValidationError),

    #[error("Failed to render stage {ordinal} ({kind}): {source}")]
    Render {
        ordinal: usize,
        kind: StageKind,
        source: RenderError,
    },

    #[error("Failed to render driver script: {0}")]
    Driver(#[source] RenderError),

    #[error("Failed to render production driver script: {0}")]
    ProductionDriver(#[source] RenderError),

    #[error(transparent)]
    Write(#[from] WriteFailure),
}

impl EmitError {
    /// The adapter error behind this failure, if rendering failed.
    pub fn render_error(&self) -> Option<&RenderError> {
        match self {
            EmitError::Metadata(e) | EmitError::Driver(e) | EmitError::ProductionDriver(e) => {
                Some(e)
            }
            EmitError::Render { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Which group of generated files an emission writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputSelection {
    /// Equilibration stage decks only.
    Equilibration,
    /// The production deck only.
    Production,
    /// Both driver scripts, without any deck.
    Scripts,
    #[default]
    All,
}

#[derive(Debug, Error)]
#[error("Unknown output type '{0}'; expected one of: equil, prod, scripts, all")]
pub struct UnknownOutputSelection(pub String);

impl OutputSelection {
    fn equilibration_decks(self) -> bool {
        matches!(self, Self::Equilibration | Self::All)
    }

    fn production_deck(self) -> bool {
        matches!(self, Self::Production | Self::All)
    }

    fn drivers(self) -> bool {
        matches!(self, Self::Scripts | Self::All)
    }
}

impl FromStr for OutputSelection {
    type Err = UnknownOutputSelection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "equil" | "equilibration" => Ok(Self::Equilibration),
            "prod" | "production" => Ok(Self::Production),
            "scripts" => Ok(Self::Scripts),
            "all" => Ok(Self::All),
            _ => Err(UnknownOutputSelection(s.to_string())),
        }
    }
}

impl fmt::Display for OutputSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Equilibration => "equil",
            Self::Production => "prod",
            Self::Scripts => "scripts",
            Self::All => "all",
        };
        f.write_str(name)
    }
}

/// What [`emit_project`] writes beyond the protocol itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitOptions {
    pub selection: OutputSelection,
    /// Production files are skipped when absent.
    pub production: Option<ProductionRun>,
}

/// Renders `protocol` for the engine named by `engine` and writes every file through `layout`.
///
/// Stage files are written in ordinal order, followed by the driver script. If a stage
/// fails to render, the stage files already written stay in place and no driver script
/// is written.
#[instrument(skip_all, name = "emit_workflow", fields(engine = %engine))]
pub fn emit(
    protocol: &ProtocolModel,
    engine: &str,
    metadata: &SolvationMetadata,
    settings: &EngineSettings,
    layout: &dyn ProjectLayout,
    reporter: &ProgressReporter,
) -> Result<Vec<WrittenFile>, EmitError> {
    let engine: Engine = engine.parse()?;
    emit_for_engine(protocol, engine, metadata, settings, layout, reporter)
}

/// [`emit`] for an already-resolved engine.
pub fn emit_for_engine(
    protocol: &ProtocolModel,
    engine: Engine,
    metadata: &SolvationMetadata,
    settings: &EngineSettings,
    layout: &dyn ProjectLayout,
    reporter: &ProgressReporter,
) -> Result<Vec<WrittenFile>, EmitError> {
    let options = EmitOptions::default();
    run_emission(protocol, engine, metadata, settings, &options, layout, reporter)
}

/// Writes the equilibration decks, the production deck and both driver scripts, limited
/// to `options.selection`.
///
/// Every selected deck is written before any driver script, so a failed run never leaves
/// a driver that refers to a missing deck.
#[instrument(skip_all, name = "emit_project_workflow", fields(engine = %engine, selection = %options.selection))]
pub fn emit_project(
    protocol: &ProtocolModel,
    engine: &str,
    metadata: &SolvationMetadata,
    settings: &EngineSettings,
    options: &EmitOptions,
    layout: &dyn ProjectLayout,
    reporter: &ProgressReporter,
) -> Result<Vec<WrittenFile>, EmitError> {
    let engine: Engine = engine.parse()?;
    run_emission(protocol, engine, metadata, settings, options, layout, reporter)
}

fn run_emission(
    protocol: &ProtocolModel,
    engine: Engine,
    metadata: &SolvationMetadata,
    settings: &EngineSettings,
    options: &EmitOptions,
    layout: &dyn ProjectLayout,
    reporter: &ProgressReporter,
) -> Result<Vec<WrittenFile>, EmitError> {
    let adapter = adapter_for(engine, settings);
    let selection = options.selection;

    reporter.report(Progress::PhaseStart {
        name: "Validating metadata",
    });
    adapter.check_metadata(metadata).map_err(EmitError::Metadata)?;
    if let Some(run) = &options.production {
        run.validate_after(protocol).map_err(EmitError::Production)?;
    }
    reporter.report(Progress::PhaseFinish);

    let production = options.production.as_ref();
    let driver_destination = layout.driver_destination(adapter.driver_file_name());
    info!(
        "Emitting {} stage(s) for {} alongside {:?} (output: {})",
        protocol.len(),
        engine,
        driver_destination,
        selection
    );

    let mut written = Vec::new();
    let stage_file_names: Vec<String> = protocol
        .stages()
        .iter()
        .map(|stage| adapter.stage_file_name(stage))
        .collect();

    let mut deck_count = 0;
    if selection.equilibration_decks() {
        deck_count += protocol.len();
    }
    if selection.production_deck() && production.is_some() {
        deck_count += 1;
    }
    if deck_count > 0 {
        reporter.report(Progress::StagesStart {
            total: deck_count as u64,
        });
        if selection.equilibration_decks() {
            for (stage, file_name) in protocol.stages().iter().zip(&stage_file_names) {
                let destination = layout.stage_destination(stage.ordinal, stage.kind, file_name);
                written.push(write_deck(
                    adapter.as_ref(),
                    stage,
                    metadata,
                    layout,
                    &destination,
                    reporter,
                )?);
            }
        }
        if let Some(run) = production.filter(|_| selection.production_deck()) {
            let stage = run.stage();
            let destination = layout.production_destination(&adapter.stage_file_name(&stage));
            written.push(write_deck(
                adapter.as_ref(),
                &stage,
                metadata,
                layout,
                &destination,
                reporter,
            )?);
        }
        reporter.report(Progress::StagesFinish);
    }

    if selection.drivers() {
        reporter.report(Progress::PhaseStart {
            name: "Writing driver scripts",
        });
        let driver = adapter
            .render_driver(protocol, metadata, &stage_file_names)
            .map_err(EmitError::Driver)?;
        written.push(layout.write(&driver_destination, &driver, FileRole::Driver)?);

        if let (Some(run), Some(last)) = (production, protocol.stages().last()) {
            let equilibrated = layout
                .equilibration_from_production()
                .join(last.file_stem());
            let production_file_name = adapter.stage_file_name(&run.stage());
            let script = adapter
                .render_production_driver(run, metadata, &production_file_name, &equilibrated)
                .map_err(EmitError::ProductionDriver)?;
            let destination = layout.production_destination(adapter.production_driver_file_name());
            written.push(layout.write(&destination, &script, FileRole::Driver)?);
        }
        reporter.report(Progress::PhaseFinish);
    }

    info!("Wrote {} file(s)", written.len());
    Ok(written)
}

fn write_deck(
    adapter: &dyn EngineAdapter,
    stage: &Stage,
    metadata: &SolvationMetadata,
    layout: &dyn ProjectLayout,
    destination: &Path,
    reporter: &ProgressReporter,
) -> Result<WrittenFile, EmitError> {
    let text = adapter
        .render_stage(stage, metadata)
        .map_err(|source| EmitError::Render {
            ordinal: stage.ordinal,
            kind: stage.kind,
            source,
        })?;
    let file = layout.write(
        destination,
        &text,
        FileRole::Stage {
            ordinal: stage.ordinal,
            kind: stage.kind,
        },
    )?;
    reporter.report(Progress::StageWritten {
        ordinal: stage.ordinal,
        file_name: adapter.stage_file_name(stage),
    });
    Ok(file)
}
