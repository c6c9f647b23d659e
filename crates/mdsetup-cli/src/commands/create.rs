use crate::cli::CreateArgs;
use crate::config::builder::build_config;
use crate::config::models::{AppConfig, ProtocolSource};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use mdsetup::core::io::{metadata_file, protocol_file};
use mdsetup::core::models::production::ProductionRun;
use mdsetup::core::models::protocol::{ProtocolModel, build_protocol};
use mdsetup::core::models::stage::StageKind;
use mdsetup::engine::progress::ProgressReporter;
use mdsetup::workflows::emit::{self, EmitOptions};
use mdsetup::workflows::layout::{DirectoryLayout, FileRole, WrittenFile};
use tracing::info;

pub fn run(args: CreateArgs) -> Result<()> {
    let config = build_config(&args)?;
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Preparing {} inputs (output: {})...",
        config.engine, config.output
    );
    let written = execute(&config, &reporter)?;

    for file in &written {
        match file.role {
            FileRole::Stage {
                kind: StageKind::Production,
                ..
            } => println!("  Production input: {}", file.path.display()),
            FileRole::Stage { ordinal, kind } => {
                println!("  Stage {:02} ({}): {}", ordinal, kind, file.path.display())
            }
            FileRole::Driver => println!("  Driver script: {}", file.path.display()),
        }
    }
    Ok(())
}

fn load_protocol(config: &AppConfig) -> Result<ProtocolModel> {
    let protocol = match &config.protocol {
        ProtocolSource::Recipe(params) => {
            info!(
                "Building the default protocol at {} K with '{}' restraints",
                params.global_temperature, params.atom_selection
            );
            build_protocol(params)?
        }
        ProtocolSource::File(path) => {
            info!("Loading protocol from {:?}", path);
            protocol_file::load(path)?
        }
    };
    Ok(protocol)
}

/// Loads inputs, then emits the selected stage files, production input and drivers.
pub fn execute(config: &AppConfig, reporter: &ProgressReporter) -> Result<Vec<WrittenFile>> {
    let protocol = load_protocol(config)?;
    info!("Loading solvation metadata from {:?}", config.metadata_path);
    let metadata = metadata_file::load(&config.metadata_path)?;

    let production = ProductionRun {
        segment_picoseconds: config.production_picoseconds,
        segments: config.production_segments,
        ..ProductionRun::following(&protocol)
    };
    info!(
        "Production: {} segment(s) of {} ps",
        production.segments, production.segment_picoseconds
    );
    let options = EmitOptions {
        selection: config.output,
        production: Some(production),
    };

    let layout = DirectoryLayout::new(&config.output_root);
    let written = emit::emit_project(
        &protocol,
        &config.engine,
        &metadata,
        &config.settings,
        &options,
        &layout,
        reporter,
    )?;
    info!(
        "Wrote {} file(s) under {:?}",
        written.len(),
        layout.root()
    );
    Ok(written)
}
