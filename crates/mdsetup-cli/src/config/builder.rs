use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::{AppConfig, ProtocolSource};
use crate::cli::CreateArgs;
use crate::error::{CliError, Result};
use mdsetup::core::models::protocol::DefaultProtocolParameters;
use mdsetup::core::models::selection::AtomSelection;
use mdsetup::engine::adapter::EngineSettings;
use mdsetup::workflows::emit::OutputSelection;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

const MIN_CHARMM_FORCE_FIELD: u32 = 22;

pub fn build_config(args: &CreateArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };
    if args.protocol.is_some() {
        check_recipe_unused(args, file_config.recipe.is_some())?;
    }
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let engine = args
        .engine
        .clone()
        .or(file_config.engine.take())
        .unwrap_or(defaults.engine.clone());
    let output_root = args
        .outdir
        .clone()
        .or(file_config.outdir.take())
        .unwrap_or(defaults.outdir.clone());
    let prefix = args
        .prefix
        .clone()
        .or(file_config.prefix.take())
        .or_else(|| directory_name(&output_root))
        .unwrap_or(defaults.prefix.clone());

    let protocol = match &args.protocol {
        Some(path) => ProtocolSource::File(path.clone()),
        None => ProtocolSource::Recipe(merge_recipe(args, &file_config, &defaults)?),
    };

    let output = match args.output_type.as_deref().or(file_config.output.as_deref()) {
        Some(text) => text
            .parse::<OutputSelection>()
            .map_err(|e| CliError::Argument(e.to_string()))?,
        None => OutputSelection::default(),
    };
    let production_file = file_config.production.take().unwrap_or_default();
    let production_picoseconds = args
        .prod_time
        .or(production_file.picoseconds)
        .unwrap_or(defaults.production_picoseconds);
    let production_segments = args
        .segments
        .or(production_file.segments)
        .unwrap_or(defaults.production_segments);

    let amber_file = file_config.amber.take().unwrap_or_default();
    let charmm_file = file_config.charmm.take().unwrap_or_default();
    let charmm_force_field = args
        .ff
        .or(charmm_file.force_field)
        .unwrap_or(defaults.charmm_force_field);
    if charmm_force_field < MIN_CHARMM_FORCE_FIELD {
        return Err(CliError::Config(format!(
            "CHARMM force field {} is not supported; the minimum is {}",
            charmm_force_field, MIN_CHARMM_FORCE_FIELD
        )));
    }

    let settings = EngineSettings {
        prefix,
        executable: args.executable.clone().or(file_config.executable.take()),
        amber_home: args.amberhome.clone().or(amber_file.home),
        charmm_toppar: args
            .toppar
            .clone()
            .or(charmm_file.toppar)
            .unwrap_or(defaults.charmm_toppar.clone()),
        charmm_force_field,
    };
    debug!("Resolved engine settings: {:?}", settings);

    Ok(AppConfig {
        metadata_path: args.metadata.clone(),
        output_root,
        engine,
        protocol,
        settings,
        output,
        production_picoseconds,
        production_segments,
    })
}

/// A protocol file replaces the recipe, so recipe values would be silently lost.
fn check_recipe_unused(args: &CreateArgs, file_has_recipe: bool) -> Result<()> {
    if let Some(key) = args
        .set_values
        .iter()
        .filter_map(|kv| kv.split_once('=').map(|(key, _)| key.trim()))
        .find(|key| key.starts_with("recipe."))
    {
        return Err(CliError::Config(format!(
            "'{}' cannot be set together with --protocol; the protocol file replaces the recipe",
            key
        )));
    }
    if file_has_recipe {
        warn!(
            "Ignoring the [recipe] table of {:?}: --protocol replaces the built-in recipe",
            args.config.as_deref().unwrap_or(Path::new(""))
        );
    }
    Ok(())
}

fn merge_recipe(
    args: &CreateArgs,
    file_config: &FileConfig,
    defaults: &DefaultsConfig,
) -> Result<DefaultProtocolParameters> {
    let recipe_file = file_config.recipe.clone().unwrap_or_default();
    let base = DefaultProtocolParameters::default();

    let atom_selection = match args.selection.as_deref().or(recipe_file.selection.as_deref()) {
        Some(text) => text
            .parse::<AtomSelection>()
            .map_err(|e| CliError::Argument(e.to_string()))?,
        None => defaults.selection,
    };

    Ok(DefaultProtocolParameters {
        global_temperature: args
            .temp2
            .or(recipe_file.final_temperature)
            .unwrap_or(defaults.final_temperature),
        initial_temperature: args
            .temp1
            .or(recipe_file.initial_temperature)
            .unwrap_or(defaults.initial_temperature),
        atom_selection,
        minimization_steps: recipe_file
            .minimization_steps
            .unwrap_or(base.minimization_steps),
        stage_picoseconds: recipe_file
            .stage_picoseconds
            .unwrap_or(base.stage_picoseconds),
        timestep_fs: recipe_file.timestep_fs.unwrap_or(base.timestep_fs),
        pressure_bar: recipe_file.pressure.unwrap_or(base.pressure_bar),
        initial_force_constant: args
            .force
            .or(recipe_file.force_constant)
            .unwrap_or(defaults.force_constant),
        decay_factor: args
            .decay
            .or(recipe_file.decay_factor)
            .unwrap_or(defaults.decay_factor),
        ..base
    })
}

/// Name of the project directory, used as the default title prefix.
fn directory_name(path: &Path) -> Option<String> {
    let resolved = if path.as_os_str().is_empty() || path == Path::new(".") {
        std::env::current_dir().ok()?
    } else {
        path.to_path_buf()
    };
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();

        match key {
            "engine" => config.engine = Some(value_str.trim().to_string()),
            "prefix" => config.prefix = Some(value_str.to_string()),
            "outdir" => config.outdir = Some(PathBuf::from(value_str.trim())),
            "executable" => config.executable = Some(value_str.trim().to_string()),
            "recipe.initial-temperature" => {
                config
                    .recipe
                    .get_or_insert_with(Default::default)
                    .initial_temperature = Some(parse_value(key, value_str, "float")?);
            }
            "recipe.final-temperature" => {
                config
                    .recipe
                    .get_or_insert_with(Default::default)
                    .final_temperature = Some(parse_value(key, value_str, "float")?);
            }
            "recipe.force-constant" => {
                config.recipe.get_or_insert_with(Default::default).force_constant =
                    Some(parse_value(key, value_str, "float")?);
            }
            "recipe.decay-factor" => {
                config.recipe.get_or_insert_with(Default::default).decay_factor =
                    Some(parse_value(key, value_str, "float")?);
            }
            "recipe.selection" => {
                config.recipe.get_or_insert_with(Default::default).selection =
                    Some(value_str.trim().to_string());
            }
            "recipe.minimization-steps" => {
                config
                    .recipe
                    .get_or_insert_with(Default::default)
                    .minimization_steps = Some(parse_value(key, value_str, "integer")?);
            }
            "recipe.stage-picoseconds" => {
                config
                    .recipe
                    .get_or_insert_with(Default::default)
                    .stage_picoseconds = Some(parse_value(key, value_str, "float")?);
            }
            "recipe.timestep-fs" => {
                config.recipe.get_or_insert_with(Default::default).timestep_fs =
                    Some(parse_value(key, value_str, "float")?);
            }
            "recipe.pressure" => {
                config.recipe.get_or_insert_with(Default::default).pressure =
                    Some(parse_value(key, value_str, "float")?);
            }
            "output" => config.output = Some(value_str.trim().to_string()),
            "production.picoseconds" => {
                config.production.get_or_insert_with(Default::default).picoseconds =
                    Some(parse_value(key, value_str, "float")?);
            }
            "production.segments" => {
                config.production.get_or_insert_with(Default::default).segments =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "amber.home" => {
                config.amber.get_or_insert_with(Default::default).home =
                    Some(PathBuf::from(value_str.trim()));
            }
            "charmm.toppar" => {
                config.charmm.get_or_insert_with(Default::default).toppar =
                    Some(PathBuf::from(value_str.trim()));
            }
            "charmm.force-field" => {
                config.charmm.get_or_insert_with(Default::default).force_field =
                    Some(parse_value(key, value_str, "integer")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn base_create_args() -> CreateArgs {
        CreateArgs {
            metadata: PathBuf::from("system.toml"),
            outdir: Some(PathBuf::from("/work/lysozyme")),
            ..Default::default()
        }
    }

    fn recipe(config: &AppConfig) -> &DefaultProtocolParameters {
        match &config.protocol {
            ProtocolSource::Recipe(params) => params,
            other => panic!("expected recipe, got {:?}", other),
        }
    }

    #[test]
    fn defaults_fill_everything_not_given() {
        let app = build_config(&base_create_args()).expect("build ok");
        let defaults = DefaultsConfig::default();

        assert_eq!(app.engine, "amber");
        assert_eq!(app.output_root, PathBuf::from("/work/lysozyme"));
        assert_eq!(app.settings.prefix, "lysozyme");
        assert_eq!(app.settings.charmm_toppar, defaults.charmm_toppar);
        assert_eq!(app.settings.charmm_force_field, 36);
        assert_eq!(recipe(&app), &DefaultProtocolParameters::default());
        assert_eq!(app.output, OutputSelection::All);
        assert_eq!(app.production_picoseconds, defaults.production_picoseconds);
        assert_eq!(app.production_segments, defaults.production_segments);
    }

    #[test]
    fn output_type_and_production_layer_like_other_values() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("mdsetup.toml");
        fs::write(
            &cfg_path,
            "output = \"scripts\"\n[production]\npicoseconds = 250.0\nsegments = 8\n",
        )
        .unwrap();

        let mut args = base_create_args();
        args.config = Some(cfg_path);
        let app = build_config(&args).expect("build ok");
        assert_eq!(app.output, OutputSelection::Scripts);
        assert_eq!(app.production_picoseconds, 250.0);
        assert_eq!(app.production_segments, 8);

        args.set_values = vec!["production.segments=3".to_string()];
        args.output_type = Some("equil".to_string());
        args.prod_time = Some(100.0);
        let app = build_config(&args).expect("build ok");
        assert_eq!(app.output, OutputSelection::Equilibration);
        assert_eq!(app.production_picoseconds, 100.0);
        assert_eq!(app.production_segments, 3);
    }

    #[test]
    fn unknown_output_type_is_an_argument_error() {
        let mut args = base_create_args();
        args.output_type = Some("everything".to_string());
        assert!(matches!(build_config(&args), Err(CliError::Argument(_))));
    }

    #[test]
    fn recipe_set_values_are_rejected_with_protocol_file() {
        let mut args = base_create_args();
        args.protocol = Some(PathBuf::from("custom.toml"));
        args.set_values = vec![
            "prefix=lyso".to_string(),
            "recipe.force-constant=20".to_string(),
        ];
        match build_config(&args) {
            Err(CliError::Config(message)) => {
                assert!(message.contains("recipe.force-constant"));
                assert!(message.contains("--protocol"));
            }
            other => panic!("unexpected result: {:?}", other.map(|c| c.engine)),
        }

        args.set_values = vec!["production.segments=2".to_string()];
        assert!(build_config(&args).is_ok());
    }

    #[test]
    fn recipe_table_is_ignored_with_protocol_file() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("mdsetup.toml");
        fs::write(&cfg_path, "[recipe]\nforce-constant = 80.0\n").unwrap();

        let mut args = base_create_args();
        args.config = Some(cfg_path);
        args.protocol = Some(PathBuf::from("custom.toml"));
        let app = build_config(&args).expect("recipe table only warns");
        assert_eq!(
            app.protocol,
            ProtocolSource::File(PathBuf::from("custom.toml"))
        );
    }

    #[test]
    fn file_values_are_merged() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("mdsetup.toml");
        fs::write(
            &cfg_path,
            r#"
            engine = "charmm"
            prefix = "hen-lysozyme"
            executable = "charmm-openmm"

            [recipe]
            final-temperature = 310.0
            force-constant = 80.0
            selection = "backbone"
            stage-picoseconds = 50.0

            [charmm]
            toppar = "/opt/toppar"
            force-field = 27
            "#,
        )
        .unwrap();

        let mut args = base_create_args();
        args.config = Some(cfg_path);
        let app = build_config(&args).expect("build ok");

        assert_eq!(app.engine, "charmm");
        assert_eq!(app.settings.prefix, "hen-lysozyme");
        assert_eq!(app.settings.executable.as_deref(), Some("charmm-openmm"));
        assert_eq!(app.settings.charmm_toppar, PathBuf::from("/opt/toppar"));
        assert_eq!(app.settings.charmm_force_field, 27);
        let params = recipe(&app);
        assert_eq!(params.global_temperature, 310.0);
        assert_eq!(params.initial_force_constant, 80.0);
        assert_eq!(params.atom_selection, AtomSelection::Backbone);
        assert_eq!(params.stage_picoseconds, 50.0);
        assert_eq!(params.initial_temperature, 100.0);
    }

    #[test]
    fn cli_overrides_file_values() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("mdsetup.toml");
        fs::write(
            &cfg_path,
            "engine = \"charmm\"\n[recipe]\nfinal-temperature = 310.0\n",
        )
        .unwrap();

        let mut args = base_create_args();
        args.config = Some(cfg_path);
        args.engine = Some("gmx".to_string());
        args.temp2 = Some(298.0);
        args.selection = Some("residues:1-129".to_string());

        let app = build_config(&args).expect("build ok");
        assert_eq!(app.engine, "gmx");
        let params = recipe(&app);
        assert_eq!(params.global_temperature, 298.0);
        assert_eq!(
            params.atom_selection,
            AtomSelection::Residues {
                first: 1,
                last: 129
            }
        );
    }

    #[test]
    fn set_values_override_file() {
        let mut args = base_create_args();
        args.set_values = vec![
            "recipe.force-constant=20".to_string(),
            "recipe.decay-factor=0.25".to_string(),
            "charmm.force-field=36".to_string(),
            "amber.home=/opt/amber24".to_string(),
        ];
        let app = build_config(&args).expect("build ok");
        let params = recipe(&app);
        assert_eq!(params.initial_force_constant, 20.0);
        assert_eq!(params.decay_factor, 0.25);
        assert_eq!(app.settings.amber_home, Some(PathBuf::from("/opt/amber24")));
    }

    #[test]
    fn invalid_set_values_are_rejected() {
        let mut args = base_create_args();
        args.set_values = vec!["recipe.force-constant".to_string()];
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));

        args.set_values = vec!["recipe.force-constant=strong".to_string()];
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));

        args.set_values = vec!["optimization.num-solutions=3".to_string()];
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));
    }

    #[test]
    fn old_force_field_from_file_is_rejected() {
        let mut args = base_create_args();
        args.set_values = vec!["charmm.force-field=19".to_string()];
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));
    }

    #[test]
    fn invalid_selection_is_an_argument_error() {
        let mut args = base_create_args();
        args.selection = Some("sidechains".to_string());
        assert!(matches!(build_config(&args), Err(CliError::Argument(_))));
    }

    #[test]
    fn protocol_file_replaces_recipe() {
        let mut args = base_create_args();
        args.protocol = Some(PathBuf::from("custom.toml"));
        let app = build_config(&args).expect("build ok");
        assert_eq!(
            app.protocol,
            ProtocolSource::File(PathBuf::from("custom.toml"))
        );
    }

    #[test]
    fn unknown_file_keys_are_reported_with_path() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("mdsetup.toml");
        fs::write(&cfg_path, "simulator = \"namd\"\n").unwrap();
        let mut args = base_create_args();
        args.config = Some(cfg_path.clone());
        match build_config(&args) {
            Err(CliError::FileParsing { path, .. }) => assert_eq!(path, cfg_path),
            other => panic!("unexpected result: {:?}", other.map(|c| c.engine)),
        }
    }
}
