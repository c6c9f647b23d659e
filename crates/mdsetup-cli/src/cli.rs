use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Timothy H. Click",
    version,
    about = "mdsetup - Prepare staged equilibration inputs for Amber, CHARMM and Gromacs from a solvated, neutralized system.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the simulation project tree (Prep, Equil, Prod, Analysis, Scripts).
    Init(InitArgs),
    /// Write equilibration and production inputs plus their driver scripts for one engine.
    Create(CreateArgs),
}

/// Arguments for the `init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project root directory.
    #[arg(short, long = "outdir", value_name = "DIR", default_value = ".")]
    pub outdir: PathBuf,
}

/// Arguments for the `create` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct CreateArgs {
    // --- Core Arguments ---
    /// Solvation metadata file in TOML format (box, water model, ions, topology, coordinates).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub metadata: PathBuf,

    /// Simulation engine: amber, charmm or gromacs (gmx).
    #[arg(short, long, value_name = "ENGINE")]
    pub engine: Option<String>,

    /// Project root; files are written to its Equil and Prod subdirectories.
    #[arg(short = 'd', long, value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Title prefix written into every generated file.
    #[arg(short, long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Path to a CLI configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Protocol file replacing the built-in six-stage recipe.
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with_all = ["temp1", "temp2", "force", "decay", "selection"]
    )]
    pub protocol: Option<PathBuf>,

    /// Files to write: equil (stage decks), prod (production deck), scripts (drivers) or all.
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub output_type: Option<String>,

    // --- Recipe Overrides ---
    /// Initial temperature of the heating ramp (K).
    #[arg(long, value_name = "TEMP")]
    pub temp1: Option<f64>,

    /// Final temperature (K).
    #[arg(long, value_name = "TEMP")]
    pub temp2: Option<f64>,

    /// Initial restraint force constant (kcal/mol/A^2).
    #[arg(long, value_name = "FORCE")]
    pub force: Option<f64>,

    /// Restraint decay factor between restrained stages, in (0, 1).
    #[arg(long, value_name = "FACTOR")]
    pub decay: Option<f64>,

    /// Restraint selection: solute, solute-heavy, backbone, residues:FIRST-LAST or solvent.
    #[arg(long, value_name = "SELECTION")]
    pub selection: Option<String>,

    // --- Production Overrides ---
    /// Length of one production segment (ps).
    #[arg(long, value_name = "PS")]
    pub prod_time: Option<f64>,

    /// Number of chained production segments.
    #[arg(long, value_name = "COUNT")]
    pub segments: Option<u32>,

    // --- Engine Overrides ---
    /// CHARMM topology/parameter directory.
    #[arg(long, value_name = "DIR")]
    pub toppar: Option<PathBuf>,

    /// CHARMM force-field generation.
    #[arg(long, value_name = "FF", value_parser = clap::value_parser!(u32).range(22..))]
    pub ff: Option<u32>,

    /// Amber installation directory.
    #[arg(long, value_name = "DIR", env = "AMBERHOME")]
    pub amberhome: Option<PathBuf>,

    /// Engine executable to call from the driver script.
    #[arg(long, value_name = "PROGRAM")]
    pub executable: Option<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S recipe.force-constant=50
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_parses_flags() {
        let cli = Cli::try_parse_from([
            "mdsetup", "-vv", "create", "-m", "system.toml", "-e", "gmx", "--temp2", "310",
            "--ff", "36",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Create(args) = cli.command else {
            panic!("expected create");
        };
        assert_eq!(args.metadata, PathBuf::from("system.toml"));
        assert_eq!(args.engine.as_deref(), Some("gmx"));
        assert_eq!(args.temp2, Some(310.0));
        assert_eq!(args.ff, Some(36));
    }

    #[test]
    fn create_parses_output_type_and_production_options() {
        let cli = Cli::try_parse_from([
            "mdsetup", "create", "-m", "system.toml", "--type", "prod", "--prod-time", "500",
            "--segments", "4",
        ])
        .unwrap();
        let Commands::Create(args) = cli.command else {
            panic!("expected create");
        };
        assert_eq!(args.output_type.as_deref(), Some("prod"));
        assert_eq!(args.prod_time, Some(500.0));
        assert_eq!(args.segments, Some(4));
    }

    #[test]
    fn protocol_file_conflicts_with_recipe_flags() {
        let result = Cli::try_parse_from([
            "mdsetup",
            "create",
            "-m",
            "system.toml",
            "--protocol",
            "protocol.toml",
            "--force",
            "50",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn force_field_below_22_is_rejected() {
        let result = Cli::try_parse_from(["mdsetup", "create", "-m", "s.toml", "--ff", "19"]);
        assert!(result.is_err());
    }

    #[test]
    fn init_defaults_to_current_directory() {
        let cli = Cli::try_parse_from(["mdsetup", "init"]).unwrap();
        let Commands::Init(args) = cli.command else {
            panic!("expected init");
        };
        assert_eq!(args.outdir, PathBuf::from("."));
    }
}
