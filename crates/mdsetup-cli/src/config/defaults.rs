use mdsetup::core::models::production::{DEFAULT_SEGMENT_COUNT, DEFAULT_SEGMENT_PICOSECONDS};
use mdsetup::core::models::protocol::DefaultProtocolParameters;
use mdsetup::core::models::selection::AtomSelection;
use mdsetup::engine::adapter::EngineSettings;
use std::path::PathBuf;

pub struct DefaultsConfig {
    pub engine: String,
    pub prefix: String,
    pub outdir: PathBuf,
    pub initial_temperature: f64,
    pub final_temperature: f64,
    pub force_constant: f64,
    pub decay_factor: f64,
    pub selection: AtomSelection,
    pub charmm_toppar: PathBuf,
    pub charmm_force_field: u32,
    pub production_picoseconds: f64,
    pub production_segments: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        let recipe = DefaultProtocolParameters::default();
        let engine = EngineSettings::default();
        Self {
            engine: "amber".to_string(),
            prefix: engine.prefix,
            outdir: PathBuf::from("."),
            initial_temperature: recipe.initial_temperature,
            final_temperature: recipe.global_temperature,
            force_constant: recipe.initial_force_constant,
            decay_factor: recipe.decay_factor,
            selection: recipe.atom_selection,
            charmm_toppar: engine.charmm_toppar,
            charmm_force_field: engine.charmm_force_field,
            production_picoseconds: DEFAULT_SEGMENT_PICOSECONDS,
            production_segments: DEFAULT_SEGMENT_COUNT,
        }
    }
}
