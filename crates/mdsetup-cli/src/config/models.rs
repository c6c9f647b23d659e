use mdsetup::core::models::protocol::DefaultProtocolParameters;
use mdsetup::engine::adapter::EngineSettings;
use mdsetup::workflows::emit::OutputSelection;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolSource {
    Recipe(DefaultProtocolParameters),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub metadata_path: PathBuf,
    pub output_root: PathBuf,
    pub engine: String,
    pub protocol: ProtocolSource,
    pub settings: EngineSettings,
    pub output: OutputSelection,
    pub production_picoseconds: f64,
    pub production_segments: u32,
}
