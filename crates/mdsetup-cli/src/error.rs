use mdsetup::core::io::metadata_file::MetadataLoadError;
use mdsetup::core::io::protocol_file::ProtocolLoadError;
use mdsetup::core::models::protocol::ProtocolError;
use mdsetup::workflows::emit::EmitError;
use mdsetup::workflows::layout::WriteFailure;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    ProtocolFile(#[from] ProtocolLoadError),

    #[error(transparent)]
    Metadata(#[from] MetadataLoadError),

    #[error(transparent)]
    Layout(#[from] WriteFailure),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
