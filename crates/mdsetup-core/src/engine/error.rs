use super::kind::Engine;
use crate::core::models::metadata::MetadataKey;
use crate::core::models::selection::AtomSelection;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum RenderError {
    #[error("Solvation metadata is missing '{key}', which the {engine} adapter requires")]
    MissingMetadata { key: MetadataKey, engine: Engine },

    #[error("Restraint selection '{selection}' cannot be expressed for {engine}: {reason}")]
    UnsupportedSelection {
        selection: AtomSelection,
        engine: Engine,
        reason: String,
    },

    #[error("Driver received {found} stage file name(s) for a protocol of {expected} stage(s)")]
    StageCountMismatch { expected: usize, found: usize },

    #[error("Failed to format engine input text")]
    Format(#[from] std::fmt::Error),
}
