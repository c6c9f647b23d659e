use crate::core::models::stage::StageKind;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Subdirectories of a simulation project, in creation order.
pub const CANONICAL_DIRECTORIES: [&str; 5] = ["Prep", "Equil", "Prod", "Analysis", "Scripts"];
pub const EQUILIBRATION_DIRECTORY: &str = "Equil";
pub const PRODUCTION_DIRECTORY: &str = "Prod";

/// Per-stage working directories kept under `Equil/`.
pub const EQUILIBRATION_SUBDIRECTORIES: [&str; 15] = [
    "min1", "min2", "min11", "min12", "min13", "min14", "min15", "md1", "md2", "md11", "md12",
    "md13", "md14", "md15", "md16",
];
/// Production working directories: the first restart and the chained segments.
pub const PRODUCTION_SUBDIRECTORIES: [&str; 2] = ["mdst", "mdprod"];

const STAGE_FILE_MODE: u32 = 0o644;
const DRIVER_FILE_MODE: u32 = 0o755;

#[derive(Debug, Error)]
#[error("Failed to write '{path}': {source}")]
pub struct WriteFailure {
    pub path: PathBuf,
    pub source: io::Error,
}

impl WriteFailure {
    fn new(path: &Path, source: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Stage { ordinal: usize, kind: StageKind },
    Driver,
}

/// Descriptor of a file the layout has written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub bytes: usize,
    pub role: FileRole,
}

/// Decides where generated files go and writes them.
///
/// A failed [`write`](ProjectLayout::write) must leave no partial file behind.
pub trait ProjectLayout {
    fn stage_destination(&self, ordinal: usize, kind: StageKind, file_name: &str) -> PathBuf;

    fn driver_destination(&self, file_name: &str) -> PathBuf;

    /// Where the production deck and its driver go.
    fn production_destination(&self, file_name: &str) -> PathBuf;

    /// Equilibration directory as seen from the production driver's working directory.
    fn equilibration_from_production(&self) -> PathBuf;

    fn write(
        &self,
        destination: &Path,
        contents: &str,
        role: FileRole,
    ) -> Result<WrittenFile, WriteFailure>;
}

/// The on-disk project tree rooted at one directory.
///
/// Equilibration stage files and their driver are placed in `Equil/`; the production
/// deck and its driver in `Prod/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    root: PathBuf,
}

impl DirectoryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn equilibration_dir(&self) -> PathBuf {
        self.root.join(EQUILIBRATION_DIRECTORY)
    }

    pub fn production_dir(&self) -> PathBuf {
        self.root.join(PRODUCTION_DIRECTORY)
    }

    /// Creates the canonical project subdirectories and the per-stage working
    /// directories below `Equil/` and `Prod/`; existing ones are kept.
    pub fn create_tree(&self) -> Result<Vec<PathBuf>, WriteFailure> {
        let equilibration = self.equilibration_dir();
        let production = self.production_dir();
        CANONICAL_DIRECTORIES
            .iter()
            .map(|name| self.root.join(name))
            .chain(
                EQUILIBRATION_SUBDIRECTORIES
                    .iter()
                    .map(|name| equilibration.join(name)),
            )
            .chain(
                PRODUCTION_SUBDIRECTORIES
                    .iter()
                    .map(|name| production.join(name)),
            )
            .map(|dir| {
                fs::create_dir_all(&dir).map_err(|e| WriteFailure::new(&dir, e))?;
                debug!("Ensured directory {:?}", dir);
                Ok(dir)
            })
            .collect()
    }
}

impl ProjectLayout for DirectoryLayout {
    fn stage_destination(&self, _ordinal: usize, _kind: StageKind, file_name: &str) -> PathBuf {
        self.equilibration_dir().join(file_name)
    }

    fn driver_destination(&self, file_name: &str) -> PathBuf {
        self.equilibration_dir().join(file_name)
    }

    fn production_destination(&self, file_name: &str) -> PathBuf {
        self.production_dir().join(file_name)
    }

    fn equilibration_from_production(&self) -> PathBuf {
        Path::new("..").join(EQUILIBRATION_DIRECTORY)
    }

    fn write(
        &self,
        destination: &Path,
        contents: &str,
        role: FileRole,
    ) -> Result<WrittenFile, WriteFailure> {
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| WriteFailure::new(destination, e))?;

        // The temporary file is removed on drop if anything below fails.
        let mut file =
            NamedTempFile::new_in(parent).map_err(|e| WriteFailure::new(destination, e))?;
        file.write_all(contents.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| WriteFailure::new(destination, e))?;

        let mode = match role {
            FileRole::Driver => DRIVER_FILE_MODE,
            FileRole::Stage { .. } => STAGE_FILE_MODE,
        };
        set_mode(file.as_file(), mode).map_err(|e| WriteFailure::new(destination, e))?;

        file.persist(destination)
            .map_err(|e| WriteFailure::new(destination, e.error))?;
        debug!("Wrote {} bytes to {:?}", contents.len(), destination);

        Ok(WrittenFile {
            path: destination.to_path_buf(),
            bytes: contents.len(),
            role,
        })
    }
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _mode: u32) -> io::Result<()> {
    Ok(())
}
