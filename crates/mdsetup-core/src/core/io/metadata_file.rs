use crate::core::models::metadata::{BoxDimensions, SolvationMetadata};
use nalgebra::Vector3;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MetadataLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid box in '{path}': {reason}")]
    InvalidBox { path: String, reason: String },
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileMetadata {
    water_model: Option<String>,
    topology: Option<PathBuf>,
    coordinates: Option<PathBuf>,
    #[serde(rename = "box")]
    cell: Option<FileBox>,
    ions: Option<BTreeMap<String, u32>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct FileBox {
    lengths: Option<[f64; 3]>,
    angles: Option<[f64; 3]>,
    vectors: Option<[[f64; 3]; 3]>,
}

impl FileBox {
    fn into_dimensions(self) -> Result<BoxDimensions, String> {
        let dimensions = match (self.lengths, self.vectors) {
            (Some(lengths), None) => BoxDimensions {
                lengths,
                angles: self.angles.unwrap_or([90.0; 3]),
            },
            (None, Some([a, b, c])) => {
                if self.angles.is_some() {
                    return Err("`angles` cannot be combined with `vectors`".to_string());
                }
                BoxDimensions::from_vectors(
                    Vector3::from(a),
                    Vector3::from(b),
                    Vector3::from(c),
                )
            }
            (Some(_), Some(_)) => {
                return Err("specify either `lengths` or `vectors`, not both".to_string());
            }
            (None, None) => return Err("one of `lengths` or `vectors` is required".to_string()),
        };

        if !dimensions.is_valid() {
            return Err(format!(
                "degenerate cell: lengths {:?}, angles {:?}",
                dimensions.lengths, dimensions.angles
            ));
        }
        Ok(dimensions)
    }
}

/// Loads solvation metadata from a TOML file.
///
/// Relative topology and coordinate paths are resolved against the file's directory.
pub fn load(path: &Path) -> Result<SolvationMetadata, MetadataLoadError> {
    debug!("Loading solvation metadata from {:?}", path);
    let content = std::fs::read_to_string(path).map_err(|e| MetadataLoadError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    parse(&content, &path.to_string_lossy(), base_dir)
}

/// Parses solvation metadata from TOML text; `origin` names the source in errors.
pub fn parse(
    content: &str,
    origin: &str,
    base_dir: &Path,
) -> Result<SolvationMetadata, MetadataLoadError> {
    let file: FileMetadata = toml::from_str(content).map_err(|e| MetadataLoadError::Toml {
        path: origin.to_string(),
        source: e,
    })?;

    let box_dimensions = file
        .cell
        .map(FileBox::into_dimensions)
        .transpose()
        .map_err(|reason| MetadataLoadError::InvalidBox {
            path: origin.to_string(),
            reason,
        })?;

    let resolve = |p: PathBuf| {
        if p.is_relative() && !base_dir.as_os_str().is_empty() {
            base_dir.join(p)
        } else {
            p
        }
    };

    Ok(SolvationMetadata {
        box_dimensions,
        water_model: file.water_model.map(|w| w.trim().to_ascii_lowercase()),
        ions: file.ions,
        topology_path: file.topology.map(resolve),
        coordinate_path: file.coordinates.map(resolve),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::metadata::{CellShape, MetadataKey};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_succeeds_with_complete_file_and_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("solvated.toml");
        fs::write(
            &file_path,
            r#"
            water-model = "TIP3P"
            topology = "solvated.parm7"
            coordinates = "/data/solvated.rst7"

            [box]
            lengths = [64.0, 64.0, 64.0]

            [ions]
            "Na+" = 12
            "Cl-" = 10
            "#,
        )
        .unwrap();

        let metadata = load(&file_path).unwrap();
        assert_eq!(metadata.water_model.as_deref(), Some("tip3p"));
        assert_eq!(
            metadata.topology_path,
            Some(dir.path().join("solvated.parm7"))
        );
        assert_eq!(
            metadata.coordinate_path,
            Some(PathBuf::from("/data/solvated.rst7"))
        );
        let cell = metadata.box_dimensions.unwrap();
        assert_eq!(cell.angles, [90.0; 3]);
        assert_eq!(cell.shape(), CellShape::Cubic);
        assert_eq!(metadata.total_ions(), 22);
    }

    #[test]
    fn missing_sections_leave_keys_absent() {
        let metadata = parse("water-model = \"opc\"", "<test>", Path::new("")).unwrap();
        assert!(metadata.has(MetadataKey::WaterModel));
        assert!(!metadata.has(MetadataKey::BoxDimensions));
        assert!(!metadata.has(MetadataKey::Ions));
        assert!(!metadata.has(MetadataKey::TopologyPath));
    }

    #[test]
    fn box_vectors_are_converted_to_cell_parameters() {
        let metadata = parse(
            r#"
            [box]
            vectors = [[50.0, 0.0, 0.0], [0.0, 60.0, 0.0], [0.0, 0.0, 70.0]]
            "#,
            "<test>",
            Path::new(""),
        )
        .unwrap();
        let cell = metadata.box_dimensions.unwrap();
        assert!((cell.lengths[1] - 60.0).abs() < 1e-9);
        assert_eq!(cell.shape(), CellShape::Orthorhombic);
    }

    #[test]
    fn conflicting_box_specifications_are_rejected() {
        let result = parse(
            r#"
            [box]
            lengths = [50.0, 50.0, 50.0]
            vectors = [[50.0, 0.0, 0.0], [0.0, 50.0, 0.0], [0.0, 0.0, 50.0]]
            "#,
            "<test>",
            Path::new(""),
        );
        assert!(matches!(result, Err(MetadataLoadError::InvalidBox { .. })));
    }

    #[test]
    fn degenerate_box_is_rejected() {
        let result = parse(
            "[box]\nlengths = [0.0, 50.0, 50.0]",
            "<test>",
            Path::new(""),
        );
        assert!(matches!(result, Err(MetadataLoadError::InvalidBox { .. })));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = parse("solvent = \"water\"", "<test>", Path::new(""));
        assert!(matches!(result, Err(MetadataLoadError::Toml { .. })));
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(MetadataLoadError::Io { .. })));
    }
}
