use nalgebra::Vector3;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Keys of [`SolvationMetadata`] an engine adapter can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    BoxDimensions,
    WaterModel,
    Ions,
    TopologyPath,
    CoordinatePath,
}

impl MetadataKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataKey::BoxDimensions => "box_dimensions",
            MetadataKey::WaterModel => "water_model",
            MetadataKey::Ions => "ions",
            MetadataKey::TopologyPath => "topology_path",
            MetadataKey::CoordinatePath => "coordinate_path",
        }
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Periodic cell as three edge lengths (Å) and three angles (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxDimensions {
    pub lengths: [f64; 3],
    /// Angles alpha (b,c), beta (a,c) and gamma (a,b).
    pub angles: [f64; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellShape {
    Cubic,
    Orthorhombic,
    Triclinic,
}

const ANGLE_TOLERANCE_DEG: f64 = 1e-6;
const LENGTH_TOLERANCE: f64 = 1e-6;

impl BoxDimensions {
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self {
        Self {
            lengths: [a, b, c],
            angles: [90.0, 90.0, 90.0],
        }
    }

    /// Builds cell parameters from the three box vectors (rows of the cell matrix).
    pub fn from_vectors(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Self {
        let angle = |u: &Vector3<f64>, v: &Vector3<f64>| u.angle(v).to_degrees();
        Self {
            lengths: [a.norm(), b.norm(), c.norm()],
            angles: [angle(&b, &c), angle(&a, &c), angle(&a, &b)],
        }
    }

    pub fn shape(&self) -> CellShape {
        let right_angles = self
            .angles
            .iter()
            .all(|angle| (angle - 90.0).abs() < ANGLE_TOLERANCE_DEG);
        if !right_angles {
            return CellShape::Triclinic;
        }
        let [a, b, c] = self.lengths;
        if (a - b).abs() < LENGTH_TOLERANCE && (b - c).abs() < LENGTH_TOLERANCE {
            CellShape::Cubic
        } else {
            CellShape::Orthorhombic
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lengths.iter().all(|l| l.is_finite() && *l > 0.0)
            && self
                .angles
                .iter()
                .all(|a| a.is_finite() && *a > 0.0 && *a < 180.0)
    }
}

/// Structural facts produced by solvation and neutralization, consumed read-only.
///
/// Every field is optional so that a missing key can be reported by name against the
/// engine that needed it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SolvationMetadata {
    pub box_dimensions: Option<BoxDimensions>,
    pub water_model: Option<String>,
    /// Ion species (e.g. `Na+`, `Cl-`) to the number of ions added.
    pub ions: Option<BTreeMap<String, u32>>,
    pub topology_path: Option<PathBuf>,
    pub coordinate_path: Option<PathBuf>,
}

impl SolvationMetadata {
    pub fn has(&self, key: MetadataKey) -> bool {
        match key {
            MetadataKey::BoxDimensions => self.box_dimensions.is_some(),
            MetadataKey::WaterModel => self.water_model.is_some(),
            MetadataKey::Ions => self.ions.is_some(),
            MetadataKey::TopologyPath => self.topology_path.is_some(),
            MetadataKey::CoordinatePath => self.coordinate_path.is_some(),
        }
    }

    pub fn topology(&self) -> Option<&Path> {
        self.topology_path.as_deref()
    }

    pub fn coordinates(&self) -> Option<&Path> {
        self.coordinate_path.as_deref()
    }

    /// Ion species with at least one ion placed, in name order.
    pub fn ion_species(&self) -> impl Iterator<Item = &str> {
        self.ions
            .iter()
            .flat_map(|ions| ions.iter())
            .filter(|(_, count)| **count > 0)
            .map(|(name, _)| name.as_str())
    }

    pub fn total_ions(&self) -> u32 {
        self.ions
            .as_ref()
            .map(|ions| ions.values().sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn from_vectors_recovers_orthorhombic_cell() {
        let cell = BoxDimensions::from_vectors(
            Vector3::new(60.0, 0.0, 0.0),
            Vector3::new(0.0, 70.0, 0.0),
            Vector3::new(0.0, 0.0, 80.0),
        );
        assert!(approx_eq(cell.lengths[0], 60.0));
        assert!(approx_eq(cell.lengths[1], 70.0));
        assert!(approx_eq(cell.lengths[2], 80.0));
        assert!(cell.angles.iter().all(|a| approx_eq(*a, 90.0)));
        assert_eq!(cell.shape(), CellShape::Orthorhombic);
    }

    #[test]
    fn from_vectors_recovers_truncated_octahedron_angles() {
        let a = 80.0;
        let cell = BoxDimensions::from_vectors(
            Vector3::new(a, 0.0, 0.0),
            Vector3::new(a / 3.0, 2.0 * 2f64.sqrt() * a / 3.0, 0.0),
            Vector3::new(
                -a / 3.0,
                2f64.sqrt() * a / 3.0,
                6f64.sqrt() * a / 3.0,
            ),
        );
        for length in cell.lengths {
            assert!((length - a).abs() < 1e-9);
        }
        assert!((cell.angles[0] - 70.528779).abs() < 1e-4);
        assert!((cell.angles[1] - 109.471221).abs() < 1e-4);
        assert!((cell.angles[2] - 70.528779).abs() < 1e-4);
        assert_eq!(cell.shape(), CellShape::Triclinic);
    }

    #[test]
    fn shape_detects_cubic_cells() {
        assert_eq!(
            BoxDimensions::orthorhombic(64.0, 64.0, 64.0).shape(),
            CellShape::Cubic
        );
    }

    #[test]
    fn validity_rejects_degenerate_cells() {
        assert!(BoxDimensions::orthorhombic(10.0, 10.0, 10.0).is_valid());
        assert!(!BoxDimensions::orthorhombic(0.0, 10.0, 10.0).is_valid());
        let flat = BoxDimensions {
            lengths: [10.0, 10.0, 10.0],
            angles: [90.0, 180.0, 90.0],
        };
        assert!(!flat.is_valid());
    }

    #[test]
    fn has_reports_presence_per_key() {
        let metadata = SolvationMetadata {
            water_model: Some("tip3p".to_string()),
            ions: Some(BTreeMap::new()),
            ..Default::default()
        };
        assert!(metadata.has(MetadataKey::WaterModel));
        assert!(metadata.has(MetadataKey::Ions));
        assert!(!metadata.has(MetadataKey::BoxDimensions));
        assert!(!metadata.has(MetadataKey::TopologyPath));
        assert!(!metadata.has(MetadataKey::CoordinatePath));
    }

    #[test]
    fn ion_species_skips_empty_counts_and_is_sorted() {
        let metadata = SolvationMetadata {
            ions: Some(BTreeMap::from([
                ("Na+".to_string(), 12),
                ("Cl-".to_string(), 10),
                ("K+".to_string(), 0),
            ])),
            ..Default::default()
        };
        assert_eq!(metadata.ion_species().collect::<Vec<_>>(), vec!["Cl-", "Na+"]);
        assert_eq!(metadata.total_ions(), 22);
    }

    #[test]
    fn metadata_key_names_are_snake_case() {
        assert_eq!(MetadataKey::BoxDimensions.to_string(), "box_dimensions");
        assert_eq!(MetadataKey::TopologyPath.as_str(), "topology_path");
    }
}
