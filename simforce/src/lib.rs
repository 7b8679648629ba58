pub mod bending;
pub mod factory;
pub mod finite_volume;
mod force;
pub mod gravity;
pub mod material;
pub mod matrix;
pub mod mesh;
pub mod springs;
pub mod strain;

pub use self::bending::LinearBendingElements;
pub use self::factory::*;
pub use self::finite_volume::{FiniteVolume, LinearFiniteVolume};
pub use self::force::*;
pub use self::force_test::{force_test, Check, ForceTestParams, ForceTestReport};
pub use self::gravity::Gravity;
pub use self::material::*;
pub use self::matrix::{SolidMatrix, SolidMatrixStructure};
pub use self::mesh::{SegmentMesh, SimplexMesh, TetMesh, TriangleMesh};
pub use self::springs::Springs;
pub use self::strain::{AltitudeStatistics, StrainKind, StrainMeasure};

pub use utils::VectorField;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Size mismatch error: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Element {element} references vertex {vertex} out of {num_vertices}")]
    InvalidIndex {
        element: usize,
        vertex: usize,
        num_vertices: usize,
    },
    #[error("Unsupported dimensions: ambient {ambient}, element {element}")]
    UnsupportedDimensions { ambient: usize, element: usize },
    #[error("No material model registered for element dimension {element}")]
    MissingModel { element: usize },
    #[error("Degenerate reference element detected: {:?}", .degens[0])]
    DegenerateReferenceElement { degens: Vec<usize> },
    #[error("Inverted reference element detected: {:?}", .inverted[0])]
    InvertedReferenceElement { inverted: Vec<usize> },
    #[error("Element {element} collapsed to zero size")]
    CollapsedElement { element: usize },
    #[error("Element {element} failed with volume ratio {ratio:.3e}")]
    ElementFailure { element: usize, ratio: f64 },
    #[error("Matrix entry ({row}, {col}) is missing from the structure")]
    MissingStructureEntry { row: usize, col: usize },
    #[error("Invalid parameter: {name:?}")]
    InvalidParameter { name: String },
    #[error("{check} check failed at iteration {iteration}: error {error:.3e} exceeds tolerance {tolerance:.3e}")]
    ToleranceViolation {
        check: Check,
        iteration: usize,
        error: f64,
        tolerance: f64,
    },
    #[error("Configuration error")]
    Config {
        #[from]
        source: ron::error::SpannedError,
    },
}

/// Verify that a per-vertex array has one entry for each vertex.
pub(crate) fn check_size(expected: usize, actual: usize) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::SizeMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_first_bad_element() {
        let err = Error::DegenerateReferenceElement { degens: vec![4, 7] };
        assert_eq!(err.to_string(), "Degenerate reference element detected: 4");
        let err = Error::ToleranceViolation {
            check: Check::ElasticForce,
            iteration: 2,
            error: 1.5e-4,
            tolerance: 1e-5,
        };
        assert_eq!(
            err.to_string(),
            "elastic force check failed at iteration 2: error 1.500e-4 exceeds tolerance 1.000e-5"
        );
    }
}
