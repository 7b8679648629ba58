//! Strain measures map element vertex positions to deformation gradients.
//!
//! Every element is integrated with one or more quadrature samples. A sample stores the
//! gradients of the element shape functions with respect to rest (material) coordinates, so the
//! deformation gradient at the sample is `F = sum_a x_a G_a^T`, an `m x d` matrix for ambient
//! dimension `m` and material dimension `d`.

use na::DMatrix;
use serde::{Deserialize, Serialize};
use utils::vertex;

use crate::mesh::validate_elements;
use crate::{Error, VectorField};

/// The kinds of elements supported by `StrainMeasure`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrainKind {
    /// Triangles in the plane.
    Planar,
    /// Triangles embedded in 3D.
    Shell,
    /// Tetrahedra in 3D.
    Volume,
    /// Trilinear hexahedra in 3D.
    Hexahedral,
}

impl StrainKind {
    pub fn ambient_dimension(self) -> usize {
        match self {
            StrainKind::Planar => 2,
            StrainKind::Shell | StrainKind::Volume | StrainKind::Hexahedral => 3,
        }
    }

    /// Number of columns in the deformation gradient.
    pub fn material_dimension(self) -> usize {
        match self {
            StrainKind::Planar | StrainKind::Shell => 2,
            StrainKind::Volume | StrainKind::Hexahedral => 3,
        }
    }

    pub fn vertices_per_element(self) -> usize {
        match self {
            StrainKind::Planar | StrainKind::Shell => 3,
            StrainKind::Volume => 4,
            StrainKind::Hexahedral => 8,
        }
    }

    /// Element dimension as counted by vertices: one less than the number of element vertices.
    pub fn element_dimension(self) -> usize {
        self.vertices_per_element() - 1
    }
}

/// A quadrature sample of an element.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Index of the element this sample belongs to.
    pub element: usize,
    /// Element vertices.
    pub vertices: Vec<usize>,
    /// Shape function gradients in rest coordinates, one row per element vertex (`k x d`).
    pub shape_gradient: DMatrix<f64>,
    /// Rest length, area or volume integrated by this sample.
    pub weight: f64,
    /// Orthonormal rest frame (`m x d`). This is the identity unless the element is a shell.
    pub frame: DMatrix<f64>,
}

impl Sample {
    /// Deformation gradient of this sample for vertex positions `x`.
    pub fn deformation_gradient(&self, x: &VectorField) -> DMatrix<f64> {
        let m = x.ncols();
        let d = self.shape_gradient.ncols();
        let mut f = DMatrix::zeros(m, d);
        for (a, &v) in self.vertices.iter().enumerate() {
            f += vertex(x, v) * self.shape_gradient.row(a);
        }
        f
    }

    /// Smallest distance from a vertex to the opposite facet, which for simplices is the
    /// reciprocal of the largest shape function gradient.
    pub fn min_altitude(&self) -> f64 {
        let max_gradient = self
            .shape_gradient
            .row_iter()
            .map(|g| g.norm())
            .fold(0.0_f64, f64::max);
        1.0 / max_gradient
    }
}

/// Summary of the per-element minimum altitudes of a strain measure.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AltitudeStatistics {
    pub num_elements: usize,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

/// Rest-state quadrature data for a mesh of elements of one `StrainKind`.
#[derive(Clone, Debug)]
pub struct StrainMeasure {
    kind: StrainKind,
    num_vertices: usize,
    num_elements: usize,
    samples: Vec<Sample>,
}

impl StrainMeasure {
    /// Build a strain measure for `elements` in rest configuration `x`.
    pub fn new<const K: usize>(
        kind: StrainKind,
        elements: &[[usize; K]],
        x: &VectorField,
    ) -> Result<Self, Error> {
        if K != kind.vertices_per_element() || x.ncols() != kind.ambient_dimension() {
            return Err(Error::UnsupportedDimensions {
                ambient: x.ncols(),
                element: K.saturating_sub(1),
            });
        }
        validate_elements(elements, x.nrows())?;

        let mut samples = Vec::with_capacity(elements.len());
        let mut degens = Vec::new();
        let mut inverted = Vec::new();

        for (element, vertices) in elements.iter().enumerate() {
            let result = match kind {
                StrainKind::Hexahedral => hexahedron_samples(element, vertices, x),
                _ => simplex_sample(kind, element, vertices, x).map(|s| vec![s]),
            };
            match result {
                Ok(s) => samples.extend(s),
                Err(RestDefect::Degenerate) => degens.push(element),
                Err(RestDefect::Inverted) => inverted.push(element),
            }
        }

        if !degens.is_empty() {
            return Err(Error::DegenerateReferenceElement { degens });
        }
        if !inverted.is_empty() {
            return Err(Error::InvertedReferenceElement { inverted });
        }

        Ok(StrainMeasure {
            kind,
            num_vertices: x.nrows(),
            num_elements: elements.len(),
            samples,
        })
    }

    pub fn kind(&self) -> StrainKind {
        self.kind
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Total rest measure (length, area or volume) of the mesh.
    pub fn rest_measure(&self) -> f64 {
        self.samples.iter().map(|s| s.weight).sum()
    }

    /// Lumped vertex masses for a uniform `density`.
    pub fn lumped_mass(&self, density: f64) -> Vec<f64> {
        let mut mass = vec![0.0; self.num_vertices];
        for sample in self.samples.iter() {
            let share = density * sample.weight / sample.vertices.len() as f64;
            for &v in sample.vertices.iter() {
                mass[v] += share;
            }
        }
        mass
    }

    /// Statistics of the minimum altitude of each element, or `None` for an empty mesh.
    pub fn altitude_statistics(&self) -> Option<AltitudeStatistics> {
        let mut altitudes = vec![f64::INFINITY; self.num_elements];
        for sample in self.samples.iter() {
            let a = &mut altitudes[sample.element];
            *a = a.min(sample.min_altitude());
        }
        if altitudes.is_empty() {
            return None;
        }
        let min = altitudes.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = altitudes.iter().cloned().fold(0.0, f64::max);
        let mean = altitudes.iter().sum::<f64>() / altitudes.len() as f64;
        Some(AltitudeStatistics {
            num_elements: altitudes.len(),
            min,
            mean,
            max,
        })
    }

    /// Log altitude statistics, which flag nearly degenerate elements.
    pub fn print_altitude_statistics(&self) {
        match self.altitude_statistics() {
            Some(AltitudeStatistics {
                num_elements,
                min,
                mean,
                max,
            }) => log::info!(
                "{:?} strain measure with {} elements: altitude min {:.3e}, mean {:.3e}, max {:.3e}",
                self.kind,
                num_elements,
                min,
                mean,
                max
            ),
            None => log::info!("{:?} strain measure has no elements", self.kind),
        }
    }
}

enum RestDefect {
    Degenerate,
    Inverted,
}

/// Build the single sample of a simplex. The rest shape matrix `Dm` has columns `x_a - x_0`.
#[allow(non_snake_case)]
fn simplex_sample(
    kind: StrainKind,
    element: usize,
    vertices: &[usize],
    x: &VectorField,
) -> Result<Sample, RestDefect> {
    let m = kind.ambient_dimension();
    let d = kind.material_dimension();
    let x0 = vertex(x, vertices[0]);
    let mut Dm = DMatrix::zeros(m, d);
    for a in 0..d {
        Dm.set_column(a, &(vertex(x, vertices[a + 1]) - &x0));
    }

    let scale = Dm.column_iter().map(|c| c.norm()).fold(0.0_f64, f64::max);
    let tolerance = f64::EPSILON * scale.powi(d as i32);

    let (R, frame) = if m == d {
        (Dm, DMatrix::identity(m, d))
    } else {
        let qr = Dm.qr();
        (qr.r(), qr.q())
    };

    let det = R.determinant();
    if !(det.abs() > tolerance) {
        return Err(RestDefect::Degenerate);
    }
    if m == d && det < 0.0 {
        return Err(RestDefect::Inverted);
    }
    let R_inv = R.try_inverse().ok_or(RestDefect::Degenerate)?;

    // G = E R^-1 where E maps vertex positions to edge vectors.
    let mut shape_gradient = DMatrix::zeros(d + 1, d);
    for a in 0..d {
        shape_gradient.set_row(a + 1, &R_inv.row(a));
    }
    let first = -shape_gradient.rows(1, d).row_sum();
    shape_gradient.set_row(0, &first);

    let factorial: f64 = (1..=d).map(|i| i as f64).product();
    Ok(Sample {
        element,
        vertices: vertices.to_vec(),
        shape_gradient,
        weight: det.abs() / factorial,
        frame,
    })
}

/// Reference coordinates of hexahedron corner `v`: bit 0 selects x, bit 1 y and bit 2 z.
fn hex_corner(v: usize) -> [f64; 3] {
    let sign = |bit: usize| if v & bit != 0 { 1.0 } else { -1.0 };
    [sign(1), sign(2), sign(4)]
}

/// Build the 2x2x2 Gauss samples of a trilinear hexahedron.
#[allow(non_snake_case)]
fn hexahedron_samples(
    element: usize,
    vertices: &[usize],
    x: &VectorField,
) -> Result<Vec<Sample>, RestDefect> {
    let g = 1.0 / 3.0_f64.sqrt();
    let mut Xe = DMatrix::zeros(8, 3);
    for (a, &v) in vertices.iter().enumerate() {
        Xe.set_row(a, &x.row(v));
    }
    let scale = (0..8)
        .map(|a| (Xe.row(a) - Xe.row(0)).norm())
        .fold(0.0_f64, f64::max);
    let tolerance = f64::EPSILON * scale.powi(3);

    let mut samples = Vec::with_capacity(8);
    for q in 0..8 {
        let p = hex_corner(q).map(|c| c * g);
        // Derivatives of the trilinear shape functions with respect to reference coordinates.
        let dN = DMatrix::from_fn(8, 3, |a, k| {
            let c = hex_corner(a);
            let mut value = 0.125 * c[k];
            for l in 0..3 {
                if l != k {
                    value *= 1.0 + p[l] * c[l];
                }
            }
            value
        });
        let J = Xe.transpose() * &dN;
        let det = J.determinant();
        if !(det.abs() > tolerance) {
            return Err(RestDefect::Degenerate);
        }
        if det < 0.0 {
            return Err(RestDefect::Inverted);
        }
        let J_inv = J.try_inverse().ok_or(RestDefect::Degenerate)?;
        samples.push(Sample {
            element,
            vertices: vertices.to_vec(),
            shape_gradient: dN * J_inv,
            weight: det,
            frame: DMatrix::identity(3, 3),
        });
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_tet() -> VectorField {
        VectorField::from_row_slice(
            4,
            3,
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        )
    }

    fn unit_cube() -> VectorField {
        VectorField::from_fn(8, 3, |v, k| hex_corner(v)[k] * 0.5 + 0.5)
    }

    #[test]
    fn rest_deformation_gradient_is_identity() {
        let x = unit_tet();
        let strain = StrainMeasure::new(StrainKind::Volume, &[[0, 1, 2, 3]], &x).unwrap();
        let f = strain.samples()[0].deformation_gradient(&x);
        assert_relative_eq!(f, DMatrix::identity(3, 3), epsilon = 1e-12);
        assert_relative_eq!(strain.rest_measure(), 1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn shell_rest_gradient_is_frame() {
        let x = VectorField::from_row_slice(3, 3, &[0.0, 0.0, 0.0, 2.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        let strain = StrainMeasure::new(StrainKind::Shell, &[[0, 1, 2]], &x).unwrap();
        let sample = &strain.samples()[0];
        let f = sample.deformation_gradient(&x);
        assert_relative_eq!(f, sample.frame, epsilon = 1e-12);
        assert_relative_eq!(
            sample.frame.transpose() * &sample.frame,
            DMatrix::identity(2, 2),
            epsilon = 1e-12
        );
        assert_relative_eq!(strain.rest_measure(), 0.5 * 5.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn stretched_planar_triangle() {
        let rest = VectorField::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        let strain = StrainMeasure::new(StrainKind::Planar, &[[0, 1, 2]], &rest).unwrap();
        let deformed = VectorField::from_row_slice(3, 2, &[0.0, 0.0, 2.0, 0.0, 0.0, 1.0]);
        let f = strain.samples()[0].deformation_gradient(&deformed);
        assert_relative_eq!(
            f,
            DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 1.0]),
            epsilon = 1e-12
        );
    }

    #[test]
    fn inverted_and_degenerate_references() {
        let x = unit_tet();
        assert!(matches!(
            StrainMeasure::new(StrainKind::Volume, &[[0, 2, 1, 3]], &x),
            Err(Error::InvertedReferenceElement { .. })
        ));
        let flat = VectorField::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.0, 2.0, 0.0]);
        assert!(matches!(
            StrainMeasure::new(StrainKind::Planar, &[[0, 1, 2]], &flat),
            Err(Error::DegenerateReferenceElement { .. })
        ));
    }

    #[test]
    fn hexahedron_samples_integrate_volume() {
        let x = unit_cube();
        let strain =
            StrainMeasure::new(StrainKind::Hexahedral, &[[0, 1, 2, 3, 4, 5, 6, 7]], &x).unwrap();
        assert_eq!(strain.samples().len(), 8);
        assert_relative_eq!(strain.rest_measure(), 1.0, epsilon = 1e-12);
        for sample in strain.samples() {
            assert_relative_eq!(
                sample.deformation_gradient(&x),
                DMatrix::identity(3, 3),
                epsilon = 1e-12
            );
        }
        let mass = strain.lumped_mass(8.0);
        assert!(mass.iter().all(|&m| (m - 1.0).abs() < 1e-12));
    }

    #[test]
    fn mismatched_kind_is_unsupported() {
        let x = unit_tet();
        assert!(matches!(
            StrainMeasure::new(StrainKind::Planar, &[[0, 1, 2, 3]], &x),
            Err(Error::UnsupportedDimensions {
                ambient: 3,
                element: 3
            })
        ));
    }

    #[test]
    fn altitudes_of_right_triangle() {
        let x = VectorField::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        let strain = StrainMeasure::new(StrainKind::Planar, &[[0, 1, 2]], &x).unwrap();
        let stats = strain.altitude_statistics().unwrap();
        // The altitude from the right angle corner is 1/sqrt(2).
        assert_relative_eq!(stats.min, 0.5_f64.sqrt(), epsilon = 1e-12);
        assert_eq!(stats.num_elements, 1);
        let empty = StrainMeasure::new::<3>(StrainKind::Planar, &[], &x).unwrap();
        assert!(empty.altitude_statistics().is_none());
    }
}
