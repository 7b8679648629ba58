//! Linear bending elements for curves and surfaces.
//!
//! Each stencil combines a few vertex positions with fixed weights `w` summing to zero. The
//! energy penalizes the deviation of the combination `Σ wᵢxᵢ` from its rest value, so it is
//! quadratic in positions and its stiffness is constant.

use na::{DMatrix, DVector};
use utils::{add_to_vertex, vertex};

use crate::force::*;
use crate::matrix::{SolidMatrix, SolidMatrixStructure};
use crate::mesh::{SegmentMesh, TriangleMesh};
use crate::{check_size, Error, VectorField};

#[derive(Clone, Debug)]
struct Stencil {
    vertices: Vec<usize>,
    weights: Vec<f64>,
    scale: f64,
    rest: DVector<f64>,
}

impl Stencil {
    fn combine(&self, x: &VectorField) -> DVector<f64> {
        let mut sum = DVector::zeros(x.ncols());
        for (&v, &w) in self.vertices.iter().zip(self.weights.iter()) {
            sum += vertex(x, v) * w;
        }
        sum
    }

    fn new(vertices: Vec<usize>, weights: Vec<f64>, scale: f64, x: &VectorField) -> Self {
        let mut stencil = Stencil {
            vertices,
            weights,
            scale,
            rest: DVector::zeros(x.ncols()),
        };
        stencil.rest = stencil.combine(x);
        stencil
    }
}

/// Bending force with energy `½ k Σ s |Σ wᵢxᵢ - r|²` and damping potential `½ c Σ s |Σ wᵢvᵢ|²`
/// where `k` is `stiffness` and `c` is `damping`.
#[derive(Clone, Debug)]
pub struct LinearBendingElements {
    pub stiffness: f64,
    pub damping: f64,
    dim: usize,
    num_vertices: usize,
    stencils: Vec<Stencil>,
    /// Deviation of each stencil from rest at the current configuration.
    residuals: Vec<DVector<f64>>,
}

impl LinearBendingElements {
    /// Bending of a curve in the plane, with one stencil per vertex joining exactly two
    /// segments.
    pub fn curve(mesh: &SegmentMesh, x: &VectorField) -> Result<Self, Error> {
        mesh.validate(x.nrows())?;
        let mut stencils = Vec::new();
        let mut degens = Vec::new();
        for (e, [i, j, k]) in mesh.bending_triples().into_iter().enumerate() {
            let l0 = (vertex(x, j) - vertex(x, i)).norm();
            let l1 = (vertex(x, k) - vertex(x, j)).norm();
            let tolerance = 4.0 * f64::EPSILON * l0.max(l1);
            if !(l0 > tolerance && l1 > tolerance) {
                degens.push(e);
                continue;
            }
            let weights = vec![1.0 / l0, -(1.0 / l0 + 1.0 / l1), 1.0 / l1];
            stencils.push(Stencil::new(vec![i, j, k], weights, 2.0 / (l0 + l1), x));
        }
        Self::from_stencils(stencils, degens, x)
    }

    /// Bending of a triangulated surface, with one stencil per interior edge.
    ///
    /// For the quadruple `[o0, a, b, o1]` let `L` be the length of `a -> b`, `s` the projection of
    /// an opposite vertex onto the edge and `h` its distance from the edge. The weights are
    /// `-L/h` on the opposite vertices and `(L - s)/h` and `s/h` on `a` and `b`, summed over both
    /// faces. The scale is `3 / (A0 + A1)` for face areas `A0` and `A1`.
    pub fn surface(mesh: &TriangleMesh, x: &VectorField) -> Result<Self, Error> {
        mesh.validate(x.nrows())?;
        let mut stencils = Vec::new();
        let mut degens = Vec::new();
        for (e, [o0, a, b, o1]) in mesh.bending_quadruples().into_iter().enumerate() {
            let xa = vertex(x, a);
            let edge = vertex(x, b) - &xa;
            let length = edge.norm();
            if !(length > 0.0) {
                degens.push(e);
                continue;
            }
            let tangent = edge / length;

            let mut weights = vec![0.0; 4];
            let mut area = 0.0;
            let mut degenerate = false;
            for (slot, o) in [(0, o0), (3, o1)] {
                let offset = vertex(x, o) - &xa;
                let s = offset.dot(&tangent);
                let h = (&offset - &tangent * s).norm();
                // Round-off leaves `h` of order `ε |offset|` for collinear vertices.
                if !(h > 4.0 * f64::EPSILON * length.max(offset.norm())) {
                    degenerate = true;
                    break;
                }
                weights[slot] = -length / h;
                weights[1] += (length - s) / h;
                weights[2] += s / h;
                area += 0.5 * length * h;
            }
            if degenerate || !(area > 4.0 * f64::EPSILON * length * length) {
                degens.push(e);
                continue;
            }
            stencils.push(Stencil::new(vec![o0, a, b, o1], weights, 3.0 / area, x));
        }
        Self::from_stencils(stencils, degens, x)
    }

    fn from_stencils(
        stencils: Vec<Stencil>,
        degens: Vec<usize>,
        x: &VectorField,
    ) -> Result<Self, Error> {
        if !degens.is_empty() {
            return Err(Error::DegenerateReferenceElement { degens });
        }
        let dim = x.ncols();
        log::debug!("Created {} bending stencils", stencils.len());
        Ok(LinearBendingElements {
            stiffness: 0.0,
            damping: 0.0,
            dim,
            num_vertices: x.nrows(),
            residuals: vec![DVector::zeros(dim); stencils.len()],
            stencils,
        })
    }

    pub fn num_stencils(&self) -> usize {
        self.stencils.len()
    }

    /// Apply `-coefficient` times the stencil operator to `y`, accumulating into `out`.
    fn add_operator(&self, coefficient: f64, out: &mut VectorField, y: &VectorField) {
        for stencil in self.stencils.iter() {
            let combined = stencil.combine(y);
            self.scatter(stencil, -coefficient * stencil.scale, &combined, out);
        }
    }

    fn scatter(&self, stencil: &Stencil, scale: f64, value: &DVector<f64>, out: &mut VectorField) {
        for (&v, &w) in stencil.vertices.iter().zip(stencil.weights.iter()) {
            add_to_vertex(out, v, &(value * (scale * w)));
        }
    }

    fn add_gradient(&self, coefficient: f64, matrix: &mut SolidMatrix) -> Result<(), Error> {
        let identity = DMatrix::<f64>::identity(self.dim, self.dim);
        for stencil in self.stencils.iter() {
            let n = stencil.vertices.len();
            for a in 0..n {
                for b in a..n {
                    let value = -coefficient * stencil.scale * stencil.weights[a] * stencil.weights[b];
                    matrix.add_entry(stencil.vertices[a], stencil.vertices[b], &(&identity * value))?;
                }
            }
        }
        Ok(())
    }
}

impl Force for LinearBendingElements {
    fn update_position(&mut self, x: &VectorField, _definite: bool) -> Result<(), Error> {
        check_size(self.num_vertices, x.nrows())?;
        check_size(self.dim, x.ncols())?;
        for (residual, stencil) in self.residuals.iter_mut().zip(self.stencils.iter()) {
            *residual = stencil.combine(x) - &stencil.rest;
        }
        Ok(())
    }

    fn elastic_energy(&self) -> f64 {
        self.stencils
            .iter()
            .zip(self.residuals.iter())
            .map(|(s, r)| 0.5 * self.stiffness * s.scale * r.norm_squared())
            .sum()
    }

    fn add_elastic_force(&self, f: &mut VectorField) {
        for (stencil, residual) in self.stencils.iter().zip(self.residuals.iter()) {
            self.scatter(stencil, -self.stiffness * stencil.scale, residual, f);
        }
    }

    fn add_elastic_differential(&self, df: &mut VectorField, dx: &VectorField) {
        self.add_operator(self.stiffness, df, dx);
    }

    fn damping_energy(&self, v: &VectorField) -> f64 {
        self.stencils
            .iter()
            .map(|s| 0.5 * self.damping * s.scale * s.combine(v).norm_squared())
            .sum()
    }

    fn add_damping_force(&self, f: &mut VectorField, v: &VectorField) {
        self.add_operator(self.damping, f, v);
    }

    fn gradient_assembly(&self) -> Option<&dyn GradientAssembly> {
        Some(self)
    }

    fn block_diagonal_gradient(&self) -> Option<&dyn BlockDiagonalGradient> {
        Some(self)
    }
}

impl GradientAssembly for LinearBendingElements {
    fn structure(&self, structure: &mut SolidMatrixStructure) {
        for stencil in self.stencils.iter() {
            structure.add_element(&stencil.vertices);
        }
    }

    fn add_elastic_gradient(&self, matrix: &mut SolidMatrix) -> Result<(), Error> {
        self.add_gradient(self.stiffness, matrix)
    }

    fn add_damping_gradient(&self, matrix: &mut SolidMatrix) -> Result<(), Error> {
        self.add_gradient(self.damping, matrix)
    }
}

impl BlockDiagonalGradient for LinearBendingElements {
    fn elastic_gradient_block_diagonal_times(&self, dx: &VectorField) -> VectorField {
        let mut out = VectorField::zeros(dx.nrows(), dx.ncols());
        for stencil in self.stencils.iter() {
            for (&v, &w) in stencil.vertices.iter().zip(stencil.weights.iter()) {
                let scale = -self.stiffness * stencil.scale * w * w;
                add_to_vertex(&mut out, v, &(vertex(dx, v) * scale));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn folded_quad() -> (TriangleMesh, VectorField) {
        let mesh = TriangleMesh::new(vec![[0, 1, 2], [0, 2, 3]]);
        let x = VectorField::from_row_slice(
            4,
            3,
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
        );
        (mesh, x)
    }

    #[test]
    fn surface_weights_sum_to_zero() {
        let (mesh, x) = folded_quad();
        let bend = LinearBendingElements::surface(&mesh, &x).unwrap();
        assert_eq!(bend.num_stencils(), 1);
        let stencil = &bend.stencils[0];
        assert_relative_eq!(stencil.weights.iter().sum::<f64>(), 0.0, epsilon = 1e-12);
        // Two unit right triangles.
        assert_relative_eq!(stencil.scale, 3.0);
    }

    #[test]
    fn translation_and_rest_have_no_energy() {
        let (mesh, x) = folded_quad();
        let mut bend = LinearBendingElements::surface(&mesh, &x).unwrap();
        bend.stiffness = 10.0;
        let shifted = x.map(|c| c + 0.5);
        bend.update_position(&shifted, false).unwrap();
        assert_relative_eq!(bend.elastic_energy(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn folding_costs_energy() {
        let (mesh, x) = folded_quad();
        let mut bend = LinearBendingElements::surface(&mesh, &x).unwrap();
        bend.stiffness = 10.0;
        let mut folded = x.clone();
        folded[(1, 2)] = 0.3;
        bend.update_position(&folded, false).unwrap();
        assert!(bend.elastic_energy() > 0.0);
        let mut f = VectorField::zeros(4, 3);
        bend.add_elastic_force(&mut f);
        assert!(f[(1, 2)] < 0.0);
    }

    #[test]
    fn curve_stencils() {
        let mesh = SegmentMesh::new(vec![[0, 1], [1, 2]]);
        let x = VectorField::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.0, 3.0, 0.0]);
        let bend = LinearBendingElements::curve(&mesh, &x).unwrap();
        let stencil = &bend.stencils[0];
        assert_eq!(stencil.vertices, vec![0, 1, 2]);
        assert_relative_eq!(stencil.weights[1], -1.5);
        assert_relative_eq!(stencil.scale, 2.0 / 3.0);
    }

    #[test]
    fn nearly_collinear_faces_are_rejected() {
        // Vertex 1 lies on the shared edge up to round-off.
        let mesh = TriangleMesh::new(vec![[0, 1, 2], [0, 2, 3]]);
        let p = [0.1, 0.7, 0.3];
        let x = VectorField::from_fn(4, 3, |v, k| match v {
            0 => 0.0,
            1 => p[k] / 3.0,
            2 => p[k],
            _ => [0.0, 0.0, 1.0][k],
        });
        assert!(matches!(
            LinearBendingElements::surface(&mesh, &x),
            Err(Error::DegenerateReferenceElement { degens }) if degens == vec![0]
        ));
    }

    #[test]
    fn coincident_curve_vertices_are_rejected() {
        let mesh = SegmentMesh::new(vec![[0, 1], [1, 2]]);
        let x = VectorField::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        assert!(matches!(
            LinearBendingElements::curve(&mesh, &x),
            Err(Error::DegenerateReferenceElement { .. })
        ));
    }

    #[test]
    fn degenerate_faces_are_rejected() {
        let mesh = TriangleMesh::new(vec![[0, 1, 2], [0, 2, 3]]);
        let x = VectorField::from_row_slice(
            4,
            3,
            &[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 2.0, 2.0, 0.0, 0.0, 1.0, 0.0],
        );
        assert!(matches!(
            LinearBendingElements::surface(&mesh, &x),
            Err(Error::DegenerateReferenceElement { .. })
        ));
    }
}
