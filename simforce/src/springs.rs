//! Damped linear springs between pairs of vertices.

use na::{DMatrix, DVector};
use utils::{add_to_vertex, vertex};

use crate::force::*;
use crate::matrix::{SolidMatrix, SolidMatrixStructure};
use crate::mesh::validate_elements;
use crate::{check_size, Error, VectorField};

/// Per-spring state at the current configuration.
#[derive(Clone, Debug)]
struct SpringState {
    length: f64,
    /// Unit vector from the first to the second vertex.
    direction: DVector<f64>,
}

/// A network of springs.
///
/// Each spring with rest length `L` has stiffness `k = stiffness / L` and stores the energy
/// `k (l - L)^2 / 2` at current length `l`. The damping coefficient is `damping_ratio` times the
/// critical damping `2 sqrt(k m)` of the spring, where `m` is the harmonic mass of its endpoints.
/// Damping acts on the relative velocity along the spring.
#[derive(Clone, Debug)]
pub struct Springs {
    springs: Vec<[usize; 2]>,
    dim: usize,
    restlength: Vec<f64>,
    stiffness: Vec<f64>,
    damping: Vec<f64>,
    state: Vec<SpringState>,
    definite: bool,
}

impl Springs {
    pub fn new(
        springs: &[[usize; 2]],
        mass: &[f64],
        x: &VectorField,
        stiffness: f64,
        damping_ratio: f64,
    ) -> Result<Self, Error> {
        let n = x.nrows();
        check_size(n, mass.len())?;
        validate_elements(springs, n)?;
        if !(stiffness >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "stiffness".to_string(),
            });
        }
        if !(damping_ratio >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "damping_ratio".to_string(),
            });
        }

        let restlength: Vec<f64> = springs
            .iter()
            .map(|&[i, j]| (vertex(x, j) - vertex(x, i)).norm())
            .collect();

        let degens: Vec<usize> = restlength
            .iter()
            .enumerate()
            .filter(|&(_, &l)| !(l > 0.0))
            .map(|(s, _)| s)
            .collect();
        if !degens.is_empty() {
            return Err(Error::DegenerateReferenceElement { degens });
        }

        let spring_stiffness: Vec<f64> = restlength.iter().map(|&l| stiffness / l).collect();
        let damping = springs
            .iter()
            .zip(spring_stiffness.iter())
            .map(|(&[i, j], &k)| {
                let (mi, mj) = (mass[i], mass[j]);
                let harmonic_mass = if mi > 0.0 && mj > 0.0 {
                    mi * mj / (mi + mj)
                } else {
                    0.0
                };
                damping_ratio * 2.0 * (k * harmonic_mass).sqrt()
            })
            .collect();

        let mut result = Springs {
            springs: springs.to_vec(),
            dim: x.ncols(),
            restlength,
            stiffness: spring_stiffness,
            damping,
            state: Vec::new(),
            definite: false,
        };
        result.update_position(x, false)?;
        log::debug!("Created {} springs", result.springs.len());
        Ok(result)
    }

    pub fn num_springs(&self) -> usize {
        self.springs.len()
    }

    pub fn springs(&self) -> &[[usize; 2]] {
        &self.springs
    }

    pub fn restlengths(&self) -> &[f64] {
        &self.restlength
    }

    /// Per-spring damping coefficients.
    pub fn damping_coefficients(&self) -> &[f64] {
        &self.damping
    }

    /// Current spring lengths divided by rest lengths, minus one.
    pub fn strains(&self) -> Vec<f64> {
        self.state
            .iter()
            .zip(self.restlength.iter())
            .map(|(s, &l)| s.length / l - 1.0)
            .collect()
    }

    /// Elastic stiffness block `H` of spring `s`: the force on the second vertex changes by
    /// `-H (dx_j - dx_i)`.
    fn elastic_block(&self, s: usize) -> DMatrix<f64> {
        let SpringState { length, direction } = &self.state[s];
        let k = self.stiffness[s];
        let uut = direction * direction.transpose();
        let mut transverse = (length - self.restlength[s]) / length;
        if self.definite {
            transverse = transverse.max(0.0);
        }
        let identity = DMatrix::<f64>::identity(self.dim, self.dim);
        (&uut + (identity - &uut) * transverse) * k
    }

    fn damping_block(&self, s: usize) -> DMatrix<f64> {
        let u = &self.state[s].direction;
        u * u.transpose() * self.damping[s]
    }
}

impl Force for Springs {
    fn update_position(&mut self, x: &VectorField, definite: bool) -> Result<(), Error> {
        debug_assert_eq!(x.ncols(), self.dim);
        let state = self
            .springs
            .iter()
            .enumerate()
            .map(|(s, &[i, j])| {
                let edge = vertex(x, j) - vertex(x, i);
                let length = edge.norm();
                if length > 0.0 {
                    Ok(SpringState {
                        length,
                        direction: edge / length,
                    })
                } else {
                    Err(Error::CollapsedElement { element: s })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        // Only a successful update replaces the previous configuration.
        self.state = state;
        self.definite = definite;
        Ok(())
    }

    fn elastic_energy(&self) -> f64 {
        self.state
            .iter()
            .zip(self.restlength.iter().zip(self.stiffness.iter()))
            .map(|(s, (&l, &k))| 0.5 * k * (s.length - l) * (s.length - l))
            .sum()
    }

    fn add_elastic_force(&self, f: &mut VectorField) {
        for (s, &[i, j]) in self.springs.iter().enumerate() {
            let SpringState { length, direction } = &self.state[s];
            let fs = direction * (self.stiffness[s] * (length - self.restlength[s]));
            add_to_vertex(f, i, &fs);
            add_to_vertex(f, j, &-fs);
        }
    }

    fn add_elastic_differential(&self, df: &mut VectorField, dx: &VectorField) {
        for (s, &[i, j]) in self.springs.iter().enumerate() {
            let dfs = self.elastic_block(s) * (vertex(dx, j) - vertex(dx, i));
            add_to_vertex(df, i, &dfs);
            add_to_vertex(df, j, &-dfs);
        }
    }

    fn damping_energy(&self, v: &VectorField) -> f64 {
        self.springs
            .iter()
            .enumerate()
            .map(|(s, &[i, j])| {
                let rate = self.state[s].direction.dot(&(vertex(v, j) - vertex(v, i)));
                0.5 * self.damping[s] * rate * rate
            })
            .sum()
    }

    fn add_damping_force(&self, f: &mut VectorField, v: &VectorField) {
        for (s, &[i, j]) in self.springs.iter().enumerate() {
            let u = &self.state[s].direction;
            let rate = u.dot(&(vertex(v, j) - vertex(v, i)));
            let fs = u * (self.damping[s] * rate);
            add_to_vertex(f, i, &fs);
            add_to_vertex(f, j, &-fs);
        }
    }

    fn gradient_assembly(&self) -> Option<&dyn GradientAssembly> {
        Some(self)
    }

    fn block_diagonal_gradient(&self) -> Option<&dyn BlockDiagonalGradient> {
        Some(self)
    }
}

/// Scatter a two-vertex coupling block `b` into the matrix as `[[-b, b], [b, -b]]`.
fn add_pair_block(
    matrix: &mut SolidMatrix,
    [i, j]: [usize; 2],
    b: &DMatrix<f64>,
) -> Result<(), Error> {
    let neg = -b;
    matrix.add_entry(i, i, &neg)?;
    matrix.add_entry(j, j, &neg)?;
    matrix.add_entry(i, j, b)
}

impl GradientAssembly for Springs {
    fn structure(&self, structure: &mut SolidMatrixStructure) {
        for &[i, j] in self.springs.iter() {
            structure.add_entry(i, j);
        }
    }

    fn add_elastic_gradient(&self, matrix: &mut SolidMatrix) -> Result<(), Error> {
        for (s, &spring) in self.springs.iter().enumerate() {
            add_pair_block(matrix, spring, &self.elastic_block(s))?;
        }
        Ok(())
    }

    fn add_damping_gradient(&self, matrix: &mut SolidMatrix) -> Result<(), Error> {
        for (s, &spring) in self.springs.iter().enumerate() {
            add_pair_block(matrix, spring, &self.damping_block(s))?;
        }
        Ok(())
    }
}

impl BlockDiagonalGradient for Springs {
    fn elastic_gradient_block_diagonal_times(&self, dx: &VectorField) -> VectorField {
        let mut out = VectorField::zeros(dx.nrows(), dx.ncols());
        for (s, &[i, j]) in self.springs.iter().enumerate() {
            let h = self.elastic_block(s);
            add_to_vertex(&mut out, i, &-(&h * vertex(dx, i)));
            add_to_vertex(&mut out, j, &-(&h * vertex(dx, j)));
        }
        out
    }
}
