use na::DVector;
use utils::{add_to_vertex, vertex};

use crate::force::*;
use crate::matrix::{SolidMatrix, SolidMatrixStructure};
use crate::{check_size, Error, VectorField};

/// A constant directional force acting on vertex masses.
///
/// Gravity is a position based energy `-Σ mᵢ g·xᵢ`. It has no damping and its gradient is zero.
#[derive(Clone, Debug)]
pub struct Gravity {
    mass: Vec<f64>,
    g: DVector<f64>,
    energy: f64,
}

impl Gravity {
    pub fn new(mass: &[f64], gravity: &[f64]) -> Self {
        Gravity {
            mass: mass.to_vec(),
            g: DVector::from_column_slice(gravity),
            energy: 0.0,
        }
    }

    pub fn acceleration(&self) -> &DVector<f64> {
        &self.g
    }
}

impl Force for Gravity {
    fn update_position(&mut self, x: &VectorField, _definite: bool) -> Result<(), Error> {
        check_size(self.mass.len(), x.nrows())?;
        check_size(self.g.len(), x.ncols())?;
        self.energy = self
            .mass
            .iter()
            .enumerate()
            .map(|(i, &m)| -m * self.g.dot(&vertex(x, i)))
            .sum();
        Ok(())
    }

    fn elastic_energy(&self) -> f64 {
        self.energy
    }

    fn add_elastic_force(&self, f: &mut VectorField) {
        for (i, &m) in self.mass.iter().enumerate() {
            add_to_vertex(f, i, &(&self.g * m));
        }
    }

    fn add_elastic_differential(&self, _df: &mut VectorField, _dx: &VectorField) {}

    fn damping_energy(&self, _v: &VectorField) -> f64 {
        0.0
    }

    fn add_damping_force(&self, _f: &mut VectorField, _v: &VectorField) {}

    fn gradient_assembly(&self) -> Option<&dyn GradientAssembly> {
        Some(self)
    }
}

impl GradientAssembly for Gravity {
    fn structure(&self, _structure: &mut SolidMatrixStructure) {}

    fn add_elastic_gradient(&self, _matrix: &mut SolidMatrix) -> Result<(), Error> {
        Ok(())
    }

    fn add_damping_gradient(&self, _matrix: &mut SolidMatrix) -> Result<(), Error> {
        Ok(())
    }
}
