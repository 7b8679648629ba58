/*!
 * The force interface implemented by every force model in this crate. Forces are evaluated at
 * the configuration last given to `update_position`, so callers synchronize the state once and
 * then query energies, forces and derivatives. Because these functions may be called many times
 * in an inner loop, implementers are advised to cache per-element quantities in
 * `update_position`.
 *
 * Forces are the negative energy gradient, and the "gradient" of a force is its Jacobian with
 * respect to positions (elastic) or velocities (damping). Capabilities that only some models
 * provide are exposed through the probes `gradient_assembly` and `block_diagonal_gradient`,
 * which return `None` when unsupported.
 */

use crate::matrix::{SolidMatrix, SolidMatrixStructure};
use crate::{Error, VectorField};

/// A force model with elastic and damping parts.
pub trait Force {
    /// Synchronize internal state with positions `x`.
    ///
    /// If `definite` is `true`, models that support it produce a negative semi-definite force
    /// gradient (a positive semi-definite stiffness), which is useful for implicit solvers.
    fn update_position(&mut self, x: &VectorField, definite: bool) -> Result<(), Error>;

    /// Elastic potential energy at the current configuration.
    fn elastic_energy(&self) -> f64;

    /// Add the elastic force at the current configuration to `f`.
    fn add_elastic_force(&self, f: &mut VectorField);

    /// Add the change in elastic force caused by a position change `dx` to `df`.
    fn add_elastic_differential(&self, df: &mut VectorField, dx: &VectorField);

    /// Damping potential (dissipation) for velocities `v` at the current configuration.
    fn damping_energy(&self, v: &VectorField) -> f64;

    /// Add the damping force for velocities `v` to `f`. Damping forces are linear in `v`.
    fn add_damping_force(&self, f: &mut VectorField, v: &VectorField);

    /// Access explicit gradient assembly if this model supports it.
    fn gradient_assembly(&self) -> Option<&dyn GradientAssembly> {
        None
    }

    /// Access the block diagonal elastic gradient product if this model supports it.
    fn block_diagonal_gradient(&self) -> Option<&dyn BlockDiagonalGradient> {
        None
    }
}

/// Assembly of force gradients into a `SolidMatrix`.
pub trait GradientAssembly {
    /// Declare the vertex couplings this force contributes to.
    fn structure(&self, structure: &mut SolidMatrixStructure);

    /// Add the elastic force Jacobian with respect to positions.
    fn add_elastic_gradient(&self, matrix: &mut SolidMatrix) -> Result<(), Error>;

    /// Add the damping force Jacobian with respect to velocities.
    fn add_damping_gradient(&self, matrix: &mut SolidMatrix) -> Result<(), Error>;
}

/// Product with the diagonal blocks of the elastic gradient. This is cheaper than the full
/// gradient and is used by block Jacobi style preconditioners.
pub trait BlockDiagonalGradient {
    fn elastic_gradient_block_diagonal_times(&self, dx: &VectorField) -> VectorField;
}

impl<F: Force + ?Sized> Force for Box<F> {
    fn update_position(&mut self, x: &VectorField, definite: bool) -> Result<(), Error> {
        (**self).update_position(x, definite)
    }
    fn elastic_energy(&self) -> f64 {
        (**self).elastic_energy()
    }
    fn add_elastic_force(&self, f: &mut VectorField) {
        (**self).add_elastic_force(f)
    }
    fn add_elastic_differential(&self, df: &mut VectorField, dx: &VectorField) {
        (**self).add_elastic_differential(df, dx)
    }
    fn damping_energy(&self, v: &VectorField) -> f64 {
        (**self).damping_energy(v)
    }
    fn add_damping_force(&self, f: &mut VectorField, v: &VectorField) {
        (**self).add_damping_force(f, v)
    }
    fn gradient_assembly(&self) -> Option<&dyn GradientAssembly> {
        (**self).gradient_assembly()
    }
    fn block_diagonal_gradient(&self) -> Option<&dyn BlockDiagonalGradient> {
        (**self).block_diagonal_gradient()
    }
}
