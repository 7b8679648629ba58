//! Constitutive models used by finite volume forces, and their parameter sets.

use na::DMatrix;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Lamé parameters of an isotropic elastic material.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElasticityParameters {
    /// First Lamé parameter. Measured in Pa = N/m² = kg/(ms²).
    pub lambda: f64,
    /// Second Lamé parameter (shear modulus). Measured in Pa = N/m² = kg/(ms²).
    pub mu: f64,
}

impl ElasticityParameters {
    pub fn scaled(self, scale: f64) -> ElasticityParameters {
        ElasticityParameters {
            lambda: self.lambda * scale,
            mu: self.mu * scale,
        }
    }

    pub fn from_bulk_shear(bulk: f64, shear: f64) -> Self {
        ElasticityParameters {
            lambda: bulk - 2.0 * shear / 3.0,
            mu: shear,
        }
    }

    pub fn from_young_poisson(young: f64, poisson: f64) -> Self {
        ElasticityParameters {
            lambda: young * poisson / ((1.0 + poisson) * (1.0 - 2.0 * poisson)),
            mu: young / (2.0 * (1.0 + poisson)),
        }
    }
}

/// Material model interface. Abstracting over models is useful for damping implementations like
/// Rayleigh damping which depend on the elasticity model used.
///
/// All functions take the elastic deformation gradient `f` (`m x d`) of a sample along with the
/// orthonormal rest `frame` of that sample (see `Sample::frame`).
pub trait ConstitutiveModel {
    /// Strain energy per unit rest measure.
    fn energy_density(&self, f: &DMatrix<f64>, frame: &DMatrix<f64>) -> f64;

    /// First Piola-Kirchhoff stress, the derivative of the energy density with respect to `f`.
    fn stress(&self, f: &DMatrix<f64>, frame: &DMatrix<f64>) -> DMatrix<f64>;

    /// Change in stress caused by a change `df` in the deformation gradient.
    fn stress_differential(
        &self,
        f: &DMatrix<f64>,
        frame: &DMatrix<f64>,
        df: &DMatrix<f64>,
    ) -> DMatrix<f64>;

    /// Coefficient of stiffness proportional Rayleigh damping.
    fn rayleigh_coefficient(&self) -> f64;

    /// Verify that the model is defined at `f`.
    fn check_deformation(
        &self,
        _element: usize,
        _f: &DMatrix<f64>,
        _frame: &DMatrix<f64>,
    ) -> Result<(), Error> {
        Ok(())
    }
}

/// Compressible Neo-Hookean material:
///
/// `Ψ = μ/2 (tr C - d) - μ ln J + λ/2 (ln J)²` with `C = FᵀF` and `J = √det C`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NeoHookean {
    pub elasticity: ElasticityParameters,
    pub rayleigh_coefficient: f64,
    /// Elements whose area or volume ratio `J` drops to this value are considered failed.
    pub failure_threshold: f64,
}

impl NeoHookean {
    pub fn new(
        youngs_modulus: f64,
        poissons_ratio: f64,
        rayleigh_coefficient: f64,
        failure_threshold: f64,
    ) -> Self {
        NeoHookean {
            elasticity: ElasticityParameters::from_young_poisson(youngs_modulus, poissons_ratio),
            rayleigh_coefficient,
            failure_threshold,
        }
    }

    fn volume_ratio(f: &DMatrix<f64>) -> f64 {
        if f.is_square() {
            f.determinant()
        } else {
            (f.transpose() * f).determinant().max(0.0).sqrt()
        }
    }
}

/// Invert the right Cauchy-Green tensor. Callers check that `F` is not degenerate first.
fn inverse_cauchy_green(f: &DMatrix<f64>) -> DMatrix<f64> {
    let c = f.transpose() * f;
    let d = c.nrows();
    c.try_inverse()
        .unwrap_or_else(|| DMatrix::from_element(d, d, f64::NAN))
}

#[allow(non_snake_case)]
impl ConstitutiveModel for NeoHookean {
    fn energy_density(&self, f: &DMatrix<f64>, _frame: &DMatrix<f64>) -> f64 {
        let ElasticityParameters { lambda, mu } = self.elasticity;
        let d = f.ncols() as f64;
        let C = f.transpose() * f;
        let log_J = 0.5 * C.determinant().ln();
        0.5 * mu * (C.trace() - d) - mu * log_J + 0.5 * lambda * log_J * log_J
    }

    fn stress(&self, f: &DMatrix<f64>, _frame: &DMatrix<f64>) -> DMatrix<f64> {
        let ElasticityParameters { lambda, mu } = self.elasticity;
        let C_inv = inverse_cauchy_green(f);
        let log_J = -0.5 * C_inv.determinant().ln();
        f * mu + f * C_inv * (lambda * log_J - mu)
    }

    fn stress_differential(
        &self,
        f: &DMatrix<f64>,
        _frame: &DMatrix<f64>,
        df: &DMatrix<f64>,
    ) -> DMatrix<f64> {
        let ElasticityParameters { lambda, mu } = self.elasticity;
        let C_inv = inverse_cauchy_green(f);
        let log_J = -0.5 * C_inv.determinant().ln();
        let ft_df = f.transpose() * df;
        let dC = &ft_df + ft_df.transpose();
        let F_C_inv = f * &C_inv;
        let d_log_J = (&C_inv * &ft_df).trace();

        let d_F_C_inv = df * &C_inv - &F_C_inv * dC * &C_inv;
        df * mu + d_F_C_inv * (lambda * log_J - mu) + F_C_inv * (lambda * d_log_J)
    }

    fn rayleigh_coefficient(&self) -> f64 {
        self.rayleigh_coefficient
    }

    fn check_deformation(
        &self,
        element: usize,
        f: &DMatrix<f64>,
        _frame: &DMatrix<f64>,
    ) -> Result<(), Error> {
        let ratio = Self::volume_ratio(f);
        if ratio > self.failure_threshold.max(0.0) {
            Ok(())
        } else {
            Err(Error::ElementFailure { element, ratio })
        }
    }
}

/// Small strain linear elasticity measured in the rest frame `Q` of each sample:
///
/// `ε = sym(QᵀF) - I`, `Ψ = μ ε:ε + λ/2 (tr ε)²`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LinearElasticity {
    pub elasticity: ElasticityParameters,
    pub rayleigh_coefficient: f64,
}

impl LinearElasticity {
    pub fn new(youngs_modulus: f64, poissons_ratio: f64, rayleigh_coefficient: f64) -> Self {
        LinearElasticity {
            elasticity: ElasticityParameters::from_young_poisson(youngs_modulus, poissons_ratio),
            rayleigh_coefficient,
        }
    }

    fn small_strain(f: &DMatrix<f64>, frame: &DMatrix<f64>) -> DMatrix<f64> {
        let qf = frame.transpose() * f;
        let d = qf.nrows();
        (&qf + qf.transpose()) * 0.5 - DMatrix::identity(d, d)
    }

    /// Stress in the rest frame for strain (or strain change) `e`.
    fn frame_stress(&self, e: &DMatrix<f64>) -> DMatrix<f64> {
        let ElasticityParameters { lambda, mu } = self.elasticity;
        let d = e.nrows();
        e * (2.0 * mu) + DMatrix::identity(d, d) * (lambda * e.trace())
    }
}

impl ConstitutiveModel for LinearElasticity {
    fn energy_density(&self, f: &DMatrix<f64>, frame: &DMatrix<f64>) -> f64 {
        let ElasticityParameters { lambda, mu } = self.elasticity;
        let e = Self::small_strain(f, frame);
        let tr = e.trace();
        mu * e.norm_squared() + 0.5 * lambda * tr * tr
    }

    fn stress(&self, f: &DMatrix<f64>, frame: &DMatrix<f64>) -> DMatrix<f64> {
        frame * self.frame_stress(&Self::small_strain(f, frame))
    }

    fn stress_differential(
        &self,
        _f: &DMatrix<f64>,
        frame: &DMatrix<f64>,
        df: &DMatrix<f64>,
    ) -> DMatrix<f64> {
        let qdf = frame.transpose() * df;
        let de = (&qdf + qdf.transpose()) * 0.5;
        frame * self.frame_stress(&de)
    }

    fn rayleigh_coefficient(&self) -> f64 {
        self.rayleigh_coefficient
    }
}

/// Models keyed by element dimension: `planar` for triangles and `volumetric` for tetrahedra.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ByElementDimension<M> {
    pub planar: Option<M>,
    pub volumetric: Option<M>,
}

impl<M> ByElementDimension<M> {
    pub fn get(self, element_dimension: usize) -> Option<M> {
        match element_dimension {
            2 => self.planar,
            3 => self.volumetric,
            _ => None,
        }
    }
}

/// Resolution of a model argument for a given element dimension.
///
/// A single model resolves to itself. A `ByElementDimension` map resolves to the entry for the
/// element dimension, or fails with `Error::MissingModel`.
pub trait ResolveModel<M> {
    fn resolve(self, element_dimension: usize) -> Result<M, Error>;
}

impl<M: ConstitutiveModel> ResolveModel<M> for M {
    fn resolve(self, _element_dimension: usize) -> Result<M, Error> {
        Ok(self)
    }
}

impl<M: ConstitutiveModel> ResolveModel<M> for ByElementDimension<M> {
    fn resolve(self, element_dimension: usize) -> Result<M, Error> {
        self.get(element_dimension).ok_or(Error::MissingModel {
            element: element_dimension,
        })
    }
}

/// Plasticity that limits the principal stretches of the elastic deformation to the range
/// `[1 / yield_stretch, yield_stretch]`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StretchLimitPlasticity {
    pub yield_stretch: f64,
}

impl StretchLimitPlasticity {
    pub fn new(yield_stretch: f64) -> Self {
        StretchLimitPlasticity { yield_stretch }
    }

    /// Clamp a single principal stretch.
    pub fn clamp(&self, stretch: f64) -> f64 {
        stretch.max(1.0 / self.yield_stretch).min(self.yield_stretch)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeoHookeanParams {
    pub youngs_modulus: f64,
    pub poissons_ratio: f64,
    pub rayleigh_coefficient: f64,
    pub failure_threshold: f64,
}

impl Default for NeoHookeanParams {
    fn default() -> Self {
        NeoHookeanParams {
            youngs_modulus: 3e6,
            poissons_ratio: 0.475,
            rayleigh_coefficient: 0.05,
            failure_threshold: 0.25,
        }
    }
}

impl NeoHookeanParams {
    pub fn model(&self) -> NeoHookean {
        NeoHookean::new(
            self.youngs_modulus,
            self.poissons_ratio,
            self.rayleigh_coefficient,
            self.failure_threshold,
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearFiniteVolumeParams {
    pub youngs_modulus: f64,
    pub poissons_ratio: f64,
    pub rayleigh_coefficient: f64,
}

impl Default for LinearFiniteVolumeParams {
    fn default() -> Self {
        LinearFiniteVolumeParams {
            youngs_modulus: 3e6,
            poissons_ratio: 0.4,
            rayleigh_coefficient: 0.05,
        }
    }
}

impl LinearFiniteVolumeParams {
    pub fn model(&self) -> LinearElasticity {
        LinearElasticity::new(
            self.youngs_modulus,
            self.poissons_ratio,
            self.rayleigh_coefficient,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_deformation() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[1.1, 0.2, 0.0, -0.1, 0.9, 0.05, 0.0, 0.1, 1.2])
    }

    /// Compare the stress against a central difference of the energy density and the stress
    /// differential against a central difference of the stress.
    fn check_derivatives<M: ConstitutiveModel>(model: &M, f: &DMatrix<f64>, frame: &DMatrix<f64>) {
        let h = 1e-6;
        let p = model.stress(f, frame);
        let df = DMatrix::from_fn(f.nrows(), f.ncols(), |r, c| 0.3 * r as f64 - 0.2 * c as f64 + 0.1);
        for r in 0..f.nrows() {
            for c in 0..f.ncols() {
                let mut fp = f.clone();
                fp[(r, c)] += h;
                let mut fm = f.clone();
                fm[(r, c)] -= h;
                let fd = (model.energy_density(&fp, frame) - model.energy_density(&fm, frame))
                    / (2.0 * h);
                assert_relative_eq!(p[(r, c)], fd, max_relative = 1e-5, epsilon = 1e-6);
            }
        }
        let dp = model.stress_differential(f, frame, &df);
        let fd = (model.stress(&(f + &df * h), frame) - model.stress(&(f - &df * h), frame))
            / (2.0 * h);
        assert_relative_eq!(dp, fd, max_relative = 1e-5, epsilon = 1e-6);
    }

    #[test]
    fn lame_parameters() {
        let p = ElasticityParameters::from_young_poisson(3.0, 0.25);
        assert_relative_eq!(p.mu, 1.2);
        assert_relative_eq!(p.lambda, 1.2);
    }

    #[test]
    fn neo_hookean_rest_state_is_stress_free() {
        let model = NeoHookean::new(1.0, 0.3, 0.0, 0.25);
        let identity = DMatrix::identity(3, 3);
        assert_relative_eq!(model.energy_density(&identity, &identity), 0.0);
        assert_relative_eq!(
            model.stress(&identity, &identity),
            DMatrix::zeros(3, 3),
            epsilon = 1e-14
        );
    }

    #[test]
    fn neo_hookean_derivatives() {
        let model = NeoHookean::new(1.0, 0.3, 0.0, 0.25);
        check_derivatives(&model, &sample_deformation(), &DMatrix::identity(3, 3));
    }

    #[test]
    fn neo_hookean_shell_derivatives() {
        let model = NeoHookean::new(1.0, 0.3, 0.0, 0.25);
        let f = DMatrix::from_row_slice(3, 2, &[1.1, 0.1, 0.0, 0.9, 0.2, -0.1]);
        let frame = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        check_derivatives(&model, &f, &frame);
    }

    #[test]
    fn linear_elasticity_derivatives() {
        let model = LinearElasticity::new(1.0, 0.4, 0.0);
        check_derivatives(&model, &sample_deformation(), &DMatrix::identity(3, 3));
        let f = DMatrix::from_row_slice(2, 2, &[1.05, 0.1, -0.02, 0.97]);
        check_derivatives(&model, &f, &DMatrix::identity(2, 2));
    }

    #[test]
    fn compressed_element_fails() {
        let model = NeoHookean::new(1.0, 0.3, 0.0, 0.25);
        let identity = DMatrix::<f64>::identity(3, 3);
        let squashed = &identity * 0.5;
        assert!(model.check_deformation(0, &identity, &identity).is_ok());
        assert!(matches!(
            model.check_deformation(4, &squashed, &identity),
            Err(Error::ElementFailure { element: 4, .. })
        ));
    }

    #[test]
    fn models_resolve_by_element_dimension() {
        let planar = NeoHookean::new(1.0, 0.3, 0.0, 0.25);
        let map = ByElementDimension {
            planar: Some(planar),
            volumetric: None,
        };
        assert_eq!(ResolveModel::<NeoHookean>::resolve(map, 2).unwrap(), planar);
        assert!(matches!(
            ResolveModel::<NeoHookean>::resolve(map, 3),
            Err(Error::MissingModel { element: 3 })
        ));
        assert_eq!(ResolveModel::<NeoHookean>::resolve(planar, 3).unwrap(), planar);
    }

    #[test]
    fn stretch_limit_clamps_both_ways() {
        let plasticity = StretchLimitPlasticity::new(2.0);
        assert_eq!(plasticity.clamp(3.0), 2.0);
        assert_eq!(plasticity.clamp(0.25), 0.5);
        assert_eq!(plasticity.clamp(1.5), 1.5);
    }
}
