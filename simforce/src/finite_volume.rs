//! Finite volume elastic forces built from a strain measure and a constitutive model.

use na::DMatrix;
use utils::{add_to_vertex, vertex};

use crate::force::*;
use crate::material::{ConstitutiveModel, LinearElasticity, StretchLimitPlasticity};
use crate::matrix::{SolidMatrix, SolidMatrixStructure};
use crate::strain::{Sample, StrainMeasure};
use crate::{check_size, Error, VectorField};

/// Elastic force summing `w Ψ(F)` over the quadrature samples of a strain measure, with
/// stiffness proportional Rayleigh damping.
///
/// When `plasticity` is set, each sample carries a plastic deformation `Fp` and the model sees
/// the elastic part `F Fp⁻¹`. Plastic flow only happens in `update_plasticity`.
#[derive(Clone, Debug)]
pub struct FiniteVolume<M> {
    strain: StrainMeasure,
    model: M,
    density: f64,
    plasticity: Option<StretchLimitPlasticity>,
    /// Inverse plastic deformation per sample.
    plastic_inverse: Vec<DMatrix<f64>>,
    /// Shape function gradients with plastic deformation applied, `G Fp⁻¹`.
    shape_gradients: Vec<DMatrix<f64>>,
    /// Elastic deformation gradient per sample at the current configuration.
    deformation: Vec<DMatrix<f64>>,
}

/// Linear elastic finite volume force.
pub type LinearFiniteVolume = FiniteVolume<LinearElasticity>;

impl<M: ConstitutiveModel> FiniteVolume<M> {
    pub fn new(
        strain: StrainMeasure,
        density: f64,
        model: M,
        plasticity: Option<StretchLimitPlasticity>,
    ) -> Result<Self, Error> {
        if !(density >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "density".to_string(),
            });
        }
        if let Some(StretchLimitPlasticity { yield_stretch }) = plasticity {
            if !(yield_stretch >= 1.0) {
                return Err(Error::InvalidParameter {
                    name: "yield_stretch".to_string(),
                });
            }
        }

        let d = strain.kind().material_dimension();
        let samples = strain.samples();
        let plastic_inverse = vec![DMatrix::identity(d, d); samples.len()];
        let shape_gradients = samples.iter().map(|s| s.shape_gradient.clone()).collect();
        // Rest configurations are undeformed, so F coincides with the rest frame.
        let deformation = samples.iter().map(|s| s.frame.clone()).collect();

        log::debug!(
            "Created {:?} finite volume force with {} samples",
            strain.kind(),
            samples.len()
        );

        Ok(FiniteVolume {
            strain,
            model,
            density,
            plasticity,
            plastic_inverse,
            shape_gradients,
            deformation,
        })
    }

    pub fn strain(&self) -> &StrainMeasure {
        &self.strain
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn plasticity(&self) -> Option<StretchLimitPlasticity> {
        self.plasticity
    }

    /// Lumped vertex masses.
    pub fn lumped_mass(&self) -> Vec<f64> {
        self.strain.lumped_mass(self.density)
    }

    /// Elastic deformation gradients per sample at the current configuration.
    pub fn deformation_gradients(&self) -> &[DMatrix<f64>] {
        &self.deformation
    }

    /// Move elastic principal stretches outside the yield range into the plastic deformation.
    ///
    /// Returns the number of samples that yielded. Without plasticity this does nothing.
    pub fn update_plasticity(&mut self) -> usize {
        let plasticity = match self.plasticity {
            Some(p) => p,
            None => return 0,
        };

        let mut yielded = 0;
        for (q, sample) in self.strain.samples().iter().enumerate() {
            let svd = self.deformation[q].clone().svd(true, true);
            let (u, v_t) = match (svd.u, svd.v_t) {
                (Some(u), Some(v_t)) => (u, v_t),
                _ => continue,
            };
            let sigma = svd.singular_values;
            if sigma.iter().all(|&s| plasticity.clamp(s) == s) || sigma.iter().any(|&s| s <= 0.0) {
                continue;
            }
            let clamped = sigma.map(|s| plasticity.clamp(s));
            // With F = U Σ Vᵀ, right multiplying by V Σ⁻¹ Σ' Vᵀ leaves U Σ' Vᵀ.
            let ratio = clamped.component_div(&sigma);
            let correction = v_t.transpose() * DMatrix::from_diagonal(&ratio) * &v_t;
            self.plastic_inverse[q] = &self.plastic_inverse[q] * &correction;
            self.shape_gradients[q] = &sample.shape_gradient * &self.plastic_inverse[q];
            self.deformation[q] = u * DMatrix::from_diagonal(&clamped) * v_t;
            yielded += 1;
        }
        if yielded > 0 {
            log::warn!("{} samples yielded", yielded);
        }
        yielded
    }

    /// Deformation gradient of `x` at sample `q`, including plastic deformation.
    fn sample_deformation(&self, q: usize, x: &VectorField) -> DMatrix<f64> {
        let sample = &self.strain.samples()[q];
        let g = &self.shape_gradients[q];
        let mut f = DMatrix::zeros(x.ncols(), g.ncols());
        for (a, &v) in sample.vertices.iter().enumerate() {
            f += vertex(x, v) * g.row(a);
        }
        f
    }

    /// Scatter per-vertex sample contributions `-w G dPᵀ` into `out`.
    fn add_sample_force(&self, q: usize, stress: &DMatrix<f64>, out: &mut VectorField) {
        let sample = &self.strain.samples()[q];
        let contribution = &self.shape_gradients[q] * stress.transpose() * -sample.weight;
        for (a, &v) in sample.vertices.iter().enumerate() {
            add_to_vertex(out, v, &contribution.row(a).transpose());
        }
    }

    /// Force Jacobian blocks of sample `q`: entry `[a][b]` is the change in force on element
    /// vertex `a` per unit displacement of element vertex `b`.
    fn sample_gradient(&self, q: usize) -> Vec<Vec<DMatrix<f64>>> {
        let sample: &Sample = &self.strain.samples()[q];
        let g = &self.shape_gradients[q];
        let f = &self.deformation[q];
        let m = f.nrows();
        let k = sample.vertices.len();
        let mut blocks = vec![vec![DMatrix::zeros(m, m); k]; k];
        for b in 0..k {
            for c in 0..m {
                let mut df = DMatrix::zeros(m, g.ncols());
                df.set_row(c, &g.row(b));
                let dp = self.model.stress_differential(f, &sample.frame, &df);
                let df_vertices = g * dp.transpose() * -sample.weight;
                for a in 0..k {
                    blocks[a][b].set_column(c, &df_vertices.row(a).transpose());
                }
            }
        }
        blocks
    }

    fn add_gradient(&self, matrix: &mut SolidMatrix, scale: f64) -> Result<(), Error> {
        for (q, sample) in self.strain.samples().iter().enumerate() {
            let blocks = self.sample_gradient(q);
            for (a, &i) in sample.vertices.iter().enumerate() {
                for (b, &j) in sample.vertices.iter().enumerate().skip(a) {
                    matrix.add_entry(i, j, &(&blocks[a][b] * scale))?;
                }
            }
        }
        Ok(())
    }
}

impl<M: ConstitutiveModel> Force for FiniteVolume<M> {
    fn update_position(&mut self, x: &VectorField, _definite: bool) -> Result<(), Error> {
        check_size(self.strain.num_vertices(), x.nrows())?;
        check_size(self.strain.kind().ambient_dimension(), x.ncols())?;
        let deformation = self
            .strain
            .samples()
            .iter()
            .enumerate()
            .map(|(q, sample)| -> Result<DMatrix<f64>, Error> {
                let f = self.sample_deformation(q, x);
                self.model
                    .check_deformation(sample.element, &f, &sample.frame)?;
                Ok(f)
            })
            .collect::<Result<Vec<_>, _>>()?;
        // Only a successful update replaces the previous configuration.
        self.deformation = deformation;
        Ok(())
    }

    fn elastic_energy(&self) -> f64 {
        self.strain
            .samples()
            .iter()
            .zip(self.deformation.iter())
            .map(|(s, f)| s.weight * self.model.energy_density(f, &s.frame))
            .sum()
    }

    fn add_elastic_force(&self, f: &mut VectorField) {
        for (q, sample) in self.strain.samples().iter().enumerate() {
            let stress = self.model.stress(&self.deformation[q], &sample.frame);
            self.add_sample_force(q, &stress, f);
        }
    }

    fn add_elastic_differential(&self, df: &mut VectorField, dx: &VectorField) {
        for (q, sample) in self.strain.samples().iter().enumerate() {
            let d_deformation = self.sample_deformation(q, dx);
            let d_stress =
                self.model
                    .stress_differential(&self.deformation[q], &sample.frame, &d_deformation);
            self.add_sample_force(q, &d_stress, df);
        }
    }

    fn damping_energy(&self, v: &VectorField) -> f64 {
        let beta = self.model.rayleigh_coefficient();
        self.strain
            .samples()
            .iter()
            .enumerate()
            .map(|(q, sample)| {
                let dfv = self.sample_deformation(q, v);
                let dp = self
                    .model
                    .stress_differential(&self.deformation[q], &sample.frame, &dfv);
                0.5 * beta * sample.weight * dfv.dot(&dp)
            })
            .sum()
    }

    fn add_damping_force(&self, f: &mut VectorField, v: &VectorField) {
        let beta = self.model.rayleigh_coefficient();
        let mut df = VectorField::zeros(f.nrows(), f.ncols());
        self.add_elastic_differential(&mut df, v);
        *f += df * beta;
    }

    fn gradient_assembly(&self) -> Option<&dyn GradientAssembly> {
        Some(self)
    }

    fn block_diagonal_gradient(&self) -> Option<&dyn BlockDiagonalGradient> {
        Some(self)
    }
}

impl<M: ConstitutiveModel> GradientAssembly for FiniteVolume<M> {
    fn structure(&self, structure: &mut SolidMatrixStructure) {
        for sample in self.strain.samples().iter() {
            structure.add_element(&sample.vertices);
        }
    }

    fn add_elastic_gradient(&self, matrix: &mut SolidMatrix) -> Result<(), Error> {
        self.add_gradient(matrix, 1.0)
    }

    fn add_damping_gradient(&self, matrix: &mut SolidMatrix) -> Result<(), Error> {
        self.add_gradient(matrix, self.model.rayleigh_coefficient())
    }
}

impl<M: ConstitutiveModel> BlockDiagonalGradient for FiniteVolume<M> {
    fn elastic_gradient_block_diagonal_times(&self, dx: &VectorField) -> VectorField {
        let mut out = VectorField::zeros(dx.nrows(), dx.ncols());
        for (q, sample) in self.strain.samples().iter().enumerate() {
            let blocks = self.sample_gradient(q);
            for (a, &i) in sample.vertices.iter().enumerate() {
                add_to_vertex(&mut out, i, &(&blocks[a][a] * vertex(dx, i)));
            }
        }
        out
    }
}
