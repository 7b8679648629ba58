pub mod field;

/**
 * This crate provides various convenience functions for working with vertex-indexed vector fields.
 */
pub use crate::field::*;

/// A dense vertex-indexed vector field: one row per vertex, one column per ambient coordinate.
pub type VectorField = na::DMatrix<f64>;

/// Generate a random vector field of `n` vectors of dimension `dim` with entries uniformly
/// sampled from `[-scale, scale)`.
pub fn random_field<R: rand::Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    dim: usize,
    scale: f64,
) -> VectorField {
    use rand::distributions::Uniform;
    let range = Uniform::new(-1.0, 1.0);
    VectorField::from_fn(n, dim, |_, _| scale * rng.sample(&range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn random_field_respects_scale() {
        let mut rng = StdRng::from_seed([3; 32]);
        let f = random_field(&mut rng, 7, 3, 1e-3);
        assert_eq!(f.shape(), (7, 3));
        assert!(maxabs(&f) <= 1e-3);
        assert!(maxabs(&f) > 0.0);
    }

    #[test]
    fn random_field_is_reproducible_with_seed() {
        let a = random_field(&mut StdRng::from_seed([3; 32]), 4, 2, 1.0);
        let b = random_field(&mut StdRng::from_seed([3; 32]), 4, 2, 1.0);
        assert_eq!(a, b);
    }
}
