//! Norms and comparisons of vertex-indexed vector fields.
//!
//! Fields are `DMatrix<f64>` values with one row per vertex. Scalars such as energies are compared
//! through the same helpers by wrapping them in a `1x1` matrix.

use na::{DMatrix, DVector};

/// Absolute floor used by `relative_error` to avoid dividing by zero when both inputs vanish.
pub const ABSOLUTE_ERROR_FLOOR: f64 = 1e-30;

/// Largest absolute entry of the given field. Returns zero for empty fields.
pub fn maxabs(a: &DMatrix<f64>) -> f64 {
    a.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs()))
}

/// Euclidean magnitude of every row (vertex) of the field.
pub fn magnitudes(a: &DMatrix<f64>) -> Vec<f64> {
    a.row_iter().map(|row| row.norm()).collect()
}

/// Error between `a` and `b` relative to the larger of the two magnitudes.
///
/// Computes `maxabs(a - b) / max(maxabs(a), maxabs(b), ABSOLUTE_ERROR_FLOOR)`, so two fields
/// that are both zero compare with zero error.
pub fn relative_error(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    debug_assert_eq!(a.shape(), b.shape());
    let scale = maxabs(a).max(maxabs(b)).max(ABSOLUTE_ERROR_FLOOR);
    maxabs(&(a - b)) / scale
}

/// Scalar version of `relative_error`.
pub fn relative_error_scalar(a: f64, b: f64) -> f64 {
    (a - b).abs() / a.abs().max(b.abs()).max(ABSOLUTE_ERROR_FLOOR)
}

/// Error between scalars `a` and `b` relative to the larger of `|a|`, `|b|` and `scale`.
///
/// Useful when `a` and `b` can both be much smaller than the terms they are summed from, as with
/// the work done by a force along a displacement.
pub fn relative_error_scalar_scaled(a: f64, b: f64, scale: f64) -> f64 {
    (a - b).abs() / a.abs().max(b.abs()).max(scale).max(ABSOLUTE_ERROR_FLOOR)
}

/// Sum over vertices of `|f_i| |dx_i|`, the magnitude of the work `f · dx` without cancellation
/// between vertices or directions.
pub fn work_magnitude(f: &DMatrix<f64>, dx: &DMatrix<f64>) -> f64 {
    debug_assert_eq!(f.shape(), dx.shape());
    f.row_iter()
        .zip(dx.row_iter())
        .map(|(fi, dxi)| fi.norm() * dxi.norm())
        .sum()
}

/// The vector stored at row `i`.
#[inline]
pub fn vertex(a: &DMatrix<f64>, i: usize) -> DVector<f64> {
    a.row(i).transpose()
}

/// Add `v` to the vector stored at row `i`.
#[inline]
pub fn add_to_vertex(a: &mut DMatrix<f64>, i: usize, v: &DVector<f64>) {
    let mut row = a.row_mut(i);
    row += v.transpose();
}

/// Copy of `a` with every row except `vertex` set to zero.
pub fn restrict_to_vertex(a: &DMatrix<f64>, vertex: usize) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(a.nrows(), a.ncols());
    out.row_mut(vertex).copy_from(&a.row(vertex));
    out
}
