#![allow(dead_code)]

use rand::{rngs::StdRng, SeedableRng};
use simforce::{SegmentMesh, TetMesh, TriangleMesh, VectorField};

pub fn init_logger() {
    let _ = env_logger::Builder::from_env("SIMFORCE_LOG")
        .is_test(true)
        .try_init();
}

/// A regular grid of `nx` by `ny` unit squares in the plane, each split into two
/// counter-clockwise triangles.
pub fn make_grid(nx: usize, ny: usize) -> (TriangleMesh, VectorField) {
    let idx = |i: usize, j: usize| j * (nx + 1) + i;
    let mut faces = Vec::with_capacity(2 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            faces.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
            faces.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
        }
    }
    let x = VectorField::from_fn((nx + 1) * (ny + 1), 2, |v, k| {
        if k == 0 {
            (v % (nx + 1)) as f64
        } else {
            (v / (nx + 1)) as f64
        }
    });
    (TriangleMesh::new(faces), x)
}

/// The same grid as `make_grid` embedded in 3D as a gently curved sheet.
pub fn make_curved_sheet(nx: usize, ny: usize) -> (TriangleMesh, VectorField) {
    let (mesh, x2) = make_grid(nx, ny);
    let x = VectorField::from_fn(x2.nrows(), 3, |v, k| match k {
        0 | 1 => x2[(v, k)],
        _ => 0.1 * x2[(v, 0)] * x2[(v, 1)],
    });
    (mesh, x)
}

/// Two positively oriented tetrahedra sharing the face `1 2 3`.
pub fn make_two_tets() -> (TetMesh, VectorField) {
    let x = VectorField::from_row_slice(
        5,
        3,
        &[
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0, //
            1.0, 1.0, 1.0,
        ],
    );
    (TetMesh::new(vec![[0, 1, 2, 3], [1, 2, 3, 4]]), x)
}

/// A unit cube where vertex `v` sits at `(v & 1, v & 2, v & 4)`.
pub fn make_hexahedron() -> ([[usize; 8]; 1], VectorField) {
    let x = VectorField::from_fn(8, 3, |v, k| ((v >> k) & 1) as f64);
    ([[0, 1, 2, 3, 4, 5, 6, 7]], x)
}

/// A zig-zag polyline in the plane.
pub fn make_curve(n: usize) -> (SegmentMesh, VectorField) {
    let segments = (0..n).map(|i| [i, i + 1]).collect();
    let x = VectorField::from_fn(n + 1, 2, |v, k| {
        if k == 0 {
            v as f64
        } else {
            0.3 * (v % 2) as f64
        }
    });
    (SegmentMesh::new(segments), x)
}

/// `x` perturbed by a seeded random field of magnitude `scale`.
pub fn perturbed(x: &VectorField, seed: u64, scale: f64) -> VectorField {
    let mut rng = StdRng::seed_from_u64(seed);
    x + utils::random_field(&mut rng, x.nrows(), x.ncols(), scale)
}
